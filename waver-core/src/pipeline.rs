//! Sequential task engine.
//!
//! A [`TaskPipeline`] is an ordered chain of named [`Task`]s. The output of
//! task *n* is the input of task *n + 1*; the builder enforces this at the type
//! level. Every task runs as its own tokio task and the next one is only
//! spawned once its predecessor has produced a value.
//!
//! The pipeline owns its worker set and its [`PipelineContext`]. Call
//! [`TaskPipeline::shutdown`] when done; dropping the pipeline performs the same
//! release for any path that does not reach the explicit call.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::contract::BoxError;

/// Errors surfaced by [`TaskPipeline::run`]; each names the task that failed.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task '{task}' failed: {source}")]
    Failed {
        task: String,
        #[source]
        source: BoxError,
    },
    #[error("task '{task}' panicked")]
    Panicked { task: String },
    #[error("task '{task}' was aborted before completing")]
    Aborted { task: String },
    #[error("task '{task}' received a value of the wrong type")]
    TypeMismatch { task: String },
    #[error("pipeline has been shut down")]
    Closed,
}

impl TaskError {
    /// Name of the task the error originated from, if any.
    pub fn task(&self) -> Option<&str> {
        match self {
            TaskError::Failed { task, .. }
            | TaskError::Panicked { task }
            | TaskError::Aborted { task }
            | TaskError::TypeMismatch { task } => Some(task),
            TaskError::Closed => None,
        }
    }
}

/// String-keyed values shared by all tasks of one pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// One stage of a pipeline.
#[async_trait]
pub trait Task<I, O>: Send + Sync
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn execute(&self, input: I, ctx: &PipelineContext) -> Result<O, BoxError>;
}

type AnyValue = Box<dyn Any + Send>;

enum StageFailure {
    TypeMismatch,
    Failed(BoxError),
}

#[async_trait]
trait ErasedTask: Send + Sync {
    async fn run(&self, input: AnyValue, ctx: &PipelineContext) -> Result<AnyValue, StageFailure>;
}

struct Typed<T, I, O> {
    task: T,
    _io: PhantomData<fn(I) -> O>,
}

#[async_trait]
impl<T, I, O> ErasedTask for Typed<T, I, O>
where
    T: Task<I, O> + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, input: AnyValue, ctx: &PipelineContext) -> Result<AnyValue, StageFailure> {
        let input = input
            .downcast::<I>()
            .map_err(|_| StageFailure::TypeMismatch)?;
        let output = self
            .task
            .execute(*input, ctx)
            .await
            .map_err(StageFailure::Failed)?;
        Ok(Box::new(output))
    }
}

struct NamedStage {
    name: String,
    task: Arc<dyn ErasedTask>,
}

/// An ordered chain of tasks taking `I` and producing `O`.
pub struct TaskPipeline<I, O> {
    stages: Vec<NamedStage>,
    context: PipelineContext,
    workers: JoinSet<Result<AnyValue, StageFailure>>,
    closed: bool,
    _io: PhantomData<fn(I) -> O>,
}

impl<I, O> TaskPipeline<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Begin a pipeline with its first task.
    pub fn start<T>(name: impl Into<String>, task: T) -> Self
    where
        T: Task<I, O> + 'static,
    {
        Self {
            stages: vec![NamedStage {
                name: name.into(),
                task: Arc::new(Typed {
                    task,
                    _io: PhantomData,
                }),
            }],
            context: PipelineContext::new(),
            workers: JoinSet::new(),
            closed: false,
            _io: PhantomData,
        }
    }

    /// Append a task consuming this pipeline's current output.
    pub fn then<P, T>(mut self, name: impl Into<String>, task: T) -> TaskPipeline<I, P>
    where
        P: Send + 'static,
        T: Task<O, P> + 'static,
    {
        let mut stages = std::mem::take(&mut self.stages);
        stages.push(NamedStage {
            name: name.into(),
            task: Arc::new(Typed {
                task,
                _io: PhantomData,
            }),
        });
        TaskPipeline {
            stages,
            context: std::mem::take(&mut self.context),
            workers: JoinSet::new(),
            closed: self.closed,
            _io: PhantomData,
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Run every task in order, feeding `input` to the first one.
    ///
    /// Stops at the first failing task; later tasks are never started.
    pub async fn run(&mut self, input: I) -> Result<O, TaskError> {
        if self.closed {
            return Err(TaskError::Closed);
        }

        let mut value: AnyValue = Box::new(input);
        for stage in &self.stages {
            info!(task = %stage.name, "Starting task");
            let task = Arc::clone(&stage.task);
            let ctx = self.context.clone();
            self.workers
                .spawn(async move { task.run(value, &ctx).await });

            value = match self.workers.join_next().await {
                Some(Ok(Ok(output))) => {
                    info!(task = %stage.name, "Task completed");
                    output
                }
                Some(Ok(Err(StageFailure::Failed(source)))) => {
                    error!(task = %stage.name, error = %source, "Task failed");
                    return Err(TaskError::Failed {
                        task: stage.name.clone(),
                        source,
                    });
                }
                Some(Ok(Err(StageFailure::TypeMismatch))) => {
                    return Err(TaskError::TypeMismatch {
                        task: stage.name.clone(),
                    });
                }
                Some(Err(join)) if join.is_panic() => {
                    error!(task = %stage.name, "Task panicked");
                    return Err(TaskError::Panicked {
                        task: stage.name.clone(),
                    });
                }
                Some(Err(_)) | None => {
                    return Err(TaskError::Aborted {
                        task: stage.name.clone(),
                    });
                }
            };
        }

        let last = self
            .stages
            .last()
            .map(|s| s.name.clone())
            .unwrap_or_default();
        value
            .downcast::<O>()
            .map(|output| *output)
            .map_err(|_| TaskError::TypeMismatch { task: last })
    }

    /// Release the pipeline: abort any in-flight worker and clear the context.
    pub async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.workers.abort_all();
        while self.workers.join_next().await.is_some() {}
        self.context.clear();
        self.closed = true;
        debug!(tasks = self.stages.len(), "Pipeline shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<I, O> Drop for TaskPipeline<I, O> {
    fn drop(&mut self) {
        if !self.closed {
            self.workers.abort_all();
            self.context.clear();
            self.closed = true;
        }
    }
}
