//! Request orchestration: one repository in, one uploaded tutorial out.
//!
//! [`GenerationService::generate`] is the entrypoint used by the CLI and the
//! ingress loop. For every request it:
//!   - resolves the provider configuration (fails fast, before any stage runs)
//!   - builds the per-request [`AppConfig`]
//!   - assembles the stage chain, crawl through upload, on a fresh
//!     [`TaskPipeline`] owned by this call only
//!   - runs the chain with the source location and releases the pipeline on
//!     every exit path
//!
//! # Error Handling
//! Configuration problems surface as [`GenerationError::Configuration`]; a
//! failing stage surfaces as [`GenerationError::Pipeline`] carrying the
//! [`TaskError`] that names it. Per-file upload failures are not errors: they
//! are reported in the returned [`UploadResult`].

use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::{AppConfig, ConfigError, GenerationKind, ProviderConfig, WaverSettings};
use crate::contract::{ChatModel, ObjectStore};
use crate::path_util::{absolute_path, folder_name};
use crate::pipeline::{TaskError, TaskPipeline};
use crate::provider::{build_chat_model, resolve};
use crate::tutorial::{
    ChapterOrganizerTask, CodeCrawlerTask, GenerationContext, IdentifyAbstractionsTask,
    IdentifyRelationshipsTask, MetaInfoTask, TechnicalWriterTask,
};
use crate::upload::{UploadError, UploadResult, UploadTask};

/// Stage names, in chain order.
pub const STAGES: [&str; 7] = [
    "Code-crawler",
    "Identify-abstraction",
    "Identify-relationships",
    "Chapter-organizer",
    "Technical-writer",
    "Meta-info",
    "Minio-upload",
];

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("cannot derive a project name from '{0}'")]
    ProjectName(String),
    #[error("cannot resolve the output path: {0}")]
    Io(#[from] io::Error),
    #[error("cannot build the upload stage: {0}")]
    Upload(#[from] UploadError),
    #[error("tutorial generation failed")]
    Pipeline(#[source] TaskError),
}

/// Builds the chat client for a resolved provider. Swapped out in tests.
pub type ChatModelBuilder = Arc<dyn Fn(&ProviderConfig) -> Arc<dyn ChatModel> + Send + Sync>;

/// Coordinates tutorial generation requests. Cheap to clone; clones share the
/// store client and settings, never a pipeline.
#[derive(Clone)]
pub struct GenerationService {
    settings: Arc<WaverSettings>,
    bucket_name: String,
    store: Arc<dyn ObjectStore>,
    chat_model_builder: ChatModelBuilder,
}

impl fmt::Debug for GenerationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationService")
            .field("settings", &self.settings)
            .field("bucket_name", &self.bucket_name)
            .finish_non_exhaustive()
    }
}

impl GenerationService {
    pub fn new(
        settings: WaverSettings,
        store: Arc<dyn ObjectStore>,
        bucket_name: impl Into<String>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            bucket_name: bucket_name.into(),
            store,
            chat_model_builder: Arc::new(build_chat_model),
        }
    }

    pub fn with_chat_model_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(&ProviderConfig) -> Arc<dyn ChatModel> + Send + Sync + 'static,
    {
        self.chat_model_builder = Arc::new(builder);
        self
    }

    pub fn settings(&self) -> &WaverSettings {
        &self.settings
    }

    /// Build the per-request configuration for `source`.
    pub fn app_config(&self, source: &str) -> Result<AppConfig, GenerationError> {
        let provider = resolve(&self.settings)?;
        let project_name =
            folder_name(source).ok_or_else(|| GenerationError::ProjectName(source.to_string()))?;
        let absolute_output_path = absolute_path(&self.settings.output_path)?;
        Ok(AppConfig {
            input_path: source.to_string(),
            absolute_output_path,
            provider,
            verbose: self.settings.verbose,
            project_name,
            output_format: self.settings.output_format,
            generation_kind: GenerationKind::Tutorial,
        })
    }

    /// Generate and upload a tutorial for the repository at `source`.
    pub async fn generate(&self, source: &str) -> Result<UploadResult, GenerationError> {
        let config = self.app_config(source)?;
        self.generate_with_config(config).await
    }

    /// Run the stage chain for an already built configuration.
    pub async fn generate_with_config(
        &self,
        config: AppConfig,
    ) -> Result<UploadResult, GenerationError> {
        let job_id = Uuid::new_v4();
        let span = info_span!(
            "generate",
            %job_id,
            source = %config.input_path,
            project = %config.project_name,
            provider = %config.provider.provider()
        );
        self.run_chain(config).instrument(span).await
    }

    async fn run_chain(&self, config: AppConfig) -> Result<UploadResult, GenerationError> {
        info!(?config, "Starting tutorial generation");

        let chat = (self.chat_model_builder)(&config.provider);
        let output_dir = config.output_dir();
        let upload = UploadTask::for_project(
            Arc::clone(&self.store),
            &output_dir,
            &self.bucket_name,
            &config.project_name,
        )?;

        let mut pipeline = TaskPipeline::start(STAGES[0], CodeCrawlerTask::new())
            .then(
                STAGES[1],
                IdentifyAbstractionsTask::new(Arc::clone(&chat), &config.project_name),
            )
            .then(
                STAGES[2],
                IdentifyRelationshipsTask::new(Arc::clone(&chat), &config.project_name),
            )
            .then(STAGES[3], ChapterOrganizerTask::new(Arc::clone(&chat)))
            .then(
                STAGES[4],
                TechnicalWriterTask::new(Arc::clone(&chat), &output_dir, config.output_format),
            )
            .then::<GenerationContext, _>(
                STAGES[5],
                MetaInfoTask::new(
                    chat,
                    &output_dir,
                    &config.project_name,
                    &config.input_path,
                    config.output_format,
                ),
            )
            .then(STAGES[6], upload);

        let outcome = pipeline.run(config.input_path.clone()).await;
        pipeline.shutdown().await;

        match outcome {
            Ok(result) => {
                info!(
                    successful = result.success_count(),
                    failed = result.failure_count(),
                    output_dir = %output_dir.display(),
                    "Tutorial generation finished"
                );
                Ok(result)
            }
            Err(e) => {
                error!(task = e.task().unwrap_or("<none>"), error = %e, "Tutorial generation failed");
                Err(GenerationError::Pipeline(e))
            }
        }
    }
}
