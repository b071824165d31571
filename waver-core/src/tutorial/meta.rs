use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::{render, GenerationContext};
use crate::config::OutputFormat;
use crate::contract::{BoxError, ChatModel};
use crate::pipeline::{PipelineContext, Task};

pub const META_FILE: &str = "meta.json";

/// Writes the tutorial's landing page and a machine-readable `meta.json`.
pub struct MetaInfoTask {
    chat: Arc<dyn ChatModel>,
    output_dir: PathBuf,
    project_name: String,
    source: String,
    format: OutputFormat,
}

impl MetaInfoTask {
    pub fn new(
        chat: Arc<dyn ChatModel>,
        output_dir: impl Into<PathBuf>,
        project_name: impl Into<String>,
        source: impl Into<String>,
        format: OutputFormat,
    ) -> Self {
        Self {
            chat,
            output_dir: output_dir.into(),
            project_name: project_name.into(),
            source: source.into(),
            format,
        }
    }
}

#[async_trait]
impl Task<GenerationContext, GenerationContext> for MetaInfoTask {
    async fn execute(
        &self,
        mut context: GenerationContext,
        ctx: &PipelineContext,
    ) -> Result<GenerationContext, BoxError> {
        let titles: Vec<&str> = context.chapters().map(|a| a.name.as_str()).collect();
        let prompt = format!(
            "Write a short introduction (at most one paragraph) for a tutorial about the project `{}`.\n\
             Overview: {}\nChapters: {}",
            self.project_name,
            context.summary,
            titles.join(", "),
        );
        let introduction = self.chat.chat(&prompt).await?;

        let files: Vec<String> = context
            .written_files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();

        let mut index = format!(
            "# {}\n\n{}\n\nSource repository: {}\n\n## Chapters\n\n",
            self.project_name,
            introduction.trim(),
            self.source
        );
        for (i, (title, file)) in titles.iter().zip(&files).enumerate() {
            index.push_str(&format!("{}. [{}]({})\n", i + 1, title, file));
        }

        let chapters: Vec<_> = titles
            .iter()
            .zip(&files)
            .enumerate()
            .map(|(i, (title, file))| json!({ "number": i + 1, "title": title, "file": file }))
            .collect();
        let meta = json!({
            "project": self.project_name,
            "source": self.source,
            "summary": context.summary,
            "format": self.format,
            "chapters": chapters,
            "relationships": context.relationships,
        });

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let index_path = self
            .output_dir
            .join(format!("index.{}", self.format.extension()));
        tokio::fs::write(&index_path, render(self.format, &self.project_name, &index)).await?;
        let meta_path = self.output_dir.join(META_FILE);
        tokio::fs::write(&meta_path, serde_json::to_vec_pretty(&meta)?).await?;

        info!(
            index = %index_path.display(),
            meta = %meta_path.display(),
            "Wrote tutorial meta information"
        );
        ctx.put("meta.project", self.project_name.clone());
        context.meta_files = vec![index_path, meta_path];
        Ok(context)
    }
}
