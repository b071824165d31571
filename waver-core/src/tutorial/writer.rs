use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{render, slugify, Abstraction, GenerationContext};
use crate::config::OutputFormat;
use crate::contract::{BoxError, ChatModel};
use crate::pipeline::{PipelineContext, Task};

/// Writes one chapter file per abstraction into the output directory.
pub struct TechnicalWriterTask {
    chat: Arc<dyn ChatModel>,
    output_dir: PathBuf,
    format: OutputFormat,
}

impl TechnicalWriterTask {
    pub fn new(chat: Arc<dyn ChatModel>, output_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            chat,
            output_dir: output_dir.into(),
            format,
        }
    }

    fn prompt(&self, context: &GenerationContext, number: usize, chapter: &Abstraction) -> String {
        let related: Vec<String> = context
            .relationships
            .iter()
            .filter(|r| r.from == chapter.name || r.to == chapter.name)
            .map(|r| format!("- {} -> {}: {}", r.from, r.to, r.label))
            .collect();
        let previous: Vec<&str> = context
            .chapters()
            .take(number - 1)
            .map(|a| a.name.as_str())
            .collect();
        format!(
            "Write chapter {number} of a beginner friendly tutorial in Markdown.\n\
             Project overview: {summary}\n\
             Chapter topic: {name}: {description}\n\
             Chapters so far: {previous}\n\
             Relationships:\n{related}\n\n\
             Start with a `# Chapter {number}: {name}` heading, explain the concept with small code examples \
             and end with a short recap.",
            summary = context.summary,
            name = chapter.name,
            description = chapter.description,
            previous = if previous.is_empty() { "none".to_string() } else { previous.join(", ") },
            related = if related.is_empty() { "- none".to_string() } else { related.join("\n") },
        )
    }
}

/// File name of chapter `number` about `name`.
pub fn chapter_file_name(number: usize, name: &str, format: OutputFormat) -> String {
    format!("{:02}_{}.{}", number, slugify(name), format.extension())
}

#[async_trait]
impl Task<GenerationContext, GenerationContext> for TechnicalWriterTask {
    async fn execute(
        &self,
        mut context: GenerationContext,
        ctx: &PipelineContext,
    ) -> Result<GenerationContext, BoxError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let chapters: Vec<Abstraction> = context.chapters().cloned().collect();
        let mut written = Vec::with_capacity(chapters.len());
        for (i, chapter) in chapters.iter().enumerate() {
            let number = i + 1;
            let body = self.chat.chat(&self.prompt(&context, number, chapter)).await?;
            let path = self
                .output_dir
                .join(chapter_file_name(number, &chapter.name, self.format));
            tokio::fs::write(&path, render(self.format, &chapter.name, &body)).await?;
            debug!(path = %path.display(), "Wrote chapter");
            written.push(path);
        }

        info!(
            output_dir = %self.output_dir.display(),
            chapters = written.len(),
            "Wrote tutorial chapters"
        );
        ctx.put("writer.output_dir", self.output_dir.display().to_string());
        ctx.put("writer.chapters", written.len());
        context.written_files = written;
        Ok(context)
    }
}
