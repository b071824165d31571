use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use super::{abstraction_listing, strip_markup, GenerationContext, Relationship};
use crate::contract::{BoxError, ChatModel};
use crate::pipeline::{PipelineContext, Task};

static SUMMARY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*\**summary\**\s*:\s*(.+?)\s*$").expect("static regex is valid"));
static RELATION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*]\s+|\d+[.)]\s*)?(.+?)\s*->\s*(.+?)\s*:\s*(.+?)\s*$").expect("static regex is valid")
});

/// Asks the model for a project summary and how the abstractions interact.
pub struct IdentifyRelationshipsTask {
    chat: Arc<dyn ChatModel>,
    project_name: String,
}

impl IdentifyRelationshipsTask {
    pub fn new(chat: Arc<dyn ChatModel>, project_name: impl Into<String>) -> Self {
        Self {
            chat,
            project_name: project_name.into(),
        }
    }

    fn prompt(&self, context: &GenerationContext) -> String {
        format!(
            "The project `{project}` has these core abstractions:\n{list}\n\n\
             First write one line `Summary: <two sentence overview of the project>`.\n\
             Then describe how the abstractions interact, one relationship per line, formatted exactly as\n\
             `From -> To: short label`\n\
             using only the abstraction names above.",
            project = self.project_name,
            list = abstraction_listing(&context.abstractions),
        )
    }
}

#[async_trait]
impl Task<GenerationContext, GenerationContext> for IdentifyRelationshipsTask {
    async fn execute(
        &self,
        mut context: GenerationContext,
        ctx: &PipelineContext,
    ) -> Result<GenerationContext, BoxError> {
        let answer = self.chat.chat(&self.prompt(&context)).await?;

        let mut summary = String::new();
        let mut relationships = Vec::new();
        for line in answer.lines() {
            if let Some(caps) = SUMMARY_LINE.captures(line) {
                summary = strip_markup(&caps[1]).to_string();
                continue;
            }
            let Some(caps) = RELATION_LINE.captures(line) else {
                continue;
            };
            let (Some(from), Some(to)) = (
                context.abstraction_index(strip_markup(&caps[1])),
                context.abstraction_index(strip_markup(&caps[2])),
            ) else {
                continue;
            };
            relationships.push(Relationship {
                from: context.abstractions[from].name.clone(),
                to: context.abstractions[to].name.clone(),
                label: strip_markup(&caps[3]).to_string(),
            });
        }

        info!(
            project = %self.project_name,
            relationships = relationships.len(),
            has_summary = !summary.is_empty(),
            "Identified relationships"
        );
        ctx.put("relationships.count", relationships.len());
        context.summary = summary;
        context.relationships = relationships;
        Ok(context)
    }
}
