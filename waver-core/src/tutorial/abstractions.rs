use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use super::{file_listing, strip_markup, Abstraction, GenerationContext};
use crate::contract::{BoxError, ChatModel};
use crate::pipeline::{PipelineContext, Task};

const MAX_ABSTRACTIONS: usize = 10;

static ABSTRACTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*]\s+|\d+[.)]\s*)?(.+?)\s*:\s*(.+?)\s*$").expect("static regex is valid")
});

/// Asks the model for the project's core abstractions.
pub struct IdentifyAbstractionsTask {
    chat: Arc<dyn ChatModel>,
    project_name: String,
}

impl IdentifyAbstractionsTask {
    pub fn new(chat: Arc<dyn ChatModel>, project_name: impl Into<String>) -> Self {
        Self {
            chat,
            project_name: project_name.into(),
        }
    }

    fn prompt(&self, context: &GenerationContext) -> String {
        format!(
            "You are analysing the codebase of the project `{project}`.\n\
             Identify the {max} most important abstractions a newcomer must understand.\n\
             Answer with one abstraction per line, formatted exactly as\n\
             `Name: one sentence description`\n\
             and no other text.\n\n\
             Codebase:\n{listing}",
            project = self.project_name,
            max = MAX_ABSTRACTIONS,
            listing = file_listing(&context.files),
        )
    }
}

/// Parse `Name: description` lines, tolerating list markers and emphasis.
pub(crate) fn parse_abstractions(answer: &str) -> Vec<Abstraction> {
    let mut found: Vec<Abstraction> = Vec::new();
    for caps in answer.lines().filter_map(|l| ABSTRACTION_LINE.captures(l)) {
        let name = strip_markup(&caps[1]);
        let description = strip_markup(&caps[2]);
        if name.is_empty() || description.is_empty() {
            continue;
        }
        if found.iter().any(|a| a.name.eq_ignore_ascii_case(name)) {
            continue;
        }
        found.push(Abstraction {
            name: name.to_string(),
            description: description.to_string(),
        });
        if found.len() == MAX_ABSTRACTIONS {
            break;
        }
    }
    found
}

#[async_trait]
impl Task<GenerationContext, GenerationContext> for IdentifyAbstractionsTask {
    async fn execute(
        &self,
        mut context: GenerationContext,
        ctx: &PipelineContext,
    ) -> Result<GenerationContext, BoxError> {
        let answer = self.chat.chat(&self.prompt(&context)).await?;
        debug!(answer_len = answer.len(), "Received abstractions answer");
        let abstractions = parse_abstractions(&answer);
        if abstractions.is_empty() {
            return Err("model answer contained no abstractions".into());
        }
        info!(
            project = %self.project_name,
            count = abstractions.len(),
            "Identified abstractions"
        );
        ctx.put("abstractions.count", abstractions.len());
        context.abstractions = abstractions;
        Ok(context)
    }
}
