use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use super::{abstraction_listing, strip_markup, GenerationContext};
use crate::contract::{BoxError, ChatModel};
use crate::pipeline::{PipelineContext, Task};

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+[.)]\s*(.+?)\s*$").expect("static regex is valid"));

/// Orders the abstractions into chapters.
///
/// Names the model invents are ignored; abstractions it leaves out are
/// appended in their original order so every abstraction gets a chapter.
pub struct ChapterOrganizerTask {
    chat: Arc<dyn ChatModel>,
}

impl ChapterOrganizerTask {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl Task<GenerationContext, GenerationContext> for ChapterOrganizerTask {
    async fn execute(
        &self,
        mut context: GenerationContext,
        ctx: &PipelineContext,
    ) -> Result<GenerationContext, BoxError> {
        let prompt = format!(
            "Order these abstractions into tutorial chapters, foundational concepts first.\n\
             {summary}\n\n{list}\n\n\
             Answer with a numbered list of the abstraction names only, e.g. `1. Name`.",
            summary = context.summary,
            list = abstraction_listing(&context.abstractions),
        );
        let answer = self.chat.chat(&prompt).await?;

        let mut order: Vec<usize> = Vec::with_capacity(context.abstractions.len());
        for caps in answer.lines().filter_map(|l| NUMBERED_LINE.captures(l)) {
            // "1. Name: description" is accepted as well.
            let name = caps[1].split(':').next().unwrap_or_default();
            match context.abstraction_index(strip_markup(name)) {
                Some(i) if !order.contains(&i) => order.push(i),
                Some(_) => {}
                None => debug!(name = %&caps[1], "Ignoring unknown chapter name"),
            }
        }
        for i in 0..context.abstractions.len() {
            if !order.contains(&i) {
                order.push(i);
            }
        }

        info!(chapters = order.len(), "Organized chapters");
        ctx.put("chapters.count", order.len());
        context.chapter_order = order;
        Ok(context)
    }
}
