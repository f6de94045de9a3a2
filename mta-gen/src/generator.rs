//! Content generator: prompt → LLM → validated draft

use std::sync::Arc;
use tracing::{info, warn};

use crate::drafts::{parse_draft, Draft, DraftKind};
use crate::error::Result;
use crate::llm::LlmClient;
use crate::prompts::{build_prompt, resolve_question_count, PromptOptions};

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: DraftKind,
    pub subject: String,
    pub options: PromptOptions,
}

#[derive(Clone)]
pub struct ContentGenerator {
    llm: Arc<dyn LlmClient>,
}

impl ContentGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<Draft> {
        let prompt = build_prompt(request.kind, &request.subject, &request.options)?;

        info!(kind = request.kind.as_str(), subject = %request.subject, "Generating draft");
        let raw = self.llm.complete(&prompt.system, &prompt.user).await?;
        let draft = parse_draft(request.kind, &raw)?;

        if let Draft::Quiz(quiz) = &draft {
            let requested = resolve_question_count(request.options.question_count)?;
            if quiz.questions.len() != requested as usize {
                warn!(
                    "Model returned {} questions, {} requested",
                    quiz.questions.len(),
                    requested
                );
            }
        }

        Ok(draft)
    }
}
