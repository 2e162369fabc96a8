//! One interrogation step: ask, let the oracle reason, then extract a canonical answer.
//!
//! The oracle answers the question in free text. A second, independent request
//! carrying only the extraction instruction and that reply turns it into a token,
//! which `Answer::normalize` maps to yes, no or unparseable.

use crate::prompts::PromptSet;
use std::sync::Arc;
use tagjudge_core::{Answer, CharUsage, ConversationContext, Turn};
use tagjudge_llm::{LlmProvider, LlmRequest, LlmResult};
use tracing::{debug, warn};

/// Everything one sub-question produced
#[derive(Clone, Debug)]
pub struct SubQuestionOutcome {
    /// The base context plus the question and the oracle's reply. The
    /// extraction exchange is not part of it.
    pub context: ConversationContext,
    /// The question turn and the reasoning turn, in that order.
    pub exchange: Vec<Turn>,
    pub answer: Answer,
    pub usage: CharUsage,
}

/// Talks to the oracle on behalf of one engine. Cheap to share across samples.
pub struct Interrogator {
    oracle: Arc<dyn LlmProvider>,
    prompts: Arc<PromptSet>,
    model: String,
}

impl Interrogator {
    pub fn new(oracle: Arc<dyn LlmProvider>, prompts: Arc<PromptSet>, model: impl Into<String>) -> Self {
        Self {
            oracle,
            prompts,
            model: model.into(),
        }
    }

    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    /// Ask `question` on top of a copy of `base`.
    pub async fn run_check(
        &self,
        base: &ConversationContext,
        question: &str,
    ) -> LlmResult<SubQuestionOutcome> {
        let mut usage = CharUsage::default();

        let question_turn = Turn::user(question);
        let asked = base.extended([&question_turn]);
        usage.input += asked.char_len();

        let reply = self
            .oracle
            .complete(LlmRequest::new(&self.model, asked.turns()))
            .await?;
        usage.output += reply.chars().count();

        let reply_turn = Turn::assistant(reply.as_str());
        let context = asked.extended([&reply_turn]);

        let extract = [Turn::user(format!("{}\n{}", self.prompts.extract_answer, reply))];
        usage.input += extract[0].char_len();

        let raw = self
            .oracle
            .complete(LlmRequest::new(&self.model, &extract))
            .await?;
        usage.output += raw.chars().count();

        let answer = Answer::normalize(&raw);
        if answer.is_unparseable() {
            warn!("Extraction returned neither yes nor no: {:?}", raw);
        }
        debug!(
            "Check answered {} ({} chars in, {} chars out)",
            answer, usage.input, usage.output
        );

        Ok(SubQuestionOutcome {
            context,
            exchange: vec![question_turn, reply_turn],
            answer,
            usage,
        })
    }
}
