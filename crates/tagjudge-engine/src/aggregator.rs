//! Cause aggregation and the catch-all fallback

use crate::protocol::Interrogator;
use tagjudge_core::{Answer, Cause, CharUsage, CheckKind, CheckOutcome, ConversationContext, Turn};
use tagjudge_llm::LlmResult;
use tracing::debug;

/// Aggregated verdict of the five checks and, if none fired, the fallback
#[derive(Clone, Debug)]
pub struct Verdict {
    /// Triggered checks in `CheckKind::ORDER`, or just `Other` from the fallback.
    pub causes: Vec<Cause>,
    pub has_conflict: Answer,
    pub retained_turns: Vec<Turn>,
    /// Whether the fallback question was asked.
    pub fallback_asked: bool,
    pub unparseable: Vec<String>,
    pub usage: CharUsage,
}

impl Interrogator {
    /// Run every check independently from `base`, then aggregate.
    ///
    /// Any fired check means conflict, and retained turns are the base's
    /// assistant turns plus each fired check's exchange in cause order. With
    /// nothing fired, one more question (`other`) is asked on top of the base
    /// and all five exchanges; its answer alone decides the verdict.
    pub async fn judge(&self, base: &ConversationContext) -> LlmResult<Verdict> {
        let mut usage = CharUsage::default();
        let mut outcomes = Vec::with_capacity(CheckKind::ORDER.len());

        for kind in CheckKind::ORDER {
            let sub = self.run_check(base, self.prompts().question(kind)).await?;
            usage += sub.usage;
            debug!("Check {} -> {}", kind, sub.answer);
            outcomes.push(CheckOutcome {
                kind,
                answer: sub.answer,
                evidence_turns: sub.exchange,
            });
        }

        let mut unparseable: Vec<String> = outcomes
            .iter()
            .filter(|o| o.answer.is_unparseable())
            .map(|o| o.kind.as_str().to_string())
            .collect();

        let fired: Vec<&CheckOutcome> = outcomes.iter().filter(|o| o.triggered()).collect();

        if !fired.is_empty() {
            let causes = fired.iter().map(|o| Cause::from(o.kind)).collect();
            let mut retained_turns = base.assistant_turns();
            for outcome in &fired {
                retained_turns.extend(outcome.evidence_turns.iter().cloned());
            }
            return Ok(Verdict {
                causes,
                has_conflict: Answer::Yes,
                retained_turns,
                fallback_asked: false,
                unparseable,
                usage,
            });
        }

        let combined = base.extended(outcomes.iter().flat_map(|o| o.evidence_turns.iter()));
        let fallback = self.run_check(&combined, &self.prompts().other).await?;
        usage += fallback.usage;
        debug!("Fallback -> {}", fallback.answer);

        if fallback.answer.is_unparseable() {
            unparseable.push(Cause::Other.as_str().to_string());
        }

        let causes = if fallback.answer.is_yes() {
            vec![Cause::Other]
        } else {
            Vec::new()
        };

        Ok(Verdict {
            causes,
            has_conflict: fallback.answer,
            retained_turns: fallback.context.assistant_turns(),
            fallback_asked: true,
            unparseable,
            usage,
        })
    }
}
