//! Judgment engine: evidence first, the oracle only when there is something to ask about

use crate::context::{build_context, RecordView};
use crate::evidence::EvidenceLocator;
use crate::prompts::PromptSet;
use crate::protocol::Interrogator;
use std::sync::Arc;
use tagjudge_core::{JudgmentResult, PoiRecord, SampleStatus, Tag, Turn};
use tagjudge_llm::LlmProvider;
use tracing::{debug, error};

pub struct EngineConfig {
    pub model: String,
    /// Show the oracle only name, type and the matched text.
    pub minimized_view: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            minimized_view: false,
        }
    }
}

pub struct JudgmentEngine {
    locator: EvidenceLocator,
    interrogator: Interrogator,
    minimized_view: bool,
}

impl JudgmentEngine {
    pub fn new(oracle: Arc<dyn LlmProvider>, prompts: Arc<PromptSet>, config: EngineConfig) -> Self {
        Self {
            locator: EvidenceLocator::new(),
            interrogator: Interrogator::new(oracle, prompts, config.model),
            minimized_view: config.minimized_view,
        }
    }

    /// Judge one (record, tag) pair. Oracle failures come back as a failed
    /// result rather than an error so one sample cannot sink a batch.
    pub async fn judge_sample(&self, record: &PoiRecord, tag: &Tag) -> JudgmentResult {
        let Some(evidence) = self.locator.locate(&tag.name, record) else {
            debug!("No evidence for '{}' in {}", tag.name, record.name);
            return JudgmentResult::no_evidence(record, tag);
        };

        let view = RecordView::select(record, &evidence, self.minimized_view);
        let base = match build_context(&view, tag, self.interrogator.prompts()) {
            Ok(ctx) => ctx,
            Err(e) => return JudgmentResult::failed(record, tag, Some(evidence), e.to_string()),
        };

        match self.interrogator.judge(&base).await {
            Ok(verdict) => {
                debug!(
                    "Judged '{}' for {}: {} (fallback asked: {})",
                    tag.name, record.name, verdict.has_conflict, verdict.fallback_asked
                );
                JudgmentResult {
                    record_name: record.name.clone(),
                    tag: tag.clone(),
                    evidence: Some(evidence),
                    causes: verdict.causes,
                    has_conflict: Some(verdict.has_conflict),
                    retained_turns: verdict
                        .retained_turns
                        .into_iter()
                        .filter(Turn::is_assistant)
                        .collect(),
                    unparseable: verdict.unparseable,
                    usage: verdict.usage,
                    status: SampleStatus::Ok,
                    error: None,
                }
            }
            Err(e) => {
                error!("Judging '{}' for {} failed: {}", tag.name, record.name, e);
                JudgmentResult::failed(record, tag, Some(evidence), e.to_string())
            }
        }
    }
}
