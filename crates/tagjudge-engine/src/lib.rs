//! Tagjudge Engine - Evidence location and multi-step oracle interrogation

pub mod aggregator;
pub mod batch;
pub mod context;
pub mod cost;
pub mod engine;
pub mod evidence;
pub mod prompts;
pub mod protocol;

pub use aggregator::Verdict;
pub use batch::{BatchReport, BatchRunner};
pub use context::{build_context, RecordView};
pub use cost::{CostEstimate, Pricing};
pub use engine::{EngineConfig, JudgmentEngine};
pub use evidence::EvidenceLocator;
pub use prompts::PromptSet;
pub use protocol::{Interrogator, SubQuestionOutcome};
