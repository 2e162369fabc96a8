//! Tagjudge LLM - Oracle adapters with retry, timeout and request limiting

pub mod anthropic;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod resilient;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use mock::MockProvider;
pub use openai::OpenAiProvider;
pub use provider::{LlmError, LlmProvider, LlmResult};
pub use resilient::{ResilientProvider, RetryPolicy};
pub use types::*;
