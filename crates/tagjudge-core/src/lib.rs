//! Tagjudge Core - Data model and error handling for tag-validity judgment

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
