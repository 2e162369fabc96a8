//! Instruction prompts, loaded once and shared read-only

use std::path::Path;
use tagjudge_core::{CheckKind, Error, Result};
use tracing::info;

#[derive(Clone, Debug, Default)]
pub struct PromptSet {
    pub system_prompt: String,
    pub extract_answer: String,
    pub wrong_meaning: String,
    pub nearby: String,
    pub negative: String,
    pub outdated_relevancy: String,
    pub bad_quality: String,
    pub other: String,
}

impl PromptSet {
    pub const KEYS: [&'static str; 8] = [
        "system_prompt",
        "extract_answer",
        "wrong_meaning",
        "nearby",
        "negative",
        "outdated_relevancy",
        "other",
        "bad_quality",
    ];

    /// Read `<dir>/<key>.txt` for every key. Any missing file fails the whole load.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let read = |key: &str| -> Result<String> {
            let path = dir.join(format!("{}.txt", key));
            std::fs::read_to_string(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::prompt_missing(key, path.display().to_string()),
                _ => Error::Io(e),
            })
        };

        let prompts = Self {
            system_prompt: read("system_prompt")?,
            extract_answer: read("extract_answer")?,
            wrong_meaning: read("wrong_meaning")?,
            nearby: read("nearby")?,
            negative: read("negative")?,
            outdated_relevancy: read("outdated_relevancy")?,
            bad_quality: read("bad_quality")?,
            other: read("other")?,
        };
        info!("Loaded {} prompts from {}", Self::KEYS.len(), dir.display());
        Ok(prompts)
    }

    /// The question asked for a check.
    pub fn question(&self, kind: CheckKind) -> &str {
        match kind {
            CheckKind::WrongMeaning => &self.wrong_meaning,
            CheckKind::Nearby => &self.nearby,
            CheckKind::Negative => &self.negative,
            CheckKind::Outdated => &self.outdated_relevancy,
            CheckKind::BadQuality => &self.bad_quality,
        }
    }
}
