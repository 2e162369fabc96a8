//! Run configuration
//!
//! Loaded from YAML at startup. A missing file means defaults; a file that
//! exists but does not parse is an error.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tagjudge_engine::Pricing;
use tagjudge_llm::RetryPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "configs/default_config.yml";

/// Tag domains with their own input and taxonomy files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum TestingType {
    Lodging,
    Dining,
    Experience,
}

impl TestingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestingType::Lodging => "lodging",
            TestingType::Dining => "dining",
            TestingType::Experience => "experience",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Openai,
    Anthropic,
}

impl ProviderKind {
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-haiku-4-5",
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Show the oracle only name, type and the matched text.
    pub matched_line_only: bool,
    /// Restrict the batch to the domain's test keys.
    pub run_test_mode: bool,
    pub test_keys: TestKeys,
    /// Never written back out by `to_yaml`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub provider: ProviderKind,
    /// Model name. Empty means the provider's default.
    pub model: String,
    /// Full endpoint URL override.
    pub base_url: Option<String>,
    /// Samples judged at once.
    pub concurrency: usize,
    /// Oracle requests in flight across all samples.
    pub max_inflight_requests: usize,
    pub retry: RetryPolicy,
    pub pricing: Pricing,
    pub paths: PathsConfig,
    /// Log a progress line every this many samples.
    pub progress_every: usize,

    /// Flat `<type>_test_keys` entries, folded into `test_keys` after load.
    #[serde(flatten)]
    extra: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TestKeys {
    pub lodging: Vec<String>,
    pub dining: Vec<String>,
    pub experience: Vec<String>,
}

impl TestKeys {
    pub fn for_type(&self, testing_type: TestingType) -> &[String] {
        match testing_type {
            TestingType::Lodging => &self.lodging,
            TestingType::Dining => &self.dining,
            TestingType::Experience => &self.experience,
        }
    }

    fn slot(&mut self, testing_type: TestingType) -> &mut Vec<String> {
        match testing_type {
            TestingType::Lodging => &mut self.lodging,
            TestingType::Dining => &mut self.dining,
            TestingType::Experience => &mut self.experience,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub result_dir: PathBuf,
    pub prompts_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            result_dir: PathBuf::from("result"),
            prompts_dir: PathBuf::from("prompts/ai-agent-prompts"),
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            matched_line_only: false,
            run_test_mode: false,
            test_keys: TestKeys::default(),
            api_key: None,
            provider: ProviderKind::default(),
            model: String::new(),
            base_url: None,
            concurrency: 8,
            max_inflight_requests: 16,
            retry: RetryPolicy::default(),
            pricing: Pricing::default(),
            paths: PathsConfig::default(),
            progress_every: 50,
            extra: HashMap::new(),
        }
    }
}

impl JudgeConfig {
    /// Load from a YAML file, or defaults when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        // An empty document deserializes as unit, not a map.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Self = serde_yaml::from_str(content)?;
        config.fold_flat_test_keys()?;
        Ok(config)
    }

    /// Write the current config as YAML (for `--dump-config`).
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn fold_flat_test_keys(&mut self) -> anyhow::Result<()> {
        let extra = std::mem::take(&mut self.extra);
        for (key, value) in extra {
            let testing_type = match key.as_str() {
                "lodging_test_keys" => TestingType::Lodging,
                "dining_test_keys" => TestingType::Dining,
                "experience_test_keys" => TestingType::Experience,
                _ => {
                    tracing::warn!("Ignoring unknown config key '{}'", key);
                    continue;
                }
            };
            let keys: Vec<String> = serde_yaml::from_value(value)
                .with_context(|| format!("'{}' must be a list of tag names", key))?;
            let slot = self.test_keys.slot(testing_type);
            for k in keys {
                if !slot.contains(&k) {
                    slot.push(k);
                }
            }
        }
        Ok(())
    }

    pub fn model_name(&self) -> &str {
        if self.model.is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }

    /// Flag, then config, then the provider's environment variable.
    pub fn resolve_api_key(&self, flag: Option<&str>) -> anyhow::Result<String> {
        if let Some(key) = flag.filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        let var = self.provider.api_key_env();
        std::env::var(var).map_err(|_| {
            anyhow::anyhow!("no API key: pass --api-key, set api_key in the config, or set {}", var)
        })
    }
}
