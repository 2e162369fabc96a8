//! Per-sample price estimate from character counts

use serde::{Deserialize, Serialize};
use tagjudge_core::CharUsage;

/// Prices in USD per million tokens
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
    /// Estimated tokens per character.
    pub token_char_ratio: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            input_per_million: 0.15,
            output_per_million: 0.6,
            token_char_ratio: 0.25,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CostEstimate {
    pub samples: usize,
    pub avg_input_chars: f64,
    pub avg_output_chars: f64,
    pub per_sample_usd: f64,
}

impl CostEstimate {
    /// Average over the given samples. An empty slice yields a zero estimate.
    pub fn from_usage(usage: &[CharUsage], pricing: &Pricing) -> Self {
        if usage.is_empty() {
            return Self::default();
        }
        let n = usage.len() as f64;
        let avg_input_chars = usage.iter().map(|u| u.input as f64).sum::<f64>() / n;
        let avg_output_chars = usage.iter().map(|u| u.output as f64).sum::<f64>() / n;
        let per_sample_usd = avg_input_chars * pricing.token_char_ratio * pricing.input_per_million / 1e6
            + avg_output_chars * pricing.token_char_ratio * pricing.output_per_million / 1e6;
        Self {
            samples: usage.len(),
            avg_input_chars,
            avg_output_chars,
            per_sample_usd,
        }
    }

    pub fn projected_usd(&self, samples: usize) -> f64 {
        self.per_sample_usd * samples as f64
    }
}
