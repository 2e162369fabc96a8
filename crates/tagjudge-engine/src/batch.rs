//! Concurrent batch runner
//!
//! Samples share no mutable state, so many judgment pipelines run at once.
//! Request-level limits belong to the oracle (see `ResilientProvider`); this
//! only bounds how many samples are in flight. Output order equals input order.

use crate::cost::{CostEstimate, Pricing};
use crate::engine::JudgmentEngine;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tagjudge_core::{CharUsage, JudgmentResult, Sample};
use tracing::info;

pub struct BatchRunner {
    engine: Arc<JudgmentEngine>,
    concurrency: usize,
    progress_every: usize,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<JudgmentResult>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn judged(&self) -> usize {
        self.results.iter().filter(|r| r.is_judged()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    pub fn without_evidence(&self) -> usize {
        self.results.iter().filter(|r| r.evidence.is_none()).count()
    }

    pub fn conflicts(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.has_conflict.as_ref().is_some_and(|a| a.is_yes()))
            .count()
    }

    /// Char usage of samples the oracle actually judged.
    pub fn usage(&self) -> Vec<CharUsage> {
        self.results
            .iter()
            .filter(|r| r.is_judged())
            .map(|r| r.usage)
            .collect()
    }

    pub fn cost(&self, pricing: &Pricing) -> CostEstimate {
        CostEstimate::from_usage(&self.usage(), pricing)
    }
}

impl BatchRunner {
    pub fn new(engine: Arc<JudgmentEngine>, concurrency: usize) -> Self {
        Self {
            engine,
            concurrency: concurrency.max(1),
            progress_every: 50,
        }
    }

    pub fn with_progress_every(mut self, n: usize) -> Self {
        self.progress_every = n.max(1);
        self
    }

    pub async fn run(&self, samples: Vec<Sample>) -> BatchReport {
        let total = samples.len();
        let done = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        info!("Judging {} samples ({} at a time)", total, self.concurrency);

        let results: Vec<JudgmentResult> = futures::stream::iter(samples)
            .map(|sample| {
                let engine = self.engine.clone();
                let done = &done;
                let failed = &failed;
                async move {
                    let result = engine.judge_sample(&sample.record, &sample.tag).await;
                    if result.is_failed() {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if n % self.progress_every == 0 || n == total {
                        info!(
                            "Progress: {}/{} samples ({} failed)",
                            n,
                            total,
                            failed.load(Ordering::Relaxed)
                        );
                    }
                    result
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        BatchReport { results }
    }
}
