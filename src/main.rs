//! tagjudge: judge whether string-matched tags really apply to their records
//!
//! Usage:
//!   tagjudge                          → judge lodging tags with configs/default_config.yml
//!   tagjudge -t dining --test-mode    → only the configured dining test keys
//!   tagjudge --matched-line-only      → hide description and reviews from the oracle
//!   tagjudge --dump-config            → print the effective config as YAML

mod config;
mod data;
mod output;

use anyhow::Context;
use clap::Parser;
use config::{JudgeConfig, ProviderKind, TestingType, DEFAULT_CONFIG_PATH};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tagjudge_engine::{BatchRunner, EngineConfig, JudgmentEngine, PromptSet};
use tagjudge_llm::{AnthropicProvider, LlmProvider, OpenAiProvider, ResilientProvider};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "tagjudge",
    about = "Judge string-matched taxonomy tags with an LLM",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Tag domain to judge
    #[arg(short = 't', long, value_enum, default_value = "lodging")]
    testing_type: TestingType,

    /// Path to the YAML config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Show the oracle only name, type and the matched sentence
    #[arg(long, default_value_t = false)]
    matched_line_only: bool,

    /// Restrict the batch to the configured test keys
    #[arg(long, default_value_t = false)]
    test_mode: bool,

    /// Oracle backend
    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,

    /// Model name
    #[arg(long)]
    model: Option<String>,

    /// API key (or set it in the config, or OPENAI_API_KEY / ANTHROPIC_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Samples judged at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Write logs to a file (in addition to stderr)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the effective config as YAML and exit
    #[arg(long, default_value_t = false)]
    dump_config: bool,
}

impl Cli {
    /// Flags override whatever the config file says.
    fn apply(&self, config: &mut JudgeConfig) {
        if self.matched_line_only {
            config.matched_line_only = true;
        }
        if self.test_mode {
            config.run_test_mode = true;
        }
        if let Some(provider) = self.provider {
            if provider != config.provider {
                config.model.clear();
            }
            config.provider = provider;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(n) = self.concurrency {
            config.concurrency = n;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;

    let mut config = JudgeConfig::load(&cli.config)?;
    cli.apply(&mut config);

    if cli.dump_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    run(&cli, &config).await
}

async fn run(cli: &Cli, config: &JudgeConfig) -> anyhow::Result<()> {
    let testing_type = cli.testing_type;
    info!(
        "Judging {} tags (provider={:?}, model={}, matched_line_only={}, test_mode={})",
        testing_type.as_str(),
        config.provider,
        config.model_name(),
        config.matched_line_only,
        config.run_test_mode
    );

    let prompts = PromptSet::load_dir(&config.paths.prompts_dir)?;

    let test_keys = config
        .run_test_mode
        .then(|| config.test_keys.for_type(testing_type));
    let samples = data::load_samples(&config.paths.data_dir, testing_type, test_keys)
        .context("loading input tables")?;

    let oracle = build_oracle(config, cli.api_key.as_deref())?;
    let engine = JudgmentEngine::new(
        oracle,
        Arc::new(prompts),
        EngineConfig {
            model: config.model_name().to_string(),
            minimized_view: config.matched_line_only,
        },
    );

    let started = chrono::Utc::now();
    let report = BatchRunner::new(Arc::new(engine), config.concurrency)
        .with_progress_every(config.progress_every)
        .run(samples)
        .await;
    let elapsed = chrono::Utc::now() - started;

    let path = output::output_path(&config.paths.result_dir, testing_type, config.matched_line_only);
    output::write_results(&path, &report.results)?;

    let cost = report.cost(&config.pricing);
    info!(
        "Done in {}s: {} samples, {} judged, {} without evidence, {} failed, {} conflicts",
        elapsed.num_seconds(),
        report.total(),
        report.judged(),
        report.without_evidence(),
        report.failed(),
        report.conflicts()
    );
    info!(
        "Estimated price is {:.6} USD per sample ({:.4} USD for this batch)",
        cost.per_sample_usd,
        cost.projected_usd(cost.samples)
    );
    info!("Results written to {}", path.display());
    Ok(())
}

fn build_oracle(config: &JudgeConfig, api_key_flag: Option<&str>) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let api_key = config.resolve_api_key(api_key_flag)?;
    let inner: Arc<dyn LlmProvider> = match config.provider {
        ProviderKind::Openai => {
            let mut provider = OpenAiProvider::new(api_key);
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url.clone());
            }
            Arc::new(provider)
        }
        ProviderKind::Anthropic => {
            let mut provider = AnthropicProvider::new(api_key);
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url.clone());
            }
            Arc::new(provider)
        }
    };
    if !inner.supports_model(config.model_name()) {
        tracing::warn!(
            "Model '{}' is not a known {} model, sending it anyway",
            config.model_name(),
            inner.name()
        );
    }
    Ok(Arc::new(ResilientProvider::new(
        inner,
        config.retry.clone(),
        config.max_inflight_requests,
    )))
}

fn init_tracing(
    log_file: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("--log-file must name a file"))?;
            std::fs::create_dir_all(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagjudge=info,tagjudge_engine=info,tagjudge_llm=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}
