//! Command-line entry point.
//!
//! Streams an answer to stdout as fragments arrive:
//!
//! ```text
//! company-insight --domain example.com "What does example.com do?"
//! ```

use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use company_insight::adapters::{PerplexityConfig, PerplexityProvider};
use company_insight::application::{MultiStepProcessor, RetryPolicy};
use company_insight::config::{AiConfig, AppConfig, LoggingConfig};
use company_insight::domain::StepPipeline;
use company_insight::ports::AIError;

/// Ask a question about a company and stream the answer.
#[derive(Debug, Parser)]
#[command(name = "company-insight", version, about)]
struct Cli {
    /// Company domain the question is about (e.g. example.com)
    #[arg(short, long)]
    domain: String,

    /// The question to answer
    #[arg(required = true, num_args = 1..)]
    question: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    init_tracing(&config.logging);
    config.validate()?;

    let provider = build_provider(&config.ai)?;
    let processor = MultiStepProcessor::new(Arc::new(provider), StepPipeline::default())
        .with_retry_policy(RetryPolicy::from(&config.pipeline));

    let question = cli.question.join(" ");
    tracing::info!(domain = %cli.domain, "Answering question");

    let mut fragments = processor.process(&question, &cli.domain).await?;
    let mut stdout = tokio::io::stdout();
    let mut answer = String::new();

    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        stdout.write_all(fragment.as_bytes()).await?;
        stdout.flush().await?;
        answer.push_str(&fragment);
    }
    stdout.write_all(b"\n").await?;

    tracing::info!(answer_bytes = answer.len(), "Answer complete");
    Ok(())
}

fn build_provider(ai: &AiConfig) -> Result<PerplexityProvider, AIError> {
    let api_key = ai.perplexity_api_key.clone().unwrap_or_default();
    let config = PerplexityConfig::new(api_key)
        .with_model(&ai.model)
        .with_base_url(&ai.base_url)
        .with_timeout(ai.timeout())
        .with_max_tokens(ai.max_tokens)
        .with_temperature(ai.temperature);

    PerplexityProvider::new(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
