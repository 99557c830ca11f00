use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use mail_classify::config::ClassifierConfig;
use mail_classify::dataset;
use mail_classify::error::Result;
use mail_classify::llm::GeminiTransport;
use mail_classify::pipeline::{Dispatcher, OutcomeSummary};
use mail_classify::report;
use mail_classify::taxonomy::Taxonomy;

#[derive(Parser)]
#[command(name = "mail-classify")]
#[command(version, about = "Classify emails with an LLM and report on the results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every record of a JSON file and write predictions
    Classify {
        /// Input records (JSON array with a `text` field per record)
        input: PathBuf,

        /// Where to write predictions
        output: PathBuf,

        /// Only classify the first N records
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Score predictions against a labelled set
    Evaluate {
        predictions: PathBuf,
        ground_truth: PathBuf,
    },

    /// Render the per-company recruiting timeline as HTML
    Timeline {
        predictions: PathBuf,
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Classify {
            input,
            output,
            limit,
        } => classify(&input, &output, limit)
            .await
            .with_context(|| format!("Failed to classify {}", input.display())),
        Commands::Evaluate {
            predictions,
            ground_truth,
        } => evaluate(&predictions, &ground_truth).context("Evaluation failed"),
        Commands::Timeline {
            predictions,
            output,
        } => timeline(&predictions, &output)
            .with_context(|| format!("Failed to build timeline {}", output.display())),
    }
}

async fn classify(input: &Path, output: &Path, limit: Option<usize>) -> Result<()> {
    let config = ClassifierConfig::from_env()?;
    eprintln!("📬 mail-classify v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Input: {}", input.display());

    let records = dataset::load_records(input, limit)?;
    let items = dataset::to_items(&records);
    info!(count = items.len(), "Loaded records");

    let transport = Arc::new(GeminiTransport::new(&config)?);
    let dispatcher = Dispatcher::from_config(transport, Arc::new(Taxonomy::recruiting()), &config);
    let outcomes = dispatcher.run(items).await;

    let summary = OutcomeSummary::from_outcomes(&outcomes);
    info!(
        total = summary.total,
        classified = summary.count("classified"),
        parse_error = summary.count("parse_error"),
        api_error = summary.count("api_error"),
        retry_failed = summary.count("retry_failed"),
        "Classification finished"
    );
    if summary.failed() > 0 {
        warn!(failed = summary.failed(), "Some records could not be classified");
    }

    let predictions = dataset::to_predictions(records, &outcomes)?;
    dataset::write_predictions(output, &predictions)?;
    info!(path = %output.display(), "Predictions written");
    Ok(())
}

fn evaluate(predictions: &Path, ground_truth: &Path) -> Result<()> {
    let predictions = dataset::load_predictions(predictions)?;
    let ground_truth = dataset::load_records(ground_truth, None)?;
    let report = report::evaluate(&predictions, &ground_truth)?;
    println!("{report}");
    Ok(())
}

fn timeline(predictions: &Path, output: &Path) -> Result<()> {
    let predictions = dataset::load_predictions(predictions)?;
    let timeline = report::build_timeline(&predictions);
    if timeline.is_empty() {
        warn!("No recruiting emails with usable dates");
    } else {
        print!("{timeline}");
    }
    report::write_html(output, &timeline)?;
    info!(
        companies = timeline.companies.len(),
        events = timeline.event_count(),
        path = %output.display(),
        "Timeline written"
    );
    Ok(())
}
