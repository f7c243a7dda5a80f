mod catalog;
mod dashboard;
mod funnel;
mod http;
mod loader;
mod metrics;
mod pipeline;
mod report;

use clap::Parser;
use pipeline::{Pipeline, PipelineConfig, PriceListSource};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

/// Reconcile a supplier price list against the retailer catalog and report
/// the publication funnel.
#[derive(Debug, Parser)]
#[command(name = "catmon", version, about)]
struct Args {
    /// Price list CSV to process. Mutually exclusive with --input-dir.
    #[arg(long, conflicts_with = "input_dir")]
    input: Option<PathBuf>,

    /// Directory of CSV exports; the newest one is processed.
    #[arg(long, default_value = "./input")]
    input_dir: PathBuf,

    /// Published Google Sheet to fetch instead of a local file.
    #[arg(long, conflicts_with = "input")]
    sheet_id: Option<String>,

    /// Worksheet gid within the sheet.
    #[arg(long, default_value = "0")]
    gid: String,

    /// Where the JSON report and HTML dashboard land.
    #[arg(long, default_value = "./output")]
    output_dir: PathBuf,

    /// Concurrent catalog lookups.
    #[arg(long, default_value_t = 5)]
    workers: usize,

    /// Abort the lookup phase after this many seconds; pending entries are
    /// reported as lookup failures.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Classify without querying the catalog API.
    #[arg(long)]
    skip_api: bool,

    /// Catalog API base URL.
    #[arg(long, env = "CATALOG_API_BASE")]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "catmon.cli", "run failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let args = Args::parse();

    let source = if let Some(sheet_id) = &args.sheet_id {
        PriceListSource::Sheet(loader::sheet_export_url(sheet_id, &args.gid))
    } else if let Some(path) = &args.input {
        PriceListSource::File(path.clone())
    } else {
        PriceListSource::Directory(args.input_dir.clone())
    };

    let pipeline = Pipeline::new(PipelineConfig {
        workers: args.workers.max(1),
        skip_api: args.skip_api,
        lookup_timeout: args.timeout_secs.map(Duration::from_secs),
        base_url: args.base_url.clone(),
    });

    let outcome = match pipeline.run(&source).await {
        Ok(outcome) => outcome,
        Err(err) => {
            // The source never loaded; still leave an empty report and
            // dashboard behind before failing the run.
            error!(target = "catmon.cli", "pipeline failed, writing empty report: {err}");
            report::write_artifacts(&pipeline::RunOutcome::empty(err.detail()), &args.output_dir)?;
            return Err(err.into());
        }
    };

    report::log_summary(&outcome);
    if !outcome.report.consistent {
        error!(
            target = "catmon.cli",
            "funnel identity violated; inspect the report"
        );
    }

    report::write_artifacts(&outcome, &args.output_dir)?;
    info!(
        target = "catmon.cli",
        output_dir = %args.output_dir.display(),
        "artifacts written"
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
