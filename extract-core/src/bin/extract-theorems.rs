//! Extract verified sub-proofs from every configured source tree.
//!
//! Configuration comes from `EXTRACT_*` environment variables (see
//! [`ExtractionConfig::from_env`]); logging is controlled by `RUST_LOG`.

use std::process::ExitCode;

use extract_core::{count_records, ExtractionConfig, Orchestrator};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> extract_core::Result<()> {
    let config = ExtractionConfig::from_env()?;
    let orchestrator = Orchestrator::new(config);

    let tasks = orchestrator.collect_tasks()?;
    let report = orchestrator.run(tasks).await?;

    for failure in report.failures() {
        error!(
            file = %failure.source.display(),
            "{}",
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }

    for pair in &orchestrator.config().directories {
        let total = count_records(&pair.target)?;
        info!(dir = %pair.target.display(), total, "Total extracted theorems");
    }

    info!(
        files = report.outcomes.len(),
        failed = report.failures().count(),
        records = report.total_records(),
        elapsed_secs = report.elapsed().num_seconds(),
        "Run complete"
    );
    Ok(())
}
