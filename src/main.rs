use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use storewatch::calendar::resolve_zone;
use storewatch::cli;
use storewatch::config::Config;
use storewatch::dataset::Dataset;
use storewatch::ingest;
use storewatch::jobs::{JobStatus, ReportJobs};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::parse_args();

    if args.help {
        cli::print_help();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storewatch=info".parse().unwrap()),
        )
        .init();

    info!("Storewatch report engine v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Store status CSV: {}", config.store_status_csv);
    info!("  Business hours CSV: {}", config.business_hours_csv);
    info!("  Timezones CSV: {}", config.timezones_csv);
    info!("  Reports dir: {}", config.reports_dir);
    info!("  Default timezone: {}", config.default_timezone);

    // Handle --validate mode
    if args.validate {
        info!("Validating configuration...");
        match config.validate() {
            Ok(()) => {
                info!("Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    // Load the three input feeds
    let default_zone = resolve_zone(&config.default_timezone, chrono_tz::America::Chicago);
    let mut dataset = Dataset::new(default_zone);

    let counts = ingest::load_store_status(&mut dataset, Path::new(&config.store_status_csv))?;
    info!("Store status loaded: {} rows ({} skipped)", counts.loaded, counts.skipped);

    let counts = ingest::load_business_hours(&mut dataset, Path::new(&config.business_hours_csv))?;
    info!("Business hours loaded: {} rows ({} skipped)", counts.loaded, counts.skipped);

    let counts = ingest::load_timezones(&mut dataset, Path::new(&config.timezones_csv))?;
    info!("Timezones loaded: {} rows ({} skipped)", counts.loaded, counts.skipped);

    dataset.finalize();
    info!(
        "Dataset ready: {} stores, {} observations, {} rules",
        dataset.store_ids().len(),
        dataset.observation_count(),
        dataset.rule_count()
    );

    // Reference instant: explicit override, else latest observation
    let now_override = match &args.now {
        Some(raw) => Some(
            ingest::parse_utc_timestamp(raw)
                .with_context(|| format!("--now '{}' is not a valid UTC timestamp", raw))?,
        ),
        None => {
            if let Some(latest) = dataset.latest_timestamp() {
                info!("Using latest observation as reference time: {}", latest);
            }
            None
        }
    };

    // Run the report as one tracked job; ctrl-c cancels it
    let jobs = ReportJobs::new();
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling report run");
                cancel.cancel();
            }
        });
    }

    let run_id = jobs.trigger(
        Arc::new(dataset),
        PathBuf::from(&config.reports_dir),
        now_override,
        cancel,
    )?;

    let path = loop {
        match jobs.status(&run_id) {
            Some(JobStatus::Running) | None => {
                tokio::time::sleep(Duration::from_millis(200)).await
            }
            Some(JobStatus::Complete { path }) => break path,
            Some(JobStatus::Failed) => bail!("report run {} failed", run_id),
        }
    };

    info!("Report written: {}", path.display());
    if let Some(out) = &args.out {
        std::fs::copy(&path, out)
            .with_context(|| format!("failed to copy report to {}", out))?;
        info!("Report copied to: {}", out);
    }

    Ok(())
}
