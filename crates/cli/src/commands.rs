use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use fleetpos_breaker::CircuitBreaker;
use fleetpos_core::config::parse_delimiter;
use fleetpos_core::Config;
use fleetpos_ingest::IngestReport;
use fleetpos_service::LocationService;

use crate::cli::CheckArgs;
use crate::dry_run::DryRunStore;

/// Environment config for the selected profile (`FLEETPOS_PROFILE` when unset).
pub fn effective_config(profile: Option<&str>) -> Config {
    match profile {
        Some(p) => Config::for_profile(p),
        None => Config::from_env(),
    }
}

/// Apply command-line overrides on top of the environment config.
pub fn apply_overrides(config: &mut Config, args: &CheckArgs) -> Result<()> {
    if let Some(size) = args.batch_size {
        config.ingest.batch_size = size.max(1);
    }
    if let Some(workers) = args.workers {
        config.ingest.max_workers = workers.max(1);
        config.ingest.queue_capacity = config.ingest.max_workers;
    }
    if let Some(raw) = args.delimiter.as_deref() {
        let Some(delimiter) = parse_delimiter(raw) else {
            bail!("invalid delimiter {raw:?}: expected a single character or `tab`");
        };
        config.ingest.delimiter = delimiter;
    }
    Ok(())
}

/// Run the full pipeline over `args.file` into a [`DryRunStore`].
pub async fn run_check(
    config: &Config,
    args: &CheckArgs,
    cancel: CancellationToken,
) -> Result<IngestReport> {
    let file = tokio::fs::File::open(&args.file)
        .await
        .with_context(|| format!("failed to open {}", args.file.display()))?;

    let store = Arc::new(DryRunStore::default());
    let breaker = Arc::new(CircuitBreaker::new(config.breaker.clone()).named("nearest"));
    let service = LocationService::new(store.clone(), breaker, config.ingest.clone());

    let report = service
        .bulk_create_until(file, cancel)
        .await
        .with_context(|| format!("ingestion of {} failed", args.file.display()))?;

    info!(
        file = %args.file.display(),
        records = store.records(),
        bulk_calls = store.bulk_calls(),
        "Dry run finished"
    );
    Ok(report)
}

pub fn render_report(report: &IngestReport, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(report).context("failed to serialize report");
    }
    let mut out = String::new();
    out.push_str(&format!("rows read:          {}\n", report.rows_read));
    out.push_str(&format!("rows skipped:       {}\n", report.rows_skipped));
    out.push_str(&format!("records parsed:     {}\n", report.records_parsed));
    out.push_str(&format!(
        "batches:            {} dispatched, {} persisted, {} failed\n",
        report.batches_dispatched, report.batches_persisted, report.batches_failed
    ));
    out.push_str(&format!("records persisted:  {}\n", report.records_persisted));
    if report.worker_panics > 0 {
        out.push_str(&format!("worker panics:      {}\n", report.worker_panics));
    }
    if report.cancelled {
        out.push_str("status:             cancelled\n");
    }
    out.push_str(&format!("duration:           {} ms", report.duration_ms));
    Ok(out)
}
