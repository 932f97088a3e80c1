mod cli;
mod commands;
mod dry_run;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    fleetpos_core::config::load_dotenv();
    let args = CliArgs::parse();
    let mut config = commands::effective_config(args.profile.as_deref());

    match args.command {
        Command::Config => {
            let summary = serde_json::to_string_pretty(&config.redacted_summary())
                .context("failed to serialize config")?;
            println!("{summary}");
        }
        Command::Check(check) => {
            commands::apply_overrides(&mut config, &check)?;
            config.log_summary();

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, draining queued batches");
                    on_interrupt.cancel();
                }
            });

            let report = commands::run_check(&config, &check, cancel).await?;
            println!("{}", commands::render_report(&report, check.json)?);
        }
    }

    Ok(())
}
