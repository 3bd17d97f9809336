use clap::Parser;
use kubesight_alerts::adapters::{notifier_from_config, resolve_clients, spawn_watchers, ApiPath};
use kubesight_alerts::cli::{self, Cli, Commands};
use kubesight_alerts::config::AppConfig;
use kubesight_alerts::error::{KubesightError, Result};
use kubesight_alerts::services::Monitor;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple, shutdown_signal};

/// Upper bound on draining queued events after a shutdown signal
const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config_dir)?;
    if let Some(contexts) = cli.context_overrides() {
        config.watch.contexts = contexts;
    }
    config.validate()?;

    match cli.command() {
        Commands::Contexts => {
            init_logging_simple();
            cli::list_contexts(&config.watch.contexts)?;
        }
        Commands::Run => {
            let _log_guard = init_logging(&config.logging);
            run(config).await?;
        }
    }

    Ok(())
}

async fn run(config: AppConfig) -> Result<()> {
    let paths = ApiPath::parse_all(&config.watch.api_paths)?;
    let clients = resolve_clients(&config.watch.contexts).await?;
    info!(
        "Watching {} on contexts [{}]",
        paths
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        clients
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let notifier = notifier_from_config(&config.mattermost);
    let monitor = Monitor::new(&config, notifier);

    let (events_tx, events_rx) = mpsc::channel(config.watch.event_buffer);
    let watchers = spawn_watchers(&clients, &paths, &config.watch, &events_tx);
    drop(events_tx);

    let mut monitor_task = tokio::spawn(monitor.run(events_rx));

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping {} watchers", watchers.len());
            for watcher in &watchers {
                watcher.abort();
            }
            match timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), &mut monitor_task).await {
                Ok(Ok(_)) => info!("Monitor shutdown completed gracefully"),
                Ok(Err(e)) => error!("Monitor task failed: {}", e),
                Err(_) => {
                    warn!("Monitor shutdown timed out after {}s, forcing", SHUTDOWN_TIMEOUT_SECS);
                    monitor_task.abort();
                }
            }
        }
        result = &mut monitor_task => {
            let monitor = result.map_err(|e| KubesightError::Other(e.into()))?;
            warn!(
                "All watch connections ended after {} reconciliations",
                monitor.stats().reconciliations
            );
        }
    }

    Ok(())
}
