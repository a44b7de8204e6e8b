use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use kontrol_application::SyncConfig;
use kontrol_infrastructure::SettingsFileWatcher;

use super::{Context, render};

pub async fn run(context: &Context, interval: Option<Duration>) -> Result<()> {
    let mut config = SyncConfig::default();
    if let Some(interval) = interval {
        config = config.with_poll_interval(interval);
    }

    let sync = context.aggregator(config).await?;
    let mut snapshots = sync.subscribe();
    let mut previous = sync.snapshot();

    println!(
        "{} every {:?} (Ctrl+C to stop)",
        "Watching gateway".bold(),
        sync.config().poll_interval
    );
    // Edits from `kontrol settings` in another terminal arrive through the file.
    let _watcher = match SettingsFileWatcher::spawn(&context.store.path(), context.bus.clone()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!("[watch] Settings edits will not be picked up: {}", e);
            None
        }
    };
    sync.start(Some(&context.bus));
    tracing::info!("[watch] Started");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = snapshots.borrow_and_update().clone();
                let domains = current.changed_domains(&previous);
                println!("{}", render::summary_line(&current, &domains));
                previous = current;
            }
        }
    }

    sync.shutdown().await;
    tracing::info!("[watch] Stopped");
    println!("{}", "Stopped.".dimmed());
    Ok(())
}
