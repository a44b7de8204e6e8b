use anyhow::Result;
use kontrol_application::{SyncConfig, parse_runtime_info};

use super::{Context, render};

pub async fn run(context: &Context, json: bool) -> Result<()> {
    let sync = context.aggregator(SyncConfig::default()).await?;
    let report = sync.refresh().await;
    let snapshot = sync.snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        return Ok(());
    }

    let runtime = snapshot
        .status
        .as_deref()
        .map(parse_runtime_info)
        .unwrap_or_default();
    print!("{}", render::status_report(&snapshot, &report, &runtime));
    Ok(())
}
