use anyhow::{Context as _, Result, bail};
use kontrol_application::GatewayApi;
use kontrol_core::gateway::InvokerFactory;
use kontrol_core::settings::SettingsSource;
use serde_json::Value;

use super::Context;

pub async fn run(context: &Context, tool: &str, args: &str) -> Result<()> {
    let args: Value = serde_json::from_str(args).context("--args must be valid JSON")?;
    if !args.is_object() {
        bail!("--args must be a JSON object");
    }

    let settings = context.store.load_settings().await?;
    let api = GatewayApi::new(context.factory.connect(&settings));
    tracing::debug!("[invoke] {} {}", tool, args);

    match api.invoke(tool, args).await? {
        Some(payload) => println!("{}", payload.to_text()),
        None => println!("(empty result)"),
    }
    Ok(())
}
