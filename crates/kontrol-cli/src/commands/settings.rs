use anyhow::Result;
use colored::Colorize;
use kontrol_core::gateway::DEFAULT_GATEWAY_URL;
use kontrol_core::settings::SettingsSource;

use super::Context;

/// Keeps the first four characters of a token.
fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    if token.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

pub async fn show(context: &Context) -> Result<()> {
    let stored = context.store.load_file()?;
    let effective = context.store.load_settings().await?;

    println!("{} {}", "Settings file:".bold(), context.store.path().display());
    match effective.gateway_url.as_deref() {
        Some(url) => println!("  gateway: {}", url),
        None => println!("  gateway: {} {}", DEFAULT_GATEWAY_URL, "(default)".dimmed()),
    }
    match effective.token() {
        Some(token) => {
            let origin = if stored.token().is_some() { "file" } else { "environment" };
            println!("  token:   {} {}", mask_token(token), format!("({})", origin).as_str().dimmed());
        }
        None => println!("  token:   {}", "not configured".yellow()),
    }
    Ok(())
}

pub fn set(context: &Context, url: Option<String>, token: Option<String>) -> Result<()> {
    if url.is_none() && token.is_none() {
        anyhow::bail!("nothing to set; pass --url and/or --token");
    }
    let written = context.store.update(url, token)?;
    println!(
        "✓ Saved (gateway: {}, token: {})",
        written.gateway_url.as_deref().unwrap_or("default"),
        if written.has_credential() { "present" } else { "none" }
    );
    Ok(())
}

pub fn clear(context: &Context) -> Result<()> {
    context.store.clear()?;
    println!("✓ Cleared {}", context.store.path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("abc"), "****");
        assert_eq!(mask_token("abcdef123"), "abcd****");
        assert_eq!(mask_token("ゲートウェイ鍵"), "ゲートウ****");
    }
}
