use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "kontrol")]
#[command(about = "Kontrol - live view of a remote agent gateway", long_about = None)]
struct Cli {
    /// Also write logs to a daily-rolling file under the kontrol config directory
    #[arg(long, global = true)]
    log_file: bool,

    /// Per-request timeout in seconds (default: no timeout beyond the OS)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the gateway and print a line whenever something changes
    Watch {
        /// Seconds between polls
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_secs: Option<u64>,
    },
    /// Fetch once and print the snapshot
    Status {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Invoke a gateway tool and print its payload
    Invoke {
        /// Tool name, e.g. `sessions_list`
        tool: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Manage the stored gateway address and token
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show the effective settings (token masked)
    Show,
    /// Store the gateway address and/or token
    Set {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        token: Option<String>,
    },
    /// Remove the settings file
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = if cli.log_file {
        Some(kontrol_infrastructure::KontrolPaths::logs_dir()?)
    } else {
        None
    };
    let _log_guard = logging::init(log_dir.as_deref())?;

    let context = commands::Context::new(cli.timeout_secs.map(Duration::from_secs))?;

    match cli.command {
        Commands::Watch { interval_secs } => {
            commands::watch::run(&context, interval_secs.map(Duration::from_secs)).await?
        }
        Commands::Status { json } => commands::status::run(&context, json).await?,
        Commands::Invoke { tool, args } => commands::invoke::run(&context, &tool, &args).await?,
        Commands::Settings { action } => match action {
            SettingsAction::Show => commands::settings::show(&context).await?,
            SettingsAction::Set { url, token } => commands::settings::set(&context, url, token)?,
            SettingsAction::Clear => commands::settings::clear(&context)?,
        },
    }

    Ok(())
}
