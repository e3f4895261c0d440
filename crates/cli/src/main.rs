//! Sensor Threshold Trigger CLI
//!
//! A command-line tool for inspecting a running threshold agent and
//! changing its alarm threshold.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, status, threshold};

/// Sensor Threshold Trigger CLI
#[derive(Parser)]
#[command(name = "thctl")]
#[command(author, version, about = "CLI for the Sensor Threshold Trigger agent", long_about = None)]
pub struct Cli {
    /// Agent API URL (can also be set via THCTL_API_URL env var)
    #[arg(long, env = "THCTL_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show threshold, latest reading and alarm state
    Status,

    /// Change the alarm threshold
    SetThreshold {
        /// New threshold value
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },

    /// Show agent health and readiness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Status => status::show_status(&client, cli.format).await?,
        Commands::SetThreshold { value } => {
            threshold::set_threshold(&client, value, cli.format).await?
        }
        Commands::Health => health::show_health(&client, cli.format).await?,
    }

    Ok(())
}
