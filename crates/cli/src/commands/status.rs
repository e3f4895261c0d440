//! Alarm status command

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, StatusResponse};
use crate::output::{color_status, format_timestamp, print_heading, print_json, OutputFormat};

/// Show the agent's current threshold and alarm state
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: StatusResponse = client.get("api/v1/status").await?;
    print_status(&status, format)
}

/// Render a status response in the requested format
pub fn print_status(status: &StatusResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(status)?,
        OutputFormat::Table => {
            print_heading("Threshold Alarm Status");
            println!("Threshold:              {}", status.threshold.to_string().cyan());

            match &status.latest {
                Some(reading) => {
                    println!("Latest Value:           {}", reading.value);
                    println!(
                        "Latest Timestamp:       {}",
                        format_timestamp(&reading.timestamp)
                    );
                }
                None => println!("Latest Value:           {}", "no readings yet".dimmed()),
            }

            let level = if status.above { "above" } else { "below" };
            println!("State:                  {}", color_status(level));
            println!(
                "Alert Fired:            {}",
                if status.ever_fired { "yes" } else { "no" }
            );
            println!();
            println!("{}", "Counters".bold());
            println!("{}", "-".repeat(50));
            println!("Readings Processed:     {}", status.readings_processed);
            println!("Alerts Emitted:         {}", status.alerts_emitted);
        }
    }

    Ok(())
}
