//! Agent health command

use anyhow::Result;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::client::{ApiClient, HealthResponse, ReadinessResponse};
use crate::output::{color_status, format_unix, print_heading, print_json, print_warning, OutputFormat};

/// Row for the component health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

#[derive(Serialize)]
struct HealthReport {
    health: HealthResponse,
    readiness: ReadinessResponse,
}

/// Show overall and per-component health of the agent
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.get_health("healthz").await?;
    let readiness: ReadinessResponse = client.get_health("readyz").await?;

    match format {
        OutputFormat::Json => print_json(&HealthReport { health, readiness })?,
        OutputFormat::Table => {
            print_heading("Agent Health");
            println!("Status:                 {}", color_status(&health.status));
            let ready = if readiness.ready { "ready" } else { "not ready" };
            println!("Readiness:              {}", color_status(ready));
            if let Some(reason) = &readiness.reason {
                print_warning(reason);
            }
            println!();

            let rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, c)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&c.status),
                    message: c.message.clone().unwrap_or_else(|| "-".to_string()),
                    last_check: format_unix(c.last_check_timestamp),
                })
                .collect();

            if rows.is_empty() {
                print_warning("No components registered");
            } else {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }
    }

    Ok(())
}
