//! Threshold update command

use anyhow::{ensure, Result};

use crate::client::{ApiClient, StatusResponse, ThresholdRequest};
use crate::commands::status::print_status;
use crate::output::{print_success, OutputFormat};

/// Replace the alarm threshold on a running agent
pub async fn set_threshold(client: &ApiClient, threshold: f64, format: OutputFormat) -> Result<()> {
    ensure!(threshold.is_finite(), "threshold must be a finite number");

    let status: StatusResponse = client
        .put("api/v1/threshold", &ThresholdRequest { threshold })
        .await?;

    if let OutputFormat::Table = format {
        print_success(&format!("Threshold set to {}", status.threshold));
        println!();
    }
    print_status(&status, format)
}
