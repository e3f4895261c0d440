//! HTTP POST notification sink

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{AlertSink, DeliveryError};
use crate::models::{Alert, AlertPayload};

/// Default timeout for a single POST
pub const DEFAULT_POST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts alerts as JSON to a fixed URL
#[derive(Debug, Clone)]
pub struct HttpAlertSink {
    client: Client,
    url: Url,
}

impl HttpAlertSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, DeliveryError> {
        let url = Url::parse(url).map_err(|e| DeliveryError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(DeliveryError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DeliveryError::Client)?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl AlertSink for HttpAlertSink {
    async fn deliver(&self, alert: &Alert) -> Result<(), DeliveryError> {
        let payload = AlertPayload::from(alert);

        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    fn describe(&self) -> String {
        format!("POST {}", self.url)
    }
}
