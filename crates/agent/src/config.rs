//! Agent configuration
//!
//! Sources, lowest to highest precedence: optional config file, `TRIGGER_*`
//! environment variables, command-line arguments.

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use trigger_lib::feed::{BackoffConfig, FeedConfig};
use url::Url;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Readings strictly above this value count as an excursion
    #[serde(default)]
    pub threshold: f64,

    /// Notification sink receiving alert POSTs
    #[serde(default)]
    pub post_url: Option<String>,

    #[serde(default = "default_broker_host")]
    pub broker_host: String,

    #[serde(default = "default_broker_port")]
    pub broker_port: u16,

    /// Sensor topic to subscribe to
    #[serde(default = "default_topic")]
    pub topic: String,

    /// MQTT client id (generated from the process id when unset)
    #[serde(default)]
    pub client_id: Option<String>,

    /// API server port for health/metrics/status
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_reconnect_initial")]
    pub reconnect_initial_ms: u64,

    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_secs: u64,

    #[serde(default = "default_post_timeout")]
    pub post_timeout_secs: u64,
}

fn default_broker_host() -> String {
    "test.mosquitto.org".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_topic() -> String {
    "sensors/lyse-test-01".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_keep_alive() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    trigger_lib::pipeline::DEFAULT_QUEUE_CAPACITY
}

fn default_reconnect_initial() -> u64 {
    1000
}

fn default_reconnect_max() -> u64 {
    60
}

fn default_post_timeout() -> u64 {
    trigger_lib::sink::DEFAULT_POST_TIMEOUT.as_secs()
}

/// Values taken from the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub post_url: Option<String>,
}

/// Thresholds must be finite and non-negative
pub fn check_threshold(threshold: f64) -> Result<()> {
    ensure!(threshold.is_finite(), "threshold must be a finite number");
    ensure!(threshold >= 0.0, "threshold must not be negative, got {}", threshold);
    Ok(())
}

impl AgentConfig {
    /// Load configuration from file, environment and command-line overrides
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = &overrides.config_file {
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }

        let config = builder
            .add_source(config::Environment::with_prefix("TRIGGER"))
            .set_override_option("threshold", overrides.threshold)?
            .set_override_option("post_url", overrides.post_url.clone())?
            .build()
            .context("Failed to read configuration")?;

        let config: AgentConfig = config
            .try_deserialize()
            .context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_threshold(self.threshold)?;

        let post_url = self
            .post_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .context("post_url is required (argument, TRIGGER_POST_URL or config file)")?;
        let url = Url::parse(post_url).with_context(|| format!("Invalid post_url: {}", post_url))?;
        ensure!(
            matches!(url.scheme(), "http" | "https"),
            "post_url must use http or https, got {}",
            url.scheme()
        );

        ensure!(!self.topic.trim().is_empty(), "topic must not be empty");
        ensure!(self.queue_capacity > 0, "queue_capacity must be positive");
        ensure!(self.keep_alive_secs > 0, "keep_alive_secs must be positive");
        ensure!(self.post_timeout_secs > 0, "post_timeout_secs must be positive");
        ensure!(
            self.reconnect_initial_ms > 0,
            "reconnect_initial_ms must be positive"
        );
        ensure!(
            Duration::from_secs(self.reconnect_max_secs)
                >= Duration::from_millis(self.reconnect_initial_ms),
            "reconnect_max_secs ({}s) must not be shorter than reconnect_initial_ms ({}ms)",
            self.reconnect_max_secs,
            self.reconnect_initial_ms
        );
        Ok(())
    }

    /// Validated sink URL
    pub fn post_url(&self) -> &str {
        self.post_url.as_deref().unwrap_or_default()
    }

    pub fn post_timeout(&self) -> Duration {
        Duration::from_secs(self.post_timeout_secs)
    }

    pub fn feed_config(&self) -> FeedConfig {
        let defaults = FeedConfig::default();
        FeedConfig {
            client_id: self.client_id.clone().unwrap_or(defaults.client_id),
            broker_host: self.broker_host.clone(),
            broker_port: self.broker_port,
            topic: self.topic.clone(),
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            backoff: BackoffConfig {
                initial: Duration::from_millis(self.reconnect_initial_ms),
                max: Duration::from_secs(self.reconnect_max_secs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_file_with_defaults() {
        let file = write_config(
            r#"
            threshold = 42.5
            post_url = "http://hooks.local/alert"
            topic = "sensors/boiler"
            "#,
        );

        let config = AgentConfig::load(&Overrides {
            config_file: Some(file.path().to_path_buf()),
            ..Overrides::default()
        })
        .unwrap();

        assert_eq!(config.threshold, 42.5);
        assert_eq!(config.post_url(), "http://hooks.local/alert");
        assert_eq!(config.topic, "sensors/boiler");
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.post_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_command_line_overrides_file() {
        let file = write_config(
            r#"
            threshold = 1.0
            post_url = "http://file.local/alert"
            "#,
        );

        let config = AgentConfig::load(&Overrides {
            config_file: Some(file.path().to_path_buf()),
            threshold: Some(75.0),
            post_url: Some("https://cli.local/alert".to_string()),
        })
        .unwrap();

        assert_eq!(config.threshold, 75.0);
        assert_eq!(config.post_url(), "https://cli.local/alert");
    }

    #[test]
    fn test_missing_post_url_is_rejected() {
        let file = write_config("threshold = 3.0\n");
        let err = AgentConfig::load(&Overrides {
            config_file: Some(file.path().to_path_buf()),
            ..Overrides::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("post_url"));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let result = AgentConfig::load(&Overrides {
            config_file: Some(PathBuf::from("/nonexistent/threshold-agent.toml")),
            post_url: Some("http://x.local/".to_string()),
            ..Overrides::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_check_threshold() {
        assert!(check_threshold(0.0).is_ok());
        assert!(check_threshold(99.9).is_ok());
        assert!(check_threshold(-0.1).is_err());
        assert!(check_threshold(f64::NAN).is_err());
        assert!(check_threshold(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let file = write_config(
            r#"
            threshold = 5.0
            post_url = "ftp://files.local/alert"
            "#,
        );
        let err = AgentConfig::load(&Overrides {
            config_file: Some(file.path().to_path_buf()),
            ..Overrides::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    fn load_with(extra: &str) -> Result<AgentConfig> {
        let file = write_config(&format!(
            "post_url = \"http://hooks.local/alert\"\n{}",
            extra
        ));
        AgentConfig::load(&Overrides {
            config_file: Some(file.path().to_path_buf()),
            ..Overrides::default()
        })
    }

    #[test]
    fn test_zero_reconnect_delay_is_rejected() {
        let err = load_with("reconnect_initial_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("reconnect_initial_ms"));
    }

    #[test]
    fn test_zero_post_timeout_is_rejected() {
        let err = load_with("post_timeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("post_timeout_secs"));
    }

    #[test]
    fn test_reconnect_max_below_initial_is_rejected() {
        let err = load_with("reconnect_initial_ms = 5000\nreconnect_max_secs = 2\n").unwrap_err();
        assert!(err.to_string().contains("reconnect_max_secs"));

        // Equal bounds are fine
        let config = load_with("reconnect_initial_ms = 2000\nreconnect_max_secs = 2\n").unwrap();
        let backoff = config.feed_config().backoff;
        assert_eq!(backoff.initial, backoff.max);
    }

    #[test]
    fn test_feed_config_mapping() {
        let file = write_config(
            r#"
            post_url = "http://hooks.local/alert"
            broker_host = "mqtt.local"
            broker_port = 8883
            client_id = "boiler-1"
            keep_alive_secs = 20
            reconnect_initial_ms = 500
            reconnect_max_secs = 30
            "#,
        );
        let config = AgentConfig::load(&Overrides {
            config_file: Some(file.path().to_path_buf()),
            ..Overrides::default()
        })
        .unwrap();

        let feed = config.feed_config();
        assert_eq!(feed.client_id, "boiler-1");
        assert_eq!(feed.broker(), "mqtt.local:8883");
        assert_eq!(feed.keep_alive, Duration::from_secs(20));
        assert_eq!(feed.backoff.initial, Duration::from_millis(500));
        assert_eq!(feed.backoff.max, Duration::from_secs(30));
        assert_eq!(config.threshold, 0.0);
    }
}
