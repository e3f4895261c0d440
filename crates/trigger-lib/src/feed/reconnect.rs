//! Feed connection state with exponential backoff
//!
//! Tracks whether the broker link is up and how long to wait before the
//! next attempt. Lives entirely inside the feed adapter.

use std::time::Duration;

/// Backoff bounds for reconnect attempts
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// No connection has been established yet
    Connecting,
    Connected,
    /// A connection attempt failed or an established link dropped
    Reconnecting,
}

/// What a failure meant for the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// An established connection was lost
    Dropped,
    /// A connection attempt did not succeed
    Unreachable,
}

/// Next step after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPlan {
    pub kind: FailureKind,
    pub delay: Duration,
    pub attempt: u32,
}

/// Reconnect state machine for the feed link
#[derive(Debug, Clone)]
pub struct ReconnectState {
    config: BackoffConfig,
    status: LinkStatus,
    attempts: u32,
    current_backoff: Duration,
    last_error: Option<String>,
}

impl ReconnectState {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current_backoff: config.initial,
            config,
            status: LinkStatus::Connecting,
            attempts: 0,
            last_error: None,
        }
    }

    /// Record a successful connection and reset the backoff
    pub fn on_connected(&mut self) {
        self.status = LinkStatus::Connected;
        self.attempts = 0;
        self.current_backoff = self.config.initial;
        self.last_error = None;
    }

    /// Record a failure and return how long to wait before retrying
    pub fn on_failure(&mut self, error: impl Into<String>) -> RetryPlan {
        let kind = if self.status == LinkStatus::Connected {
            FailureKind::Dropped
        } else {
            FailureKind::Unreachable
        };

        self.status = LinkStatus::Reconnecting;
        self.attempts += 1;
        self.last_error = Some(error.into());

        let delay = self.current_backoff;
        self.current_backoff = std::cmp::min(self.current_backoff * 2, self.config.max);

        RetryPlan {
            kind,
            delay,
            attempt: self.attempts,
        }
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// One-line description of the link, used as the feed health message
    pub fn summary(&self) -> String {
        match (self.status(), self.last_error()) {
            (LinkStatus::Connecting, _) => "Connecting".to_string(),
            (LinkStatus::Connected, _) => "Connected".to_string(),
            (LinkStatus::Reconnecting, Some(error)) => {
                format!("Reconnecting (attempt {}): {}", self.attempts(), error)
            }
            (LinkStatus::Reconnecting, None) => {
                format!("Reconnecting (attempt {})", self.attempts())
            }
        }
    }
}

impl Default for ReconnectState {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
