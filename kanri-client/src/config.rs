//! Client configuration.

use std::time::Duration;

use kanri_core::MAX_FRAME_BYTES;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for the realtime client.
///
/// Contains connection settings, reconnection parameters, and heartbeat
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket endpoint URL (e.g. `wss://host/ws`).
    pub url: String,

    /// Organization to connect for. The client will not connect without one.
    pub org_id: String,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Whether automatic reconnection is enabled.
    #[serde(default = "default_reconnect_enabled")]
    pub reconnect_enabled: bool,

    /// Maximum number of automatic reconnection attempts (0 = unlimited).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Initial reconnection delay in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Maximum reconnection delay in milliseconds.
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Backoff multiplier for exponential backoff.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Symmetric jitter applied to each delay, as a fraction of the delay.
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,

    /// Heartbeat (`ping`) interval in milliseconds.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Maximum serialized message size in bytes for outbound sends.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_reconnect_enabled() -> bool {
    true
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_fraction() -> f64 {
    0.2
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_max_message_size() -> usize {
    MAX_FRAME_BYTES
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            org_id: String::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_enabled: default_reconnect_enabled(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_fraction: default_jitter_fraction(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl ClientConfig {
    /// Creates a new builder for `ClientConfig`.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Returns the endpoint URL with the organization encoded as a query
    /// parameter.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}?org={}", self.url, self.org_id)
    }

    /// Returns the connection timeout as a Duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the heartbeat interval as a Duration.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Calculates the reconnect delay for a given attempt using capped
    /// exponential backoff, without jitter.
    #[must_use]
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let delay = self.reconnect_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = delay.min(self.max_reconnect_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Calculates the reconnect delay for a given attempt with symmetric
    /// random jitter applied.
    #[must_use]
    pub fn reconnect_delay_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.reconnect_delay(attempt);
        if self.jitter_fraction <= 0.0 {
            return base;
        }
        let base_ms = base.as_millis() as f64;
        let spread = base_ms * self.jitter_fraction;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis((base_ms + offset).max(0.0) as u64)
    }

    /// Returns whether an automatic reconnection should be attempted.
    #[must_use]
    pub fn should_reconnect(&self, attempt: u32) -> bool {
        self.reconnect_enabled
            && (self.max_reconnect_attempts == 0 || attempt < self.max_reconnect_attempts)
    }
}

/// Builder for `ClientConfig`.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Sets the WebSocket endpoint URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Sets the organization id.
    #[must_use]
    pub fn org_id(mut self, org_id: impl Into<String>) -> Self {
        self.config.org_id = org_id.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets whether reconnection is enabled.
    #[must_use]
    pub fn reconnect_enabled(mut self, enabled: bool) -> Self {
        self.config.reconnect_enabled = enabled;
        self
    }

    /// Sets the maximum reconnection attempts.
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the initial reconnection delay.
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Sets the maximum reconnection delay.
    #[must_use]
    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.max_reconnect_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.backoff_multiplier = multiplier;
        self
    }

    /// Sets the jitter fraction.
    #[must_use]
    pub fn jitter_fraction(mut self, fraction: f64) -> Self {
        self.config.jitter_fraction = fraction;
        self
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Sets the maximum outbound message size.
    #[must_use]
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.config.max_message_size = bytes;
        self
    }

    /// Builds the `ClientConfig`.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert!(config.reconnect_enabled);
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.reconnect_delay_ms, 1_000);
        assert_eq!(config.max_reconnect_delay_ms, 30_000);
        assert_eq!(config.heartbeat_interval_ms, 30_000);
        assert_eq!(config.max_message_size, MAX_FRAME_BYTES);
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::builder()
            .url("wss://example.com/ws")
            .org_id("org-1")
            .max_reconnect_attempts(5)
            .reconnect_delay(Duration::from_millis(500))
            .build();

        assert_eq!(config.url, "wss://example.com/ws");
        assert_eq!(config.org_id, "org-1");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay_ms, 500);
    }

    #[test]
    fn test_endpoint_encodes_org() {
        let config = ClientConfig::builder()
            .url("wss://example.com/ws")
            .org_id("org-1")
            .build();
        assert_eq!(config.endpoint(), "wss://example.com/ws?org=org-1");
    }

    #[test]
    fn test_exponential_backoff() {
        let config = ClientConfig::default();

        assert_eq!(config.reconnect_delay(0), Duration::from_secs(1));
        assert_eq!(config.reconnect_delay(1), Duration::from_secs(2));
        assert_eq!(config.reconnect_delay(2), Duration::from_secs(4));
        assert_eq!(config.reconnect_delay(4), Duration::from_secs(16));
        // Capped at the maximum delay.
        assert_eq!(config.reconnect_delay(5), Duration::from_secs(30));
        assert_eq!(config.reconnect_delay(10), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_is_non_decreasing_and_bounded() {
        let config = ClientConfig::default();
        let mut previous = Duration::ZERO;
        for attempt in 0..config.max_reconnect_attempts {
            let delay = config.reconnect_delay(attempt);
            assert!(delay >= previous);
            previous = delay;

            // With jitter, the delay stays within ±20% of the base.
            let jittered = config.reconnect_delay_with_jitter(attempt);
            let base_ms = delay.as_millis() as f64;
            let low = (base_ms * 0.8).floor() as u128;
            let high = (base_ms * 1.2).ceil() as u128;
            assert!(jittered.as_millis() >= low);
            assert!(jittered.as_millis() <= high);
        }
    }

    #[test]
    fn test_jitter_disabled() {
        let config = ClientConfig::builder().jitter_fraction(0.0).build();
        assert_eq!(
            config.reconnect_delay_with_jitter(3),
            config.reconnect_delay(3)
        );
    }

    #[test]
    fn test_should_reconnect_caps_attempts() {
        let config = ClientConfig::default();

        assert!(config.should_reconnect(0));
        assert!(config.should_reconnect(9));
        assert!(!config.should_reconnect(10));
        assert!(!config.should_reconnect(11));
    }

    #[test]
    fn test_should_reconnect_disabled() {
        let config = ClientConfig::builder().reconnect_enabled(false).build();
        assert!(!config.should_reconnect(0));
    }

    #[test]
    fn test_should_reconnect_unlimited() {
        let config = ClientConfig::builder().max_reconnect_attempts(0).build();
        assert!(config.should_reconnect(1_000));
    }
}
