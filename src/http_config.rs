//! HTTP client configuration module
//!
//! Timeouts and connection settings for the two remote APIs, plus the
//! circuit-breaker thresholds each client is built with.

use crate::utils::circuit_breaker::CircuitBreakerConfig;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Total request timeout
    pub timeout: Duration,
    /// Consecutive failures before the client stops calling the remote
    pub failure_threshold: u32,
    /// How long a tripped client waits before probing again
    pub breaker_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(45),
            failure_threshold: 5,
            breaker_timeout: Duration::from_secs(60),
        }
    }
}

impl HttpConfig {
    /// Canvas REST calls are small but numerous.
    pub fn canvas_api() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            breaker_timeout: Duration::from_secs(30),
            ..Self::default()
        }
    }

    /// TimeEdit SOAP pages can hold 1000 reservations.
    pub fn timeedit_soap() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(120),
            failure_threshold: 3,
            breaker_timeout: Duration::from_secs(60),
        }
    }

    pub fn build_client(&self) -> reqwest::Result<Client> {
        ClientBuilder::new()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: 1,
            timeout: self.breaker_timeout,
        }
    }
}
