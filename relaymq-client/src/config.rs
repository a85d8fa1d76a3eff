//! Configuration types for the RelayMQ client

use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Broker host
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Ask the broker to replay stored history for every registered type
    /// before live delivery starts
    pub request_replay: bool,
    /// Connection timeout
    pub connection_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            request_replay: false,
            connection_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn new<S: Into<String>>(host: S, port: u16, request_replay: bool) -> Self {
        Self {
            host: host.into(),
            port,
            request_replay,
            ..Default::default()
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_broker_port() {
        let config = ClientConfig::default();
        assert_eq!(config.addr(), "localhost:5672");
        assert!(!config.request_replay);
    }
}
