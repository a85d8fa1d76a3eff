use serde::{Deserialize, Serialize};

/// Broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    /// Directory for the durable event log. `None` keeps all events in
    /// memory for the lifetime of the process.
    pub data_dir: Option<String>,
    pub max_connections: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5672,
            data_dir: None,
            max_connections: 1000,
        }
    }
}

impl BrokerConfig {
    /// Use a durable file-backed event log rooted at `data_dir`.
    pub fn with_data_dir<S: Into<String>>(mut self, data_dir: S) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    /// Validate configuration bounds before the broker starts.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }
        if let Some(dir) = &self.data_dir {
            if dir.is_empty() {
                return Err("data_dir must not be empty".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BrokerConfig::default();
        assert_eq!(config.port, 5672);
        assert!(config.data_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_connections_rejected() {
        let config = BrokerConfig {
            max_connections: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_data_dir_rejected() {
        let config = BrokerConfig::default().with_data_dir("");
        assert!(config.validate().is_err());
    }
}
