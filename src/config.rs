use serde::{Deserialize, Serialize};

/// Server-level configuration for the transport adapter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Global request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Request logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout: default_timeout(),
            max_body_size: default_max_body_size(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Request logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log headers
    #[serde(default = "default_true")]
    pub log_headers: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { log_headers: true }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_timeout() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10 MB
}

fn default_true() -> bool {
    true
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port == 0 {
            anyhow::bail!("server port must not be 0");
        }
        if self.max_body_size == 0 {
            anyhow::bail!("max_body_size must be greater than 0");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.timeout, 30);
        assert_eq!(config.max_body_size, 10 * 1024 * 1024);
        assert!(config.logging.log_headers);
    }

    #[test]
    fn test_config_deserialization() {
        let yaml = r#"
host: "127.0.0.1"
port: 8080
timeout: 5
logging:
  log_headers: false
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.timeout, 5);
        assert!(!config.logging.log_headers);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port: 9999").unwrap();
        let config = ServerConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_validate_rejects_zero_body_size() {
        let config = ServerConfig {
            max_body_size: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
