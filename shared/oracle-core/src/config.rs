//! Configuration management for services

use crate::error::{OracleError, Result};
use serde::Deserialize;

/// Settings every Oracle process reads: its name and the HTTP probe port
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    pub http_port: u16,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `SERVICE_NAME` and `HTTP_PORT` through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let http_port = match lookup("HTTP_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| OracleError::Config(format!("Invalid HTTP_PORT: {}", e)))?,
            None => 8080,
        };

        Ok(Self {
            service_name: lookup("SERVICE_NAME").unwrap_or_else(|| "oracle-bot".to_string()),
            http_port,
        })
    }

    /// Listen address for the HTTP server, all interfaces
    pub fn http_bind(&self) -> String {
        format!("0.0.0.0:{}", self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_port() {
        let config = ServiceConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.service_name, "oracle-bot");
        assert_eq!(config.http_bind(), "0.0.0.0:8080");

        let config = ServiceConfig::from_lookup(|key| (key == "HTTP_PORT").then(|| " 9090 ".to_string())).unwrap();
        assert_eq!(config.http_port, 9090);
    }

    #[test]
    fn test_bad_port_rejected() {
        let err = ServiceConfig::from_lookup(|key| (key == "HTTP_PORT").then(|| "abc".to_string())).unwrap_err();
        assert!(err.to_string().contains("HTTP_PORT"));
    }
}
