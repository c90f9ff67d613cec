//! Configuration system for graphserve
//!
//! A config file describes the served model and the HTTP server. Command-line
//! flags override whatever the file sets.

mod model;
mod server;

pub use model::ModelConfig;
pub use server::ServerConfig;

use std::path::Path;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Model to serve (may also come from the command line)
    #[serde(default)]
    pub model: Option<ModelConfig>,

    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,
}

impl GatewayConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, picking the parser from the file extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(path),
            Some("json") => Self::from_json(path),
            other => Err(anyhow!(
                "unsupported config format: {} (expected .yaml, .yml or .json)",
                other.unwrap_or("<none>")
            )),
        }
    }
}
