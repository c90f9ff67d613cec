//! Served model settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which model to serve and its tensor contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// `.graph` file, directory containing one, or checkpoint directory
    pub path: PathBuf,

    /// Input placeholder tensors
    pub inputs: Vec<String>,

    /// Output tensors
    pub outputs: Vec<String>,

    /// Callbacks handle the batch dimension themselves
    #[serde(default)]
    pub batch: bool,
}
