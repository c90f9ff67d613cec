//! Model format and source detection

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Extension of single-file graph artifacts
pub const GRAPH_EXTENSION: &str = "graph";

/// Detected model format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// Single graph definition file
    GraphFile,
    /// Checkpoint directory (index + meta graph + variable values)
    Checkpoint,
}

/// Detected model source
#[derive(Debug, Clone)]
pub struct ModelSource {
    /// Graph file, or the checkpoint directory
    pub path: PathBuf,
    /// Detected format
    pub format: ModelFormat,
}

/// Detect model format and source from a path
///
/// The path can be:
/// - A direct path to a `.graph` file
/// - A directory containing a `.graph` file (first match wins)
/// - A checkpoint directory
pub fn detect_model_source<P: AsRef<Path>>(path: P) -> Result<ModelSource> {
    let path = path.as_ref();

    if path.as_os_str().is_empty() {
        return Err(Error::InvalidArgument(
            "model path must not be empty".to_string(),
        ));
    }

    if path.is_file() {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext == GRAPH_EXTENSION {
            Ok(ModelSource {
                path: path.to_path_buf(),
                format: ModelFormat::GraphFile,
            })
        } else {
            Err(Error::InvalidArgument(format!(
                "unsupported model file format: .{}",
                ext
            )))
        }
    } else if path.is_dir() {
        match find_graph_in_dir(path) {
            Some(graph_file) => Ok(ModelSource {
                path: graph_file,
                format: ModelFormat::GraphFile,
            }),
            None => Ok(ModelSource {
                path: path.to_path_buf(),
                format: ModelFormat::Checkpoint,
            }),
        }
    } else {
        Err(Error::ModelNotFound(path.to_path_buf()))
    }
}

/// Find a graph file in a directory
fn find_graph_in_dir(dir: &Path) -> Option<PathBuf> {
    let pattern = dir.join(format!("*.{}", GRAPH_EXTENSION));
    glob::glob(pattern.to_str()?)
        .ok()?
        .filter_map(|r| r.ok())
        .find(|p| p.is_file())
}
