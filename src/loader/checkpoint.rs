//! Checkpoint directory loading
//!
//! Layout:
//!
//! ```text
//! checkpoint              model_checkpoint_path: "model.ckpt-1000"
//! model.ckpt-1000.meta    graph definition (JSON)
//! model.ckpt-1000.values  {"<variable>": [flat values], ...}
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::graph::{GraphDef, NativeGraph};

/// Name of the index file pointing at the latest checkpoint
pub const CHECKPOINT_INDEX: &str = "checkpoint";

/// Resolve the prefix of the latest checkpoint in `dir`
pub fn latest_checkpoint(dir: &Path) -> Result<PathBuf> {
    let index = dir.join(CHECKPOINT_INDEX);
    let content = std::fs::read_to_string(&index).map_err(|e| {
        Error::model_load(format!(
            "no checkpoint index in {}: {}",
            dir.display(),
            e
        ))
    })?;

    let prefix = content
        .lines()
        .find_map(|line| line.trim().strip_prefix("model_checkpoint_path:"))
        .map(|value| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            Error::model_load(format!(
                "{} has no model_checkpoint_path entry",
                index.display()
            ))
        })?;

    let prefix = Path::new(prefix);
    Ok(if prefix.is_absolute() {
        prefix.to_path_buf()
    } else {
        dir.join(prefix)
    })
}

/// Load the latest checkpoint in `dir`, restoring its variables
pub fn load_checkpoint(dir: &Path) -> Result<NativeGraph> {
    let prefix = latest_checkpoint(dir)?;
    let meta = with_suffix(&prefix, "meta");
    if !meta.is_file() {
        return Err(Error::model_load(format!(
            "checkpoint meta graph not found: {}",
            meta.display()
        )));
    }

    let mut graph = NativeGraph::from_def(GraphDef::from_file(&meta)?)?;

    let values_path = with_suffix(&prefix, "values");
    if values_path.is_file() {
        let content = std::fs::read_to_string(&values_path)?;
        let values: HashMap<String, Vec<f32>> = serde_json::from_str(&content)
            .map_err(|e| Error::model_load(format!("{}: {}", values_path.display(), e)))?;
        tracing::debug!(
            "Restoring {} variables from {}",
            values.len(),
            values_path.display()
        );
        graph.restore_variables(values)?;
    }

    Ok(graph)
}

/// `model.ckpt-1000` + `meta` → `model.ckpt-1000.meta` (no extension replacement)
fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_owned();
    s.push(".");
    s.push(suffix);
    PathBuf::from(s)
}
