//! Model loading utilities
//!
//! This module turns a model path into a ready-to-execute graph:
//! - `.graph` files (single JSON graph definition)
//! - checkpoint directories (meta graph + restored variables)

mod checkpoint;
mod detect;

pub use checkpoint::{latest_checkpoint, load_checkpoint, CHECKPOINT_INDEX};
pub use detect::{detect_model_source, ModelFormat, ModelSource, GRAPH_EXTENSION};

use std::path::Path;

use crate::error::Result;
use crate::graph::{GraphDef, GraphHandle, NativeGraph};

/// Load a model from any supported format
///
/// This function auto-detects the format and loads the model appropriately.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Box<dyn GraphHandle>> {
    let path = path.as_ref();
    let source = detect_model_source(path)?;

    let graph = match source.format {
        ModelFormat::GraphFile => NativeGraph::from_def(GraphDef::from_file(&source.path)?)?,
        ModelFormat::Checkpoint => load_checkpoint(&source.path)?,
    };

    tracing::info!(
        "Loaded {:?} model from {} ({} nodes)",
        source.format,
        source.path.display(),
        graph.len()
    );

    Ok(Box::new(graph))
}
