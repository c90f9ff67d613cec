//! Computation graph abstraction
//!
//! The gateway never depends on a particular execution backend. Anything that
//! can list its placeholders, look up tensors by canonical name and run a
//! feed → fetch execution implements [`GraphHandle`].
//!
//! - `names`: canonical tensor names (`<op>:<index>`)
//! - `validate`: construction-time checks against a loaded graph
//! - `def`: on-disk graph definition
//! - `native`: reference CPU backend

pub mod def;
pub mod names;
pub mod native;
pub mod validate;

pub use def::{GraphDef, NodeAttrs, NodeDef, OpKind};
pub use names::resolve;
pub use native::NativeGraph;

use std::collections::HashMap;

use ndarray::ArrayD;

use crate::error::Result;

/// Dense `f32` tensor value
pub type Tensor = ArrayD<f32>;

/// Per-request inputs keyed by tensor name
pub type FeedMap = HashMap<String, Tensor>;

/// Per-request outputs keyed by canonical tensor name
pub type OutputMap = HashMap<String, Tensor>;

/// Static description of a graph tensor
#[derive(Debug, Clone, PartialEq)]
pub struct TensorInfo {
    /// Canonical tensor name
    pub name: String,
    /// Producing op type (e.g. "placeholder", "sigmoid")
    pub op: String,
    /// Declared shape, `-1` for unknown dimensions; `None` if not statically known
    pub shape: Option<Vec<i64>>,
    /// Element type name
    pub dtype: &'static str,
}

/// Loaded, immutable computation graph plus its execution context
///
/// Implementations must tolerate concurrent `execute` calls. A backend that
/// cannot should guard the execution call itself with a mutex.
pub trait GraphHandle: Send + Sync {
    /// Canonical names of all graph entry points
    fn placeholders(&self) -> Vec<String>;

    /// Whether a tensor with this canonical name exists
    fn has_tensor(&self, name: &str) -> bool;

    /// Run the graph, returning one value per requested tensor in request order
    fn execute(&self, outputs: &[String], feed: &FeedMap) -> Result<Vec<Tensor>>;

    /// Every tensor in the graph, in definition order
    fn tensors(&self) -> Vec<TensorInfo>;
}

/// Format a shape the way backend diagnostics print it: `(1, 4)`, `(1,)`, `(?, 5)`
pub fn format_shape<I, D>(dims: I) -> String
where
    I: IntoIterator<Item = D>,
    D: std::fmt::Display,
{
    let parts: Vec<String> = dims.into_iter().map(|d| d.to_string()).collect();
    match parts.len() {
        1 => format!("({},)", parts[0]),
        _ => format!("({})", parts.join(", ")),
    }
}

/// Format a declared shape, printing unknown dimensions as `?`
pub fn format_declared_shape(dims: &[i64]) -> String {
    format_shape(dims.iter().map(|&d| {
        if d < 0 {
            "?".to_string()
        } else {
            d.to_string()
        }
    }))
}
