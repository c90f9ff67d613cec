//! Encode/decode handlers
//!
//! A handler bundles the two user transforms that sit on either side of graph
//! execution: request bytes → input tensors, output tensors → response value.

mod json;

pub use json::{tensor_from_json, tensor_to_json, JsonHandler};

use anyhow::Result;
use serde_json::Value;

use crate::graph::{FeedMap, OutputMap};

/// Trait for encode/decode handlers used by the engine
///
/// Both methods must be pure with respect to shared state; they are called
/// concurrently from request threads. Return [`crate::BadInput`] to report a
/// caller mistake.
pub trait EncodeDecode: Send + Sync {
    /// Short human-readable description
    fn description(&self) -> &str;

    /// Map the raw request body to input tensors
    fn encode(&self, request: &[u8]) -> Result<FeedMap>;

    /// Map output tensors to a JSON-serializable response
    fn decode(&self, outputs: OutputMap) -> Result<Value>;
}
