//! Core inference engine
//!
//! This module provides the inference execution pipeline:
//! - InferenceEngine: validates the graph contract once, then runs requests
//! - batch: singleton batch axis insertion/removal

mod batch;
mod executor;

pub use batch::{add_batch_dim, remove_batch_dim};
pub use executor::{DecodeFn, EncodeFn, InferenceEngine};
