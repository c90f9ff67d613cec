//! graphserve - Serve a pre-trained computation graph over HTTP
//!
//! Give graphserve a model artifact, the names of its input and output
//! tensors, and two transforms (request bytes → input tensors, output tensors →
//! response value). It validates the tensor names against the graph at startup
//! and exposes a single `POST /` inference endpoint.
//!
//! # Architecture
//!
//! - **graph**: tensor naming, validation, the `GraphHandle` backend trait and a
//!   reference CPU backend
//! - **loader**: model path → graph (single file or checkpoint directory)
//! - **engine**: construction-time checks + per-request pipeline
//! - **handler**: reusable encode/decode pairs (JSON)
//! - **server**: axum routes, lifecycle, graceful shutdown
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use graphserve::{InferenceEngine, JsonHandler, ServerConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let engine = InferenceEngine::with_handler(
//!     "./models/model.graph",
//!     &["x"],
//!     &["out"],
//!     Arc::new(JsonHandler::new(&["x"])),
//!     false,
//! )?;
//! graphserve::server::start(Arc::new(engine), ServerConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod handler;
pub mod loader;
pub mod server;

// Re-export key types
pub use config::{GatewayConfig, ModelConfig, ServerConfig};
pub use engine::InferenceEngine;
pub use error::{BadInput, Error, Result};
pub use graph::{FeedMap, GraphHandle, OutputMap, Tensor};
pub use handler::{EncodeDecode, JsonHandler};
pub use loader::{load_model, ModelFormat, ModelSource};
pub use server::{Server, ServerState};
