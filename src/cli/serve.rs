//! HTTP server command

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::config::{GatewayConfig, ModelConfig};
use crate::engine::InferenceEngine;
use crate::handler::JsonHandler;
use crate::server;

/// Start the inference server with the JSON handler
pub async fn serve(
    model: Option<PathBuf>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    host: Option<String>,
    port: Option<u16>,
    batch: bool,
    config: Option<PathBuf>,
) -> Result<()> {
    let file_config = match config {
        Some(ref path) => {
            tracing::info!("Loading config from {}", path.display());
            GatewayConfig::from_file(path)?
        }
        None => GatewayConfig::default(),
    };

    let config = resolve_config(file_config, model, inputs, outputs, host, port, batch)?;
    let model = config
        .model
        .ok_or_else(|| anyhow!("no model given (use --model or a config file)"))?;

    tracing::info!("Loading model: {}", model.path.display());
    let handler = Arc::new(JsonHandler::new(&model.inputs));
    let engine = InferenceEngine::with_handler(
        &model.path,
        &model.inputs,
        &model.outputs,
        handler,
        model.batch,
    )?;
    tracing::info!("Model loaded successfully");

    tracing::info!("Starting server at http://{}", config.server.addr());
    server::start(Arc::new(engine), config.server).await?;

    Ok(())
}

/// Merge command-line flags over a loaded config
///
/// A flag that is set always wins; empty tensor lists fall back to the file.
pub fn resolve_config(
    mut config: GatewayConfig,
    model: Option<PathBuf>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    host: Option<String>,
    port: Option<u16>,
    batch: bool,
) -> Result<GatewayConfig> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let mut model_config = match (config.model.take(), model) {
        (Some(mut existing), Some(path)) => {
            existing.path = path;
            existing
        }
        (Some(existing), None) => existing,
        (None, Some(path)) => ModelConfig {
            path,
            inputs: Vec::new(),
            outputs: Vec::new(),
            batch: false,
        },
        (None, None) => return Ok(config),
    };

    if !inputs.is_empty() {
        model_config.inputs = inputs;
    }
    if !outputs.is_empty() {
        model_config.outputs = outputs;
    }
    if batch {
        model_config.batch = true;
    }

    if model_config.inputs.is_empty() {
        return Err(anyhow!("no input tensors given (use --inputs)"));
    }
    if model_config.outputs.is_empty() {
        return Err(anyhow!("no output tensors given (use --outputs)"));
    }

    config.model = Some(model_config);
    Ok(config)
}
