//! Model inspect command

use std::path::PathBuf;

use anyhow::Result;

use crate::graph::{format_declared_shape, GraphHandle, TensorInfo};
use crate::loader::{detect_model_source, load_model, ModelFormat};

/// Op-name fragments that usually mark a model's outputs
const OUTPUT_HINTS: &[&str] = &[
    "softmax",
    "sigmoid",
    "out",
    "output",
    "prediction",
    "probability",
    "prob",
    "inference",
];

/// Show likely input and output tensors of a model
pub fn inspect(model: PathBuf) -> Result<()> {
    let source = detect_model_source(&model)?;
    let graph = load_model(&model)?;

    println!("Model: {}", model.display());
    match source.format {
        ModelFormat::GraphFile => println!("Format: graph file ({})\n", source.path.display()),
        ModelFormat::Checkpoint => println!("Format: checkpoint\n"),
    }

    println!("Possible input tensors:");
    print_table(&possible_input_tensors(graph.as_ref()));

    println!("\nPossible output tensors:");
    print_table(&possible_output_tensors(graph.as_ref()));

    Ok(())
}

/// Graph placeholders
pub fn possible_input_tensors(graph: &dyn GraphHandle) -> Vec<TensorInfo> {
    let placeholders = graph.placeholders();
    graph
        .tensors()
        .into_iter()
        .filter(|t| placeholders.contains(&t.name))
        .collect()
}

/// Tensors whose op name contains one of the usual output markers
pub fn possible_output_tensors(graph: &dyn GraphHandle) -> Vec<TensorInfo> {
    graph
        .tensors()
        .into_iter()
        .filter(|t| {
            let op = t.name.split(':').next().unwrap_or(&t.name).to_lowercase();
            OUTPUT_HINTS.iter().any(|hint| op.contains(hint))
        })
        .collect()
}

fn print_table(tensors: &[TensorInfo]) {
    if tensors.is_empty() {
        println!("  (none)");
        return;
    }

    let width = tensors.iter().map(|t| t.name.len()).max().unwrap_or(0).max(4);
    println!("  {:<width$}  {:<12}  DTYPE", "NAME", "SHAPE", width = width);
    for tensor in tensors {
        let shape = tensor
            .shape
            .as_deref()
            .map(format_declared_shape)
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "  {:<width$}  {:<12}  {}",
            tensor.name,
            shape,
            tensor.dtype,
            width = width
        );
    }
}
