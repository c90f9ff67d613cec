//! Construction-time graph checks
//!
//! A misnamed tensor or a non-placeholder declared as input is a configuration
//! bug; these checks surface it before the server accepts traffic.

use std::collections::HashSet;

use super::names::resolve;
use super::GraphHandle;
use crate::error::{Error, Result};

/// Confirm every named tensor exists in the graph
pub fn check_tensors<S: AsRef<str>>(graph: &dyn GraphHandle, names: &[S]) -> Result<()> {
    if names.is_empty() {
        return Err(Error::InvalidArgument(
            "tensor names must not be empty".to_string(),
        ));
    }

    for name in names {
        let name = name.as_ref();
        if !graph.has_tensor(&resolve(name)) {
            return Err(Error::UnknownTensor(name.to_string()));
        }
    }
    Ok(())
}

/// Confirm every named tensor is a graph placeholder
pub fn check_placeholders<S: AsRef<str>>(graph: &dyn GraphHandle, names: &[S]) -> Result<()> {
    if names.is_empty() {
        return Err(Error::InvalidArgument(
            "tensor names must not be empty".to_string(),
        ));
    }

    let placeholders: HashSet<String> = graph.placeholders().into_iter().collect();
    for name in names {
        let name = name.as_ref();
        if !placeholders.contains(&resolve(name)) {
            return Err(Error::NotAPlaceholder(name.to_string()));
        }
    }
    Ok(())
}

/// Confirm the provided tensor set equals the required one.
///
/// Both sides are expected in canonical form. Reports the symmetric
/// difference, each side sorted.
pub fn check_input<'a, P, R>(provided: P, required: R) -> Result<()>
where
    P: IntoIterator<Item = &'a String>,
    R: IntoIterator<Item = &'a String>,
{
    let provided: HashSet<&String> = provided.into_iter().collect();
    let required: HashSet<&String> = required.into_iter().collect();

    if provided == required {
        return Ok(());
    }

    let mut missing: Vec<String> = required
        .difference(&provided)
        .map(|s| s.to_string())
        .collect();
    let mut unexpected: Vec<String> = provided
        .difference(&required)
        .map(|s| s.to_string())
        .collect();
    missing.sort();
    unexpected.sort();

    Err(Error::InputMismatch {
        missing,
        unexpected,
    })
}
