//! JSON encode/decode handler
//!
//! Requests are JSON objects mapping input tensor names to (nested) arrays of
//! numbers; responses map output tensor names to nested lists.

use std::collections::HashSet;

use anyhow::Result;
use ndarray::{Array, ArrayViewD, IxDyn};
use serde_json::{Map, Number, Value};

use super::EncodeDecode;
use crate::error::BadInput;
use crate::graph::{names, FeedMap, OutputMap, Tensor};

/// JSON handler for encode and decode
#[derive(Debug, Clone)]
pub struct JsonHandler {
    /// Declared input tensors, canonical
    inputs: Vec<String>,
}

impl JsonHandler {
    pub fn new<S: AsRef<str>>(inputs: &[S]) -> Self {
        Self {
            inputs: names::resolve_all(inputs),
        }
    }

    fn decode_request(request: &[u8]) -> std::result::Result<Value, BadInput> {
        if request.is_empty() {
            return Err(BadInput::new("empty request"));
        }
        let text = std::str::from_utf8(request).map_err(|e| BadInput::new(e.to_string()))?;
        serde_json::from_str(text).map_err(|e| BadInput::new(e.to_string()))
    }

    fn validate_inputs(&self, inputs: &Map<String, Value>) -> std::result::Result<(), BadInput> {
        let provided: HashSet<String> = inputs.keys().map(|k| names::resolve(k)).collect();
        let missing: Vec<&str> = self
            .inputs
            .iter()
            .filter(|name| !provided.contains(*name))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BadInput::new(format!("missing inputs: {}", missing.join(","))))
        }
    }
}

impl EncodeDecode for JsonHandler {
    fn description(&self) -> &str {
        "JSON handler"
    }

    fn encode(&self, request: &[u8]) -> Result<FeedMap> {
        let inputs = match Self::decode_request(request)? {
            Value::Object(map) => map,
            _ => return Err(BadInput::new("inputs must be a JSON object").into()),
        };
        self.validate_inputs(&inputs)?;

        let mut feed = FeedMap::with_capacity(inputs.len());
        for (name, value) in &inputs {
            feed.insert(name.clone(), tensor_from_json(value)?);
        }
        Ok(feed)
    }

    fn decode(&self, outputs: OutputMap) -> Result<Value> {
        let map: Map<String, Value> = outputs
            .iter()
            .map(|(name, tensor)| (name.clone(), tensor_to_json(tensor)))
            .collect();
        Ok(Value::Object(map))
    }
}

/// Convert a JSON number or (nested, rectangular) array of numbers to a tensor
pub fn tensor_from_json(value: &Value) -> std::result::Result<Tensor, BadInput> {
    let shape = infer_shape(value);
    // The shape only follows first elements; size the buffer from what `flatten` finds
    let mut flat = Vec::new();
    flatten(value, &shape, &mut flat)?;
    Array::from_shape_vec(IxDyn(&shape), flat).map_err(|e| BadInput::new(e.to_string()))
}

/// Convert a tensor to nested JSON lists; 0-d tensors become plain numbers
pub fn tensor_to_json(tensor: &Tensor) -> Value {
    view_to_json(tensor.view())
}

fn view_to_json(view: ArrayViewD<'_, f32>) -> Value {
    if view.ndim() == 0 {
        return view
            .iter()
            .next()
            .and_then(|&v| Number::from_f64(f64::from(v)))
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    Value::Array(view.outer_iter().map(view_to_json).collect())
}

/// Shape implied by following the first element at every nesting level
fn infer_shape(value: &Value) -> Vec<usize> {
    let mut shape = Vec::new();
    let mut current = value;
    while let Value::Array(items) = current {
        shape.push(items.len());
        match items.first() {
            Some(first) => current = first,
            None => break,
        }
    }
    shape
}

fn flatten(value: &Value, shape: &[usize], out: &mut Vec<f32>) -> std::result::Result<(), BadInput> {
    match (value, shape.split_first()) {
        (Value::Array(items), Some((&len, rest))) if items.len() == len => {
            for item in items {
                flatten(item, rest, out)?;
            }
            Ok(())
        }
        (Value::Array(_), _) | (_, Some(_)) => Err(BadInput::new(
            "inputs must be rectangular arrays of numbers",
        )),
        (scalar, None) => {
            out.push(scalar_to_f32(scalar)?);
            Ok(())
        }
    }
}

fn scalar_to_f32(value: &Value) -> std::result::Result<f32, BadInput> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| BadInput::new(format!("could not convert number to float: {}", n))),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f32>()
            .map_err(|_| BadInput::new(format!("could not convert string to float: '{}'", s))),
        Value::Null => Err(BadInput::new("could not convert null to float")),
        Value::Object(_) => Err(BadInput::new("could not convert object to float")),
        Value::Array(_) => Err(BadInput::new(
            "inputs must be rectangular arrays of numbers",
        )),
    }
}
