//! On-disk graph definition
//!
//! A graph file is a JSON document listing nodes in any order. Each node has a
//! single output addressed as `<name>:0`.
//!
//! ```json
//! {"nodes": [
//!   {"name": "x", "op": "placeholder", "attrs": {"shape": [-1, 5]}},
//!   {"name": "w", "op": "const", "attrs": {"shape": [5], "values": [0.1, 0.2, 0.3, 0.4, 0.5]}},
//!   {"name": "out", "op": "mul", "inputs": ["x", "w"]}
//! ]}
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Serialized graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDef {
    pub nodes: Vec<NodeDef>,
}

/// Serialized node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    pub op: OpKind,
    /// Input tensor references, bare op names allowed
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub attrs: NodeAttrs,
}

/// Supported operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Placeholder,
    Const,
    Variable,
    Identity,
    Add,
    Sub,
    Mul,
    #[serde(rename = "matmul")]
    MatMul,
    Sigmoid,
    Relu,
    Tanh,
    Softmax,
    Sum,
    Reshape,
}

impl OpKind {
    /// Number of tensor inputs the op consumes
    pub fn arity(self) -> usize {
        match self {
            OpKind::Placeholder | OpKind::Const | OpKind::Variable => 0,
            OpKind::Identity
            | OpKind::Sigmoid
            | OpKind::Relu
            | OpKind::Tanh
            | OpKind::Softmax
            | OpKind::Sum
            | OpKind::Reshape => 1,
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::MatMul => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Placeholder => "placeholder",
            OpKind::Const => "const",
            OpKind::Variable => "variable",
            OpKind::Identity => "identity",
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Mul => "mul",
            OpKind::MatMul => "matmul",
            OpKind::Sigmoid => "sigmoid",
            OpKind::Relu => "relu",
            OpKind::Tanh => "tanh",
            OpKind::Softmax => "softmax",
            OpKind::Sum => "sum",
            OpKind::Reshape => "reshape",
        }
    }
}

/// Op attributes; which ones are required depends on the op
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeAttrs {
    /// Placeholder/const/variable shape, or reshape target. `-1` marks an unknown dim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<i64>>,
    /// Flat row-major values for const/variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f32>>,
    /// Reduction axis for sum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<usize>,
}

impl GraphDef {
    /// Read a graph definition from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::model_load(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_graph_def() {
        let def: GraphDef = serde_json::from_str(
            r#"{"nodes": [
                {"name": "x", "op": "placeholder", "attrs": {"shape": [-1, 5]}},
                {"name": "y", "op": "matmul", "inputs": ["x", "w:0"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(def.nodes.len(), 2);
        assert_eq!(def.nodes[0].op, OpKind::Placeholder);
        assert_eq!(def.nodes[0].attrs.shape, Some(vec![-1, 5]));
        assert_eq!(def.nodes[1].op, OpKind::MatMul);
        assert_eq!(def.nodes[1].inputs, vec!["x", "w:0"]);
    }

    #[test]
    fn test_unknown_op_rejected() {
        let res: std::result::Result<GraphDef, _> =
            serde_json::from_str(r#"{"nodes": [{"name": "x", "op": "conv9d"}]}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_arity() {
        assert_eq!(OpKind::Placeholder.arity(), 0);
        assert_eq!(OpKind::Sum.arity(), 1);
        assert_eq!(OpKind::MatMul.arity(), 2);
    }
}
