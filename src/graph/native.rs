//! Reference CPU execution backend
//!
//! Compiles a [`GraphDef`] into an immutable node table in topological order.
//! Execution only touches per-call state, so one `NativeGraph` can be shared
//! by any number of request threads without locking.

use std::collections::{HashMap, HashSet, VecDeque};

use ndarray::{Array, Axis, Ix2, IxDyn, Zip};

use super::def::{GraphDef, NodeAttrs, OpKind};
use super::names::{resolve, split};
use super::{format_declared_shape, format_shape, FeedMap, GraphHandle, Tensor, TensorInfo};
use crate::error::{Error, Result};

/// Compiled op with its attributes
#[derive(Debug, Clone)]
enum Op {
    Placeholder { shape: Vec<i64> },
    Value(Tensor),
    Uninitialized { shape: Vec<i64> },
    Identity,
    Add,
    Sub,
    Mul,
    MatMul,
    Sigmoid,
    Relu,
    Tanh,
    Softmax,
    Sum { axis: usize },
    Reshape { shape: Vec<i64> },
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    kind: OpKind,
    inputs: Vec<usize>,
    op: Op,
}

/// Graph loaded into memory and ready to execute
#[derive(Debug, Clone)]
pub struct NativeGraph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    /// Topological evaluation order
    order: Vec<usize>,
}

impl NativeGraph {
    /// Compile a graph definition, rejecting malformed graphs
    pub fn from_def(def: GraphDef) -> Result<Self> {
        let mut index = HashMap::with_capacity(def.nodes.len());
        for (i, node) in def.nodes.iter().enumerate() {
            if node.name.is_empty() || node.name.contains(':') {
                return Err(Error::model_load(format!(
                    "invalid node name '{}'",
                    node.name
                )));
            }
            if index.insert(node.name.clone(), i).is_some() {
                return Err(Error::model_load(format!(
                    "duplicate node name '{}'",
                    node.name
                )));
            }
        }

        let mut nodes = Vec::with_capacity(def.nodes.len());
        for node in def.nodes {
            if node.inputs.len() != node.op.arity() {
                return Err(Error::model_load(format!(
                    "node '{}' ({}) expects {} inputs, got {}",
                    node.name,
                    node.op.as_str(),
                    node.op.arity(),
                    node.inputs.len()
                )));
            }

            let mut inputs = Vec::with_capacity(node.inputs.len());
            for input in &node.inputs {
                let resolved = resolve(input);
                let target = split(&resolved)
                    .filter(|(_, output)| *output == 0)
                    .and_then(|(op, _)| index.get(op).copied())
                    .ok_or_else(|| {
                        Error::model_load(format!(
                            "node '{}' references unknown tensor '{}'",
                            node.name, input
                        ))
                    })?;
                inputs.push(target);
            }

            let op = compile_op(&node.name, node.op, &node.attrs)?;
            nodes.push(Node {
                name: node.name,
                kind: node.op,
                inputs,
                op,
            });
        }

        let order = topological_order(&nodes)?;
        Ok(Self {
            nodes,
            index,
            order,
        })
    }

    /// Restore variable values, e.g. from a checkpoint
    pub fn restore_variables(&mut self, values: HashMap<String, Vec<f32>>) -> Result<()> {
        for (name, flat) in values {
            let idx = *self.index.get(&name).ok_or_else(|| {
                Error::model_load(format!("checkpoint variable '{}' not in graph", name))
            })?;
            let node = &mut self.nodes[idx];
            if node.kind != OpKind::Variable {
                return Err(Error::model_load(format!(
                    "checkpoint entry '{}' is not a variable",
                    name
                )));
            }
            let shape = match &node.op {
                Op::Uninitialized { shape } => shape.clone(),
                Op::Value(t) => t.shape().iter().map(|&d| d as i64).collect(),
                _ => return Err(Error::model_load(format!("'{}' is not a variable", name))),
            };
            node.op = Op::Value(tensor_from_flat(&name, &shape, flat)?);
        }
        Ok(())
    }

    /// Number of nodes in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn lookup(&self, name: &str) -> Option<usize> {
        let (op, output) = split(name)?;
        if output != 0 {
            return None;
        }
        self.index.get(op).copied()
    }

    fn eval(&self, node: &Node, args: &[&Tensor]) -> Result<Tensor> {
        match &node.op {
            Op::Placeholder { shape } => Err(Error::execution(format!(
                "You must feed a value for placeholder tensor '{}:0' with shape {}",
                node.name,
                format_declared_shape(shape)
            ))),
            Op::Value(t) => Ok(t.clone()),
            Op::Uninitialized { .. } => Err(Error::execution(format!(
                "Attempting to use uninitialized value {}",
                node.name
            ))),
            Op::Identity => Ok(args[0].clone()),
            Op::Add => broadcast_binary(args[0], args[1], |a, b| a + b),
            Op::Sub => broadcast_binary(args[0], args[1], |a, b| a - b),
            Op::Mul => broadcast_binary(args[0], args[1], |a, b| a * b),
            Op::MatMul => matmul(args[0], args[1]),
            Op::Sigmoid => Ok(args[0].mapv(|v| 1.0 / (1.0 + (-v).exp()))),
            Op::Relu => Ok(args[0].mapv(|v| v.max(0.0))),
            Op::Tanh => Ok(args[0].mapv(f32::tanh)),
            Op::Softmax => softmax(args[0]),
            Op::Sum { axis } => {
                let input = args[0];
                if *axis >= input.ndim() {
                    return Err(Error::execution(format!(
                        "Invalid reduction dimension {} for input with {} dimensions",
                        axis,
                        input.ndim()
                    )));
                }
                Ok(input.sum_axis(Axis(*axis)))
            }
            Op::Reshape { shape } => reshape(args[0], shape),
        }
    }
}

impl GraphHandle for NativeGraph {
    fn placeholders(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.kind == OpKind::Placeholder)
            .map(|n| format!("{}:0", n.name))
            .collect()
    }

    fn has_tensor(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    fn execute(&self, outputs: &[String], feed: &FeedMap) -> Result<Vec<Tensor>> {
        let mut fetch = Vec::with_capacity(outputs.len());
        for name in outputs {
            let idx = self.lookup(name).ok_or_else(|| {
                Error::execution(format!(
                    "The name '{}' refers to a Tensor which does not exist",
                    name
                ))
            })?;
            fetch.push(idx);
        }

        let mut fed: HashMap<usize, &Tensor> = HashMap::with_capacity(feed.len());
        for (name, value) in feed {
            let idx = self.lookup(name).ok_or_else(|| {
                Error::execution(format!(
                    "Cannot interpret feed key '{}' as a Tensor in this graph",
                    name
                ))
            })?;
            if let Op::Placeholder { shape } = &self.nodes[idx].op {
                if !shape_compatible(shape, value.shape()) {
                    return Err(Error::execution(format!(
                        "Cannot feed value of shape {} for Tensor '{}', which has shape '{}'",
                        format_shape(value.shape()),
                        name,
                        format_declared_shape(shape)
                    )));
                }
            }
            fed.insert(idx, value);
        }

        // Only the subgraph reachable from the fetches, stopping at fed tensors
        let mut needed = HashSet::new();
        let mut stack = fetch.clone();
        while let Some(idx) = stack.pop() {
            if !needed.insert(idx) || fed.contains_key(&idx) {
                continue;
            }
            stack.extend(self.nodes[idx].inputs.iter().copied());
        }

        let mut values: Vec<Option<Tensor>> = vec![None; self.nodes.len()];
        for &idx in self.order.iter().filter(|i| needed.contains(*i)) {
            let value = match fed.get(&idx) {
                Some(t) => (*t).clone(),
                None => {
                    let node = &self.nodes[idx];
                    let args = node
                        .inputs
                        .iter()
                        .map(|&i| {
                            values[i].as_ref().ok_or_else(|| {
                                Error::execution(format!(
                                    "input of '{}' was not evaluated",
                                    node.name
                                ))
                            })
                        })
                        .collect::<Result<Vec<&Tensor>>>()?;
                    self.eval(node, &args)?
                }
            };
            values[idx] = Some(value);
        }

        fetch
            .iter()
            .map(|&idx| {
                values[idx]
                    .clone()
                    .ok_or_else(|| Error::execution("fetched tensor was not evaluated"))
            })
            .collect()
    }

    fn tensors(&self) -> Vec<TensorInfo> {
        self.nodes
            .iter()
            .map(|n| TensorInfo {
                name: format!("{}:0", n.name),
                op: n.kind.as_str().to_string(),
                shape: match &n.op {
                    Op::Placeholder { shape } | Op::Uninitialized { shape } => Some(shape.clone()),
                    Op::Value(t) => Some(t.shape().iter().map(|&d| d as i64).collect()),
                    _ => None,
                },
                dtype: "float32",
            })
            .collect()
    }
}

fn compile_op(name: &str, kind: OpKind, attrs: &NodeAttrs) -> Result<Op> {
    let require_shape = || {
        attrs
            .shape
            .clone()
            .ok_or_else(|| Error::model_load(format!("node '{}' is missing attr 'shape'", name)))
    };

    let op = match kind {
        OpKind::Placeholder => {
            let shape = require_shape()?;
            if shape.iter().any(|&d| d < -1) {
                return Err(Error::model_load(format!(
                    "node '{}' has invalid shape {:?}",
                    name, shape
                )));
            }
            Op::Placeholder { shape }
        }
        OpKind::Const => {
            let values = attrs.values.clone().ok_or_else(|| {
                Error::model_load(format!("node '{}' is missing attr 'values'", name))
            })?;
            Op::Value(tensor_from_flat(name, &require_shape()?, values)?)
        }
        OpKind::Variable => {
            let shape = require_shape()?;
            match attrs.values.clone() {
                Some(values) => Op::Value(tensor_from_flat(name, &shape, values)?),
                None => Op::Uninitialized { shape },
            }
        }
        OpKind::Identity => Op::Identity,
        OpKind::Add => Op::Add,
        OpKind::Sub => Op::Sub,
        OpKind::Mul => Op::Mul,
        OpKind::MatMul => Op::MatMul,
        OpKind::Sigmoid => Op::Sigmoid,
        OpKind::Relu => Op::Relu,
        OpKind::Tanh => Op::Tanh,
        OpKind::Softmax => Op::Softmax,
        OpKind::Sum => Op::Sum {
            axis: attrs.axis.ok_or_else(|| {
                Error::model_load(format!("node '{}' is missing attr 'axis'", name))
            })?,
        },
        OpKind::Reshape => {
            let shape = require_shape()?;
            if shape.iter().filter(|&&d| d == -1).count() > 1 || shape.iter().any(|&d| d < -1) {
                return Err(Error::model_load(format!(
                    "node '{}' has invalid reshape target {:?}",
                    name, shape
                )));
            }
            Op::Reshape { shape }
        }
    };
    Ok(op)
}

fn tensor_from_flat(name: &str, shape: &[i64], values: Vec<f32>) -> Result<Tensor> {
    if shape.iter().any(|&d| d < 0) {
        return Err(Error::model_load(format!(
            "node '{}' needs a fully known shape, got {:?}",
            name, shape
        )));
    }
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    let expected: usize = dims.iter().product();
    if values.len() != expected {
        return Err(Error::model_load(format!(
            "node '{}' has {} values for shape {:?} ({} expected)",
            name,
            values.len(),
            shape,
            expected
        )));
    }
    Array::from_shape_vec(IxDyn(&dims), values)
        .map_err(|e| Error::model_load(format!("node '{}': {}", name, e)))
}

/// Kahn's algorithm; any node left over sits on a cycle
fn topological_order(nodes: &[Node]) -> Result<Vec<usize>> {
    let mut indegree = vec![0usize; nodes.len()];
    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        for &input in &node.inputs {
            indegree[i] += 1;
            consumers[input].push(i);
        }
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &c in &consumers[i] {
            indegree[c] -= 1;
            if indegree[c] == 0 {
                queue.push_back(c);
            }
        }
    }

    if order.len() != nodes.len() {
        let stuck: Vec<&str> = (0..nodes.len())
            .filter(|&i| indegree[i] > 0)
            .map(|i| nodes[i].name.as_str())
            .collect();
        return Err(Error::model_load(format!(
            "graph contains a cycle through: {}",
            stuck.join(", ")
        )));
    }
    Ok(order)
}

fn shape_compatible(declared: &[i64], actual: &[usize]) -> bool {
    declared.len() == actual.len()
        && declared
            .iter()
            .zip(actual)
            .all(|(&d, &a)| d < 0 || d as usize == a)
}

fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let n = a.len().max(b.len());
    let pad_a = n - a.len();
    let pad_b = n - b.len();
    (0..n)
        .map(|i| {
            let da = if i < pad_a { 1 } else { a[i - pad_a] };
            let db = if i < pad_b { 1 } else { b[i - pad_b] };
            match (da, db) {
                _ if da == db => Some(da),
                (1, _) => Some(db),
                (_, 1) => Some(da),
                _ => None,
            }
        })
        .collect()
}

fn broadcast_binary(a: &Tensor, b: &Tensor, f: impl Fn(f32, f32) -> f32) -> Result<Tensor> {
    let incompatible = || {
        Error::execution(format!(
            "Incompatible shapes: {:?} vs. {:?}",
            a.shape(),
            b.shape()
        ))
    };
    let shape = broadcast_shape(a.shape(), b.shape()).ok_or_else(incompatible)?;
    let av = a.broadcast(IxDyn(&shape)).ok_or_else(incompatible)?;
    let bv = b.broadcast(IxDyn(&shape)).ok_or_else(incompatible)?;
    Ok(Zip::from(&av).and(&bv).map_collect(|&x, &y| f(x, y)))
}

fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    let incompatible = || {
        Error::execution(format!(
            "Matrix size-incompatible: In[0]: {:?}, In[1]: {:?}",
            a.shape(),
            b.shape()
        ))
    };
    let a2 = a
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| incompatible())?;
    let b2 = b
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| incompatible())?;
    if a2.ncols() != b2.nrows() {
        return Err(incompatible());
    }
    Ok(a2.dot(&b2).into_dyn())
}

fn softmax(input: &Tensor) -> Result<Tensor> {
    if input.ndim() == 0 {
        return Err(Error::execution("softmax requires at least one dimension"));
    }
    let axis = Axis(input.ndim() - 1);
    let mut out = input.clone();
    for mut lane in out.lanes_mut(axis) {
        let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        lane.mapv_inplace(|v| (v - max).exp());
        let total = lane.sum();
        lane.mapv_inplace(|v| v / total);
    }
    Ok(out)
}

fn reshape(input: &Tensor, target: &[i64]) -> Result<Tensor> {
    let total = input.len();
    let known: usize = target.iter().filter(|&&d| d >= 0).map(|&d| d as usize).product();
    let invalid = || {
        Error::execution(format!(
            "Cannot reshape a tensor with {} elements to shape {:?}",
            total, target
        ))
    };

    let dims: Vec<usize> = if target.contains(&-1) {
        if known == 0 || total % known != 0 {
            return Err(invalid());
        }
        target
            .iter()
            .map(|&d| if d < 0 { total / known } else { d as usize })
            .collect()
    } else {
        target.iter().map(|&d| d as usize).collect()
    };

    if dims.iter().product::<usize>() != total {
        return Err(invalid());
    }
    Array::from_shape_vec(IxDyn(&dims), input.iter().copied().collect()).map_err(|_| invalid())
}
