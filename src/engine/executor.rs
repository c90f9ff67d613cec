//! Inference engine
//!
//! Owns the loaded graph and the two user transforms. Construction validates
//! the declared tensors once; `infer` runs the per-request pipeline:
//! encode → batch axis → name resolution → input-set check → execute →
//! batch axis removal → decode.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use super::batch::{add_batch_dim, remove_batch_dim};
use crate::error::{BadInput, Error, Result};
use crate::graph::{names, validate, FeedMap, GraphHandle, OutputMap};
use crate::handler::EncodeDecode;
use crate::loader;

/// Request bytes → input tensors
pub type EncodeFn = dyn Fn(&[u8]) -> anyhow::Result<FeedMap> + Send + Sync;

/// Output tensors → JSON-serializable response
pub type DecodeFn = dyn Fn(OutputMap) -> anyhow::Result<Value> + Send + Sync;

/// Inference engine
///
/// Immutable after construction and safe to share across request threads.
pub struct InferenceEngine {
    /// The loaded graph
    graph: Box<dyn GraphHandle>,
    /// Declared inputs, canonical
    inputs: Vec<String>,
    /// Declared outputs, canonical
    outputs: Vec<String>,
    encode: Box<EncodeFn>,
    decode: Box<DecodeFn>,
    /// Whether callbacks handle the batch dimension themselves
    batch: bool,
}

impl InferenceEngine {
    /// Load a model and build an engine around it
    ///
    /// # Arguments
    /// * `model_path` - `.graph` file, directory containing one, or checkpoint directory
    /// * `inputs` - Placeholder tensors fed by `encode` (bare op names allowed)
    /// * `outputs` - Tensors fetched and handed to `decode`
    /// * `encode` - Request body → input tensors
    /// * `decode` - Output tensors → response value
    /// * `batch` - If false, a singleton batch axis is added to inputs and
    ///             removed from outputs automatically
    pub fn new<P, I, O, E, D>(
        model_path: P,
        inputs: &[I],
        outputs: &[O],
        encode: E,
        decode: D,
        batch: bool,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        I: AsRef<str>,
        O: AsRef<str>,
        E: Fn(&[u8]) -> anyhow::Result<FeedMap> + Send + Sync + 'static,
        D: Fn(OutputMap) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let graph = loader::load_model(model_path)?;
        Self::from_graph(graph, inputs, outputs, encode, decode, batch)
    }

    /// Build an engine around an already loaded graph
    pub fn from_graph<I, O, E, D>(
        graph: Box<dyn GraphHandle>,
        inputs: &[I],
        outputs: &[O],
        encode: E,
        decode: D,
        batch: bool,
    ) -> Result<Self>
    where
        I: AsRef<str>,
        O: AsRef<str>,
        E: Fn(&[u8]) -> anyhow::Result<FeedMap> + Send + Sync + 'static,
        D: Fn(OutputMap) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        validate::check_tensors(graph.as_ref(), inputs)?;
        validate::check_tensors(graph.as_ref(), outputs)?;
        validate::check_placeholders(graph.as_ref(), inputs)?;

        let inputs = names::resolve_all(inputs);
        let outputs = names::resolve_all(outputs);

        tracing::info!(
            "Engine ready: inputs=[{}] outputs=[{}] batch={}",
            inputs.join(", "),
            outputs.join(", "),
            batch
        );

        Ok(Self {
            graph,
            inputs,
            outputs,
            encode: Box::new(encode),
            decode: Box::new(decode),
            batch,
        })
    }

    /// Load a model and use `handler` for both transforms
    pub fn with_handler<P, I, O>(
        model_path: P,
        inputs: &[I],
        outputs: &[O],
        handler: Arc<dyn EncodeDecode>,
        batch: bool,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        I: AsRef<str>,
        O: AsRef<str>,
    {
        tracing::debug!("Using {}", handler.description());
        let encoder = Arc::clone(&handler);
        Self::new(
            model_path,
            inputs,
            outputs,
            move |request| encoder.encode(request),
            move |outputs| handler.decode(outputs),
            batch,
        )
    }

    /// Declared input tensors, canonical
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Declared output tensors, canonical
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn is_batch(&self) -> bool {
        self.batch
    }

    /// Run one request through the pipeline
    ///
    /// Every error returned here is scoped to this request.
    pub fn infer(&self, request: &[u8]) -> Result<Value> {
        let feed = (self.encode)(request).map_err(|e| classify(e, Error::Encode))?;
        tracing::debug!("Encoded {} input tensors", feed.len());

        let mut resolved = FeedMap::with_capacity(feed.len());
        for (name, value) in feed {
            let value = if self.batch {
                value
            } else {
                add_batch_dim(value)
            };
            let canonical = names::resolve(&name);
            if resolved.insert(canonical.clone(), value).is_some() {
                return Err(Error::BadInput(format!(
                    "input tensor provided more than once: {}",
                    canonical
                )));
            }
        }

        validate::check_input(resolved.keys(), self.inputs.iter())?;

        let results = self
            .graph
            .execute(&self.outputs, &resolved)
            .map_err(|e| match e {
                e if e.is_request_error() => e,
                other => Error::Execution(other.to_string()),
            })?;
        if results.len() != self.outputs.len() {
            return Err(Error::Execution(format!(
                "graph returned {} values for {} requested outputs",
                results.len(),
                self.outputs.len()
            )));
        }

        let outputs: OutputMap = self
            .outputs
            .iter()
            .cloned()
            .zip(results)
            .map(|(name, value)| {
                let value = if self.batch {
                    value
                } else {
                    remove_batch_dim(value)
                };
                (name, value)
            })
            .collect();
        tracing::debug!("Executed graph, decoding {} outputs", outputs.len());

        (self.decode)(outputs).map_err(|e| classify(e, Error::Decode))
    }
}

impl fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("batch", &self.batch)
            .finish_non_exhaustive()
    }
}

/// Callback errors flagged with [`BadInput`] anywhere in their chain are the
/// caller's fault; anything else is wrapped with `other`.
fn classify(err: anyhow::Error, other: fn(String) -> Error) -> Error {
    match err.chain().find_map(|c| c.downcast_ref::<BadInput>()) {
        Some(bad) => Error::BadInput(bad.description.clone()),
        None => other(format!("{:#}", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphDef, NativeGraph, Tensor, TensorInfo};
    use crate::handler::JsonHandler;
    use anyhow::Context;
    use ndarray::{arr1, arr2};
    use serde_json::json;

    const GRAPH: &str = r#"{"nodes": [
        {"name": "x", "op": "placeholder", "attrs": {"shape": [-1, 5]}},
        {"name": "w", "op": "const", "attrs": {"shape": [5], "values": [0.1, -0.2, 0.05, 0.3, -0.4]}},
        {"name": "prod", "op": "mul", "inputs": ["x", "w"]},
        {"name": "logit", "op": "sum", "inputs": ["prod"], "attrs": {"axis": 1}},
        {"name": "b", "op": "const", "attrs": {"shape": [], "values": [-0.9]}},
        {"name": "z", "op": "add", "inputs": ["logit", "b"]},
        {"name": "out", "op": "sigmoid", "inputs": ["z"]}
    ]}"#;

    fn graph() -> Box<dyn GraphHandle> {
        let def: GraphDef = serde_json::from_str(GRAPH).unwrap();
        Box::new(NativeGraph::from_def(def).unwrap())
    }

    fn encode_x(request: &[u8]) -> anyhow::Result<FeedMap> {
        let value: Value = serde_json::from_slice(request)?;
        let mut feed = FeedMap::new();
        feed.insert("x".to_string(), crate::handler::tensor_from_json(&value)?);
        Ok(feed)
    }

    fn decode_out(outputs: OutputMap) -> anyhow::Result<Value> {
        Ok(crate::handler::tensor_to_json(&outputs["out:0"]))
    }

    fn engine(batch: bool) -> InferenceEngine {
        InferenceEngine::from_graph(graph(), &["x"], &["out"], encode_x, decode_out, batch)
            .unwrap()
    }

    #[test]
    fn test_construction_resolves_names() {
        let e = engine(false);
        assert_eq!(e.inputs(), &["x:0"]);
        assert_eq!(e.outputs(), &["out:0"]);
        assert!(!e.is_batch());
    }

    #[test]
    fn test_construction_unknown_tensor() {
        let err = InferenceEngine::from_graph(graph(), &["x"], &["nope"], encode_x, decode_out, false)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTensor(ref n) if n == "nope"));
    }

    #[test]
    fn test_construction_not_a_placeholder() {
        let err = InferenceEngine::from_graph(graph(), &["z"], &["out"], encode_x, decode_out, false)
            .unwrap_err();
        assert!(matches!(err, Error::NotAPlaceholder(ref n) if n == "z"));
    }

    #[test]
    fn test_construction_bad_paths() {
        let err =
            InferenceEngine::new("", &["x"], &["out"], encode_x, decode_out, false).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = InferenceEngine::new(
            "./does/not/exist.graph",
            &["x"],
            &["out"],
            encode_x,
            decode_out,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ModelNotFound(_)));
    }

    #[test]
    fn test_infer_single_example() {
        let e = engine(false);
        let out = e.infer(b"[1, 1, 1, 1, 1]").unwrap();
        assert!((out.as_f64().unwrap() - 0.259_225_1).abs() < 1e-5);

        let out = e.infer(b"[1, 2, 3, 4, 5]").unwrap();
        assert!((out.as_f64().unwrap() - 0.135_872_9).abs() < 1e-5);
    }

    #[test]
    fn test_infer_batch_mode() {
        let e = engine(true);
        let out = e.infer(b"[[1, 1, 1, 1, 1], [1, 2, 3, 4, 5]]").unwrap();
        let values = out.as_array().unwrap();
        assert_eq!(values.len(), 2);
        assert!((values[0].as_f64().unwrap() - 0.259_225_1).abs() < 1e-5);
        assert!((values[1].as_f64().unwrap() - 0.135_872_9).abs() < 1e-5);
    }

    #[test]
    fn test_infer_shape_mismatch() {
        let e = engine(false);
        let err = e.infer(b"[1, 2, 3, 4]").unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
        assert_eq!(
            err.to_string(),
            "Cannot feed value of shape (1, 4) for Tensor 'x:0', which has shape '(?, 5)'"
        );

        let err = e.infer(b"1234").unwrap_err();
        assert!(err
            .to_string()
            .contains("Cannot feed value of shape (1,) for Tensor 'x:0'"));
    }

    #[test]
    fn test_encode_failures_classified() {
        let e = engine(false);
        // "foo" is valid JSON but not a number
        let err = e.infer(br#""foo""#).unwrap_err();
        assert!(matches!(err, Error::BadInput(ref m) if m == "could not convert string to float: 'foo'"));

        // parse errors are not flagged as bad input by encode_x
        let err = e.infer(b"not json").unwrap_err();
        assert!(matches!(err, Error::Encode(_)));
    }

    #[test]
    fn test_bad_input_found_through_context() {
        let e = InferenceEngine::from_graph(
            graph(),
            &["x"],
            &["out"],
            |_req: &[u8]| -> anyhow::Result<FeedMap> {
                Err(BadInput::new("image too small")).context("decoding image")
            },
            decode_out,
            false,
        )
        .unwrap();
        let err = e.infer(b"abc").unwrap_err();
        assert!(matches!(err, Error::BadInput(ref m) if m == "image too small"));
    }

    #[test]
    fn test_input_set_must_match_exactly() {
        let extra = InferenceEngine::from_graph(
            graph(),
            &["x"],
            &["out"],
            |_req: &[u8]| -> anyhow::Result<FeedMap> {
                let mut feed = FeedMap::new();
                feed.insert("x:0".into(), arr1(&[1.0, 1.0, 1.0, 1.0, 1.0]).into_dyn());
                feed.insert("w".into(), arr1(&[0.0; 5]).into_dyn());
                Ok(feed)
            },
            decode_out,
            false,
        )
        .unwrap();
        match extra.infer(b"").unwrap_err() {
            Error::InputMismatch {
                missing,
                unexpected,
            } => {
                assert!(missing.is_empty());
                assert_eq!(unexpected, vec!["w:0"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let missing = InferenceEngine::from_graph(
            graph(),
            &["x"],
            &["out"],
            |_req: &[u8]| Ok(FeedMap::new()),
            decode_out,
            false,
        )
        .unwrap();
        assert!(matches!(
            missing.infer(b"").unwrap_err(),
            Error::InputMismatch { .. }
        ));
    }

    #[test]
    fn test_duplicate_input_after_resolution() {
        let e = InferenceEngine::from_graph(
            graph(),
            &["x"],
            &["out"],
            |_req: &[u8]| -> anyhow::Result<FeedMap> {
                let mut feed = FeedMap::new();
                feed.insert("x".into(), arr1(&[1.0; 5]).into_dyn());
                feed.insert("x:0".into(), arr1(&[2.0; 5]).into_dyn());
                Ok(feed)
            },
            decode_out,
            false,
        )
        .unwrap();
        assert!(matches!(e.infer(b"").unwrap_err(), Error::BadInput(_)));
    }

    #[test]
    fn test_decode_failure() {
        let e = InferenceEngine::from_graph(
            graph(),
            &["x"],
            &["out"],
            encode_x,
            |_outputs: OutputMap| -> anyhow::Result<Value> { anyhow::bail!("label map missing") },
            false,
        )
        .unwrap();
        let err = e.infer(b"[1, 1, 1, 1, 1]").unwrap_err();
        assert!(matches!(err, Error::Decode(ref m) if m.contains("label map missing")));
    }

    #[test]
    fn test_with_json_handler() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.graph");
        std::fs::write(&path, GRAPH).unwrap();

        let e = InferenceEngine::with_handler(
            &path,
            &["x"],
            &["out", "logit"],
            Arc::new(JsonHandler::new(&["x"])),
            false,
        )
        .unwrap();
        let out = e.infer(br#"{"x": [1, 1, 1, 1, 1]}"#).unwrap();
        assert!((out["out:0"].as_f64().unwrap() - 0.259_225_1).abs() < 1e-5);
        assert!((out["logit:0"].as_f64().unwrap() + 0.15).abs() < 1e-5);

        let err = e.infer(b"").unwrap_err();
        assert!(matches!(err, Error::BadInput(ref m) if m == "empty request"));
        let err = e.infer(br#"{"y": [1]}"#).unwrap_err();
        assert!(matches!(err, Error::BadInput(ref m) if m == "missing inputs: x:0"));
    }

    /// Graph whose execution result count never matches the request
    struct ShortGraph;

    impl GraphHandle for ShortGraph {
        fn placeholders(&self) -> Vec<String> {
            vec!["x:0".to_string()]
        }

        fn has_tensor(&self, name: &str) -> bool {
            name == "x:0" || name == "y:0"
        }

        fn execute(&self, _outputs: &[String], _feed: &FeedMap) -> Result<Vec<Tensor>> {
            Ok(Vec::new())
        }

        fn tensors(&self) -> Vec<TensorInfo> {
            Vec::new()
        }
    }

    #[test]
    fn test_missing_execution_results() {
        let e = InferenceEngine::from_graph(
            Box::new(ShortGraph),
            &["x"],
            &["y"],
            |_req: &[u8]| -> anyhow::Result<FeedMap> {
                let mut feed = FeedMap::new();
                feed.insert("x".into(), arr2(&[[1.0]]).into_dyn());
                Ok(feed)
            },
            |_o: OutputMap| Ok(json!(null)),
            true,
        )
        .unwrap();
        assert!(matches!(e.infer(b"").unwrap_err(), Error::Execution(_)));
    }
}
