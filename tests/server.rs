use std::sync::Arc;
use std::time::Duration;

use graphserve::{InferenceEngine, JsonHandler, Server, ServerConfig, ServerState};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const MODELS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/models");

fn engine(model: &str) -> Arc<InferenceEngine> {
    let engine = InferenceEngine::with_handler(
        model,
        &["x"],
        &["out"],
        Arc::new(JsonHandler::new(&["x"])),
        false,
    )
    .unwrap();
    Arc::new(engine)
}

fn local_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    }
}

/// Send one HTTP/1.1 request, returning the status code and body
async fn request(addr: std::net::SocketAddr, method: &str, path: &str, body: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let raw = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        method,
        path,
        addr,
        body.len(),
        body
    );
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8(response).unwrap();

    let status = response
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

#[tokio::test]
async fn test_serve_infer_and_shutdown() {
    let server = Server::bind(engine(&format!("{}/graph.graph", MODELS)), &local_config())
        .await
        .unwrap();
    let addr = server.local_addr();
    let lifecycle = server.lifecycle();
    assert_eq!(server.state(), ServerState::Stopped);

    let handle = tokio::spawn(server.run());

    let (status, body) = request(addr, "GET", "/ping", "").await;
    assert_eq!(status, 200);
    assert!(body.is_empty());
    assert_eq!(lifecycle.state(), ServerState::Running);

    let (status, body) = request(addr, "POST", "/", r#"{"x": [1, 2, 3, 4, 5]}"#).await;
    assert_eq!(status, 200);
    let value: Value = serde_json::from_str(&body).unwrap();
    let out = value["out:0"].as_f64().unwrap();
    assert!((out - 0.135_872_9).abs() < 1e-5);

    let (status, _) = request(addr, "POST", "/", r#"{"x": [1, 2, 3, 4]}"#).await;
    assert_eq!(status, 400);

    let (status, _) = request(addr, "GET", "/ping", "").await;
    assert_eq!(status, 200);

    let (status, _) = request(addr, "POST", "/shutdown", "").await;
    assert_eq!(status, 200);

    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(lifecycle.state(), ServerState::Stopped);
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_are_isolated() {
    let server = Server::bind(engine(&format!("{}/graph.graph", MODELS)), &local_config())
        .await
        .unwrap();
    let addr = server.local_addr();
    let lifecycle = server.lifecycle();
    let handle = tokio::spawn(server.run());

    let cases = [
        (r#"{"x": [1, 1, 1, 1, 1]}"#, Some(0.259_225_1)),
        (r#"{"x": [1, 2, 3, 4, 5]}"#, Some(0.135_872_9)),
        (r#"{"x": [1, 2, 3, 4]}"#, None),
        (r#"{"x": "foo"}"#, None),
    ];

    let mut tasks = Vec::new();
    for i in 0..32 {
        let (body, expected) = cases[i % cases.len()];
        tasks.push(tokio::spawn(async move {
            let (status, text) = request(addr, "POST", "/", body).await;
            (status, text, expected)
        }));
    }

    for task in tasks {
        let (status, text, expected) = task.await.unwrap();
        match expected {
            Some(expected) => {
                assert_eq!(status, 200, "{}", text);
                let value: Value = serde_json::from_str(&text).unwrap();
                assert!((value["out:0"].as_f64().unwrap() - expected).abs() < 1e-5);
            }
            None => assert_eq!(status, 400, "{}", text),
        }
    }

    let (status, _) = request(addr, "GET", "/ping", "").await;
    assert_eq!(status, 200);

    lifecycle.trigger();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_trigger_is_idempotent() {
    let server = Server::bind(engine(&format!("{}/graph.graph", MODELS)), &local_config())
        .await
        .unwrap();
    let lifecycle = server.lifecycle();
    let handle = tokio::spawn(server.run());

    assert!(lifecycle.trigger());
    assert!(!lifecycle.trigger());

    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(lifecycle.state(), ServerState::Stopped);
}

#[tokio::test]
async fn test_serve_checkpoint_directory() {
    let server = Server::bind(engine(&format!("{}/ckpt", MODELS)), &local_config())
        .await
        .unwrap();
    let addr = server.local_addr();
    let lifecycle = server.lifecycle();
    let handle = tokio::spawn(server.run());

    let (status, body) = request(addr, "POST", "/", r#"{"x": [1, 1, 1, 1, 1]}"#).await;
    assert_eq!(status, 200);
    let value: Value = serde_json::from_str(&body).unwrap();
    assert!((value["out:0"].as_f64().unwrap() - 0.259_225_1).abs() < 1e-5);

    lifecycle.trigger();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}
