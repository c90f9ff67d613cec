//! HTTP server for inference
//!
//! Exposes one inference endpoint plus liveness and shutdown routes:
//!
//! | Path        | Method | Behavior                                  |
//! |-------------|--------|-------------------------------------------|
//! | `/`         | POST   | encode → execute → decode, JSON response  |
//! | `/ping`     | any    | 200, empty body                           |
//! | `/shutdown` | POST   | graceful stop                             |
//!
//! Wrong methods on known paths get 405, unknown paths 404.

mod handlers;
mod lifecycle;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::engine::InferenceEngine;

pub use handlers::AppState;
pub use lifecycle::{Lifecycle, ServerState};
pub use routes::{api_routes, middleware_fn, Middleware};

/// Build the bare application router (no tracing, CORS or body limit)
pub fn router(state: Arc<AppState>, middleware: Option<Middleware>) -> Router {
    Router::new()
        .merge(api_routes(middleware))
        .with_state(state)
}

/// Router plus the layers `config` asks for: body limit, CORS, request tracing
pub fn app(state: Arc<AppState>, middleware: Option<Middleware>, config: &ServerConfig) -> Router {
    let mut app = router(state, middleware).layer(DefaultBodyLimit::max(config.max_body_size));

    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }
    if config.request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app
}

/// A bound, not yet running, inference server
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
    engine: Arc<InferenceEngine>,
    config: ServerConfig,
    middleware: Option<Middleware>,
    lifecycle: Arc<Lifecycle>,
}

impl Server {
    /// Bind the listener described by `config`
    pub async fn bind(engine: Arc<InferenceEngine>, config: &ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.addr()).await?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            addr,
            engine,
            config: config.clone(),
            middleware: None,
            lifecycle: Arc::new(Lifecycle::new()),
        })
    }

    /// Wrap every matched route with `middleware`
    pub fn with_middleware(mut self, middleware: Middleware) -> Self {
        self.middleware = Some(middleware);
        self
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared lifecycle handle; `trigger()` on it stops the server
    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.lifecycle)
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    /// Serve until a shutdown is triggered, then drain in-flight requests
    pub async fn run(self) -> Result<()> {
        let state = Arc::new(
            AppState::new(Arc::clone(&self.engine)).with_lifecycle(Arc::clone(&self.lifecycle)),
        );

        let app = app(state, self.middleware, &self.config);

        self.lifecycle.set_running();
        tracing::info!("Server listening on http://{}", self.addr);
        tracing::info!("API endpoints:");
        tracing::info!("  POST /         - Inference");
        tracing::info!("  ANY  /ping     - Readiness probe");
        tracing::info!("  POST /shutdown - Graceful shutdown");

        let lifecycle = Arc::clone(&self.lifecycle);
        let result = axum::serve(self.listener, app)
            .with_graceful_shutdown(async move {
                lifecycle.stopped().await;
                tracing::info!("Draining in-flight requests");
            })
            .await;

        self.lifecycle.set_stopped();
        tracing::info!("Server stopped");
        result?;
        Ok(())
    }
}

/// Start the HTTP inference server, stopping on `/shutdown` or Ctrl-C
pub async fn start(engine: Arc<InferenceEngine>, config: ServerConfig) -> Result<()> {
    let server = Server::bind(engine, &config).await?;

    let lifecycle = server.lifecycle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            lifecycle.trigger();
        }
    });

    server.run().await
}
