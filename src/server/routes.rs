//! Route definitions

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{from_fn, Next},
    response::Response,
    routing::{any, post},
    Router,
};
use futures::future::BoxFuture;

use super::handlers::{infer, not_found, ping, shutdown, AppState};

/// Request wrapper applied to every matched route
///
/// Receives the request and the rest of the stack; call `next.run(request)`
/// to invoke the route handler.
pub type Middleware = Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wrap an async function as a [`Middleware`]
pub fn middleware_fn<F, Fut>(f: F) -> Middleware
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req: Request, next: Next| -> BoxFuture<'static, Response> {
        Box::pin(f(req, next))
    })
}

/// Create the API router
///
/// Paths are exact: no trailing-slash normalization.
pub fn api_routes(middleware: Option<Middleware>) -> Router<Arc<AppState>> {
    let router = Router::new()
        // Inference
        .route("/", post(infer))
        // Readiness probe, any method
        .route("/ping", any(ping))
        // Lifecycle
        .route("/shutdown", post(shutdown));

    let router = match middleware {
        Some(mw) => router.route_layer(from_fn(move |req: Request, next: Next| mw(req, next))),
        None => router,
    };

    router.fallback(not_found)
}
