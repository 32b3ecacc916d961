//! Router wiring for the query API (C5; spec §4.5, §6.5).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{metadata, properties};
use crate::api::rate_limit;
use crate::api::state::AppState;

/// The metrics handle is wired in separately from `AppState` since it's
/// process-wide infrastructure, not request-scoped application state.
pub fn build(state: Arc<AppState>, metrics: Arc<opinionated_metrics::Handle>) -> Router {
    Router::new()
        .route("/properties", get(properties::handle))
        .route("/properties/filters/metadata", get(metadata::handle))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit::enforce))
        .route("/healthz", get(healthz))
        .route("/metrics", get(render_metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .layer(axum::Extension(metrics))
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn render_metrics(
    axum::Extension(metrics): axum::Extension<Arc<opinionated_metrics::Handle>>,
) -> String {
    metrics.render().unwrap_or_default()
}

/// Run the server until `shutdown` resolves, draining in-flight requests
/// first (spec §6.5: "stop accepting new work, drain in-flight ... exit
/// 0").
pub async fn serve(
    listen_address: &str,
    router: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr: SocketAddr = listen_address.parse()?;
    axum::Server::bind(&addr)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
