use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Request, State, WebSocketUpgrade},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower::util::ServiceExt;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::debug;

use crate::{relay, state::AppState};

#[derive(Debug, Serialize)]
struct IpResponse {
    ip: String,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ip", get(ip_handler))
        .route("/healthz", get(health_handler))
        .route("/debug/stats", get(stats_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(fallback_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn ip_handler(State(state): State<Arc<AppState>>) -> Json<IpResponse> {
    Json(IpResponse {
        ip: state.local_address(),
    })
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.stats().await)
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.render_metrics();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

/// Every path without an API route is either a relay upgrade or a static file.
async fn fallback_handler(
    State(state): State<Arc<AppState>>,
    ws: Option<WebSocketUpgrade>,
    request: Request,
) -> Response {
    if let Some(ws) = ws {
        debug!(path = %request.uri().path(), "upgrading relay connection");
        return ws
            .on_upgrade(move |socket| relay::handle_connection(socket, state))
            .into_response();
    }

    if is_player_path(request.uri().path()) {
        return into_response(ServeFile::new(state.player_page()).oneshot(request).await);
    }

    into_response(ServeDir::new(&state.public_dir).oneshot(request).await)
}

fn into_response<R: IntoResponse>(result: Result<R, Infallible>) -> Response {
    match result {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

fn is_player_path(path: &str) -> bool {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    trimmed.eq_ignore_ascii_case("/player")
}
