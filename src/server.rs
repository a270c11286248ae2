//! Static relay for the browser shell: index page, service worker, manifest,
//! offline page and anything under `/static/`. It never touches the journal
//! file.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::{
    io,
    net::SocketAddr,
    path::{Component, PathBuf},
    sync::Arc,
};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub static_dir: PathBuf,
    pub template_dir: PathBuf,
}

type SharedConfig = Arc<RelayConfig>;

pub fn router(config: RelayConfig) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/sw.js", get(service_worker))
        .route("/manifest.json", get(manifest))
        .route("/offline", get(offline))
        .route("/static/*path", get(static_asset))
        .with_state(Arc::new(config))
}

pub async fn run(addr: SocketAddr, config: RelayConfig) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, static_dir = %config.static_dir.display(), "web relay listening");
    axum::serve(listener, router(config)).await
}

async fn index(State(config): State<SharedConfig>) -> Response {
    send_file(config.template_dir.join("index.html"), "text/html; charset=utf-8").await
}

async fn service_worker(State(config): State<SharedConfig>) -> Response {
    let mut response = send_file(config.static_dir.join("sw.js"), "application/javascript").await;
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate, max-age=0"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

async fn manifest(State(config): State<SharedConfig>) -> Response {
    send_file(config.static_dir.join("manifest.json"), "application/json").await
}

async fn offline(State(config): State<SharedConfig>) -> Response {
    send_file(config.template_dir.join("offline.html"), "text/html; charset=utf-8").await
}

async fn static_asset(
    State(config): State<SharedConfig>,
    Path(path): Path<String>,
) -> Response {
    let Some(relative) = asset_path(&path) else {
        warn!(path = %path, "rejected static path outside the static directory");
        return StatusCode::NOT_FOUND.into_response();
    };
    let content_type = content_type_for(&relative);
    send_file(config.static_dir.join(relative), content_type).await
}

/// Only plain relative components; `..`, roots and prefixes are refused.
fn asset_path(raw: &str) -> Option<PathBuf> {
    let candidate = PathBuf::from(raw);
    let plain = candidate
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    (plain && candidate.components().next().is_some()).then_some(candidate)
}

fn content_type_for(path: &std::path::Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("webmanifest") => "application/manifest+json",
        Some("html") => "text/html; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

async fn send_file(path: PathBuf, content_type: &'static str) -> Response {
    match tokio::fs::read(&path).await {
        Ok(body) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "static file missing");
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "static file unreadable");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
