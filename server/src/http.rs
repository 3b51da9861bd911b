//! Plain HTTP surface sharing the game port: the browser client's static
//! files, and the status endpoint of the HTTP-only variant.

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::path::PathBuf;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};

pub const STATUS_PATH: &str = "/api/status";

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Directory static files are served from
    pub public_dir: PathBuf,
    /// HTTP-only variant: different landing page, status endpoint, no upgrades
    pub simple: bool,
}

impl HttpConfig {
    pub fn index_file(&self) -> &'static str {
        if self.simple {
            "index-simple.html"
        } else {
            "index.html"
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.public_dir.join(self.index_file())
    }
}

/// Fixed payload of the status endpoint
pub fn status_body() -> serde_json::Value {
    serde_json::json!({
        "status": "woodstone is running!",
        "players": 1,
        "version": "1.0",
    })
}

async fn status() -> Json<serde_json::Value> {
    Json(status_body())
}

/// Static files under the public directory, plus the status endpoint in
/// simple mode. `/` is left to the caller, which decides between the
/// landing page and a WebSocket upgrade.
pub fn routes<S>(config: &HttpConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let mut router = Router::new();
    if config.simple {
        router = router.route(STATUS_PATH, get(status));
    }
    router.fallback_service(ServeDir::new(&config.public_dir))
}

/// Answers `GET /` and `HEAD /` with the landing page.
pub async fn index(config: &HttpConfig, request: Request) -> Response {
    match ServeFile::new(config.index_path()).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
