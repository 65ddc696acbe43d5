//! Local dev server for the generated site.
//!
//! Serves the build directory as-is. Responses carry a no-store cache
//! policy so the service worker and hashed assets can be exercised without
//! the browser's HTTP cache getting in the way.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, info};

/// Start the dev server over a build directory.
pub async fn serve(dist_dir: &Path, host: &str, port: u16) -> anyhow::Result<()> {
    let app = router(dist_dir);
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("Serving {} at http://{}", dist_dir.display(), addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router; split out so tests can drive it without a socket.
pub fn router(dist_dir: &Path) -> Router {
    Router::new()
        .route("/", get(serve_path))
        .route("/*path", get(serve_path))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store"),
        ))
        .with_state(Arc::new(dist_dir.to_path_buf()))
}

async fn serve_path(State(dist): State<Arc<PathBuf>>, uri: Uri) -> Response {
    let request_path = uri.path().trim_start_matches('/');
    let mut path = dist.join(request_path);
    if request_path.is_empty() || uri.path().ends_with('/') {
        path = path.join("index.html");
    }
    debug!("requesting {}", path.display());

    match tokio::fs::read(&path).await {
        Ok(contents) => {
            let mime = mime_guess::from_path(&path)
                .first_or_octet_stream()
                .to_string();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime)],
                Body::from(contents),
            )
                .into_response()
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("An error occurred: {error}"),
        )
            .into_response(),
    }
}
