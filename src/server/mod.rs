//! HTTP surface. Routing stays in [`routes::route_request`]; axum only carries requests to it
//! on a blocking worker, and serves `static_dir` (when configured) for everything outside `/api`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::config::CatalogConfig;

pub mod api;
pub mod routes;

pub struct ServerContext {
    pub config: CatalogConfig,
}

impl ServerContext {
    pub fn new(config: CatalogConfig) -> Self {
        ServerContext { config }
    }
}

impl IntoResponse for routes::HttpResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

pub fn app(ctx: Arc<ServerContext>) -> Router {
    let router: Router<Arc<ServerContext>> = Router::new().route("/api/*path", any(dispatch));
    let router = match &ctx.config.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.fallback(dispatch),
    };
    router.with_state(ctx)
}

async fn dispatch(
    State(ctx): State<Arc<ServerContext>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let method = method.as_str().to_string();
    let body = String::from_utf8_lossy(&body).into_owned();

    let handled = tokio::task::spawn_blocking(move || {
        routes::route_request(&ctx, &method, &path, &body)
    })
    .await;
    match handled {
        Ok(response) => response.into_response(),
        Err(err) => {
            error!(error = %err, "request handler panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn run_server(config: CatalogConfig) -> std::io::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let bind_addr = config.bind_addr.clone();
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        info!(addr = %bind_addr, root = %config.storage_root.display(), "metacat server listening on http://{bind_addr}");
        axum::serve(listener, app(Arc::new(ServerContext::new(config)))).await
    })
}
