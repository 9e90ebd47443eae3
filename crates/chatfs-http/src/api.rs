use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method},
    response::Response,
    routing::get,
    Json, Router,
};
use chatfs_core::sign::clean_path;
use chatfs_core::{ChatDrive, Link, LinkKind, VirtualNode};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::HttpConfig;
use crate::error::HttpError;
use crate::sign::Blake3Signer;

#[derive(Clone)]
pub struct AppState {
    pub drive: Arc<ChatDrive>,
    pub signer: Arc<Blake3Signer>,
    pub config: Arc<HttpConfig>,
    /// Cancelled on shutdown; every in-flight transfer holds a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(drive: Arc<ChatDrive>, signer: Arc<Blake3Signer>, config: HttpConfig) -> Self {
        Self {
            drive,
            signer,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/fs/list", get(list_dir))
        .route("/p/*path", get(proxy))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    path: String,
}

#[derive(Deserialize)]
struct ProxyQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    sign: Option<String>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_dir(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<VirtualNode>>, HttpError> {
    let path = clean_path(&query.path);
    let dir = state.drive.resolve_path(&path).await?;
    if !dir.is_folder {
        return Err(HttpError::BadRequest(format!("{path} is not a directory")));
    }
    let nodes = state.drive.list(&dir.id, &path).await?;
    Ok(Json(nodes))
}

/// Signed link to a file's content, or its thumbnail with `type=thumb`.
async fn proxy(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, HttpError> {
    let path = clean_path(&path);
    let signature = query.sign.as_deref().unwrap_or_default();
    if !state.signer.verify(&path, signature) {
        return Err(HttpError::InvalidSignature);
    }

    let node = state.drive.resolve_path(&path).await?;
    let kind = LinkKind::from_query(query.kind.as_deref());
    let link = state
        .drive
        .link(&node.id, kind, &state.shutdown.child_token())
        .await?;

    info!(path = %path, id = %node.id, ?kind, "Serving link");
    Ok(link_response(link))
}

fn link_response(link: Link) -> Response {
    let headers = link.headers;
    let mut response = Response::new(Body::from_stream(link.body));
    let map = response.headers_mut();

    map.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&headers.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Ok(value) = HeaderValue::from_bytes(headers.content_disposition.as_bytes()) {
        map.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(len) = headers.content_length {
        map.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    response
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}
