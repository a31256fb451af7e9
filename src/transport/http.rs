//! HTTP transport
//!
//! JSON-RPC over `POST /mcp`, plus server info at `/` and a liveness probe
//! at `/health`. The body is parsed by hand so malformed JSON gets the same
//! -32700 answer as on stdio.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::dispatch::Dispatcher;
use crate::protocol::{McpRequest, McpResponse};

/// HTTP server exposing the dispatcher
pub struct HttpServer {
    dispatcher: Arc<Dispatcher>,
    addr: SocketAddr,
}

impl HttpServer {
    pub fn new(dispatcher: Arc<Dispatcher>, addr: SocketAddr) -> Self {
        Self { dispatcher, addr }
    }

    /// Build the router
    pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
        Router::new()
            .route("/mcp", post(mcp_handler))
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(dispatcher)
    }

    /// Start serving
    pub async fn start(self) -> std::io::Result<()> {
        let app = Self::router(self.dispatcher);

        tracing::info!("HTTP server listening on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// JSON-RPC endpoint
async fn mcp_handler(State(dispatcher): State<Arc<Dispatcher>>, body: String) -> Response {
    let request: McpRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            let response = McpResponse::error(None, -32700, format!("Parse error: {}", e));
            return Json(response).into_response();
        }
    };

    match dispatcher.handle(request).await {
        Some(response) => Json(response).into_response(),
        // notification: acknowledged, nothing to say
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Server information endpoint
async fn root_handler(State(dispatcher): State<Arc<Dispatcher>>) -> Response {
    let mut info = dispatcher.liveness();
    info["transport"] = json!("http");
    info["tools"] = json!(dispatcher.view().len());
    info["endpoints"] = json!({
        "mcp": "/mcp",
        "health": "/health",
    });
    Json(info).into_response()
}

/// Liveness probe
async fn health_handler(State(dispatcher): State<Arc<Dispatcher>>) -> Response {
    Json(dispatcher.liveness()).into_response()
}
