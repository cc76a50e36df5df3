//! HTTP surface
//!
//! - `GET /health` reports component state and live probes
//! - `POST /query` runs one natural-language query through the pipeline
//!
//! Queries are rejected with 503 until every core component is built.

use crate::app::{AppContext, HealthReport};
use crate::error::{Error, Result};
use crate::pipeline::{QueryRequest, QueryResult};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the router over a shared application context
pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/query", post(handle_query))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Bind and serve until `shutdown` resolves
pub async fn serve<F>(ctx: Arc<AppContext>, bind: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| Error::Config(format!("Cannot bind {}: {}", bind, e)))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Shutdown complete.");
    Ok(())
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}

async fn handle_health(State(ctx): State<Arc<AppContext>>) -> Json<HealthReport> {
    Json(ctx.health().await)
}

async fn handle_query(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<QueryRequest>,
) -> std::result::Result<Json<QueryResult>, AppError> {
    let pipeline = ctx.pipeline().map_err(|e| {
        error!("Components not initialized. Cannot process query.");
        AppError::from(e)
    })?;
    Ok(Json(pipeline.handle_query(&request.natural_language_query).await))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.message })).into_response()
    }
}
