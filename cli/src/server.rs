//! HTTP surface: `GET /health` and `POST /evaluate`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use jury_engine::{ErrorReport, EvaluationError, EvaluationResponse, Jury};

pub const SERVICE_NAME: &str = "agent-jury-backend";

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
struct AppState {
    jury: Arc<Jury>,
}

/// An error rendered as `{error, details, code}` with its taxonomy status.
#[derive(Debug)]
pub struct ApiError(ErrorReport);

impl From<EvaluationError> for ApiError {
    fn from(err: EvaluationError) -> Self {
        let report = err.report();
        if report.status >= 500 {
            tracing::error!(status = report.status, code = report.code, error = %err, "Evaluation failed");
        } else {
            tracing::warn!(status = report.status, code = report.code, error = %err, "Evaluation rejected");
        }
        Self(report)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ErrorReport {
            status: rejection.status().as_u16(),
            code: "input_invalid",
            error: "Request body must be a JSON object".to_string(),
            details: Some(rejection.body_text()),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ErrorReport {
            status,
            code,
            error,
            details,
        } = self.0;
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut body = json!({ "error": error, "code": code });
        if let Some(details) = details {
            body["details"] = Value::String(details);
        }

        (status, Json(body)).into_response()
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true, "service": SERVICE_NAME }))
}

async fn evaluate(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    let Json(body) = payload?;
    // Missing or non-string case_text is treated as empty.
    let case_text = body
        .get("case_text")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let response = state.jury.evaluate(case_text).await?;
    Ok(Json(response))
}

pub fn router(jury: Arc<Jury>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/evaluate", post(evaluate))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { jury })
}

/// Serve until Ctrl-C.
pub async fn serve(listener: TcpListener, jury: Arc<Jury>) -> std::io::Result<()> {
    axum::serve(listener, router(jury))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
