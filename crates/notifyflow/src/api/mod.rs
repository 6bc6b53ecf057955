use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::jobs::error_codes::suggested_action;
use crate::jobs::metrics;
use crate::jobs::model::NewJob;
use crate::jobs::store::{JobStore, StoreError};

/// Operator-facing HTTP surface: enqueue entrypoint plus read-only
/// inspection. Enabled only when an admin address is configured.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn JobStore>,
    /// Attempt budget stamped onto jobs admitted through the API.
    pub default_max_attempts: i32,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/jobs", post(enqueue_job))
        .route("/jobs/:id", get(job_status))
        .route("/dlq", get(list_dlq))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct EnqueueBody {
    job_type: String,
    payload: Value,
    /// Milliseconds to hold the job in the delayed set; 0 or absent means
    /// immediately ready.
    delay_ms: Option<i64>,
    max_attempts: Option<i32>,
}

/// Accepts `{job_type, payload, delay_ms?}` and returns 202 with the job id.
/// "Accepted" is the only delivery guarantee made here.
async fn enqueue_job(
    State(state): State<ApiState>,
    Json(body): Json<EnqueueBody>,
) -> Response {
    if body.job_type.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "job_type must be non-empty"})),
        )
            .into_response();
    }

    let max_attempts = body.max_attempts.unwrap_or(state.default_max_attempts);
    let delay_ms = body.delay_ms.unwrap_or(0);
    let new = if delay_ms > 0 {
        NewJob::after_ms(&body.job_type, body.payload, delay_ms, max_attempts)
    } else {
        NewJob::now(&body.job_type, body.payload, max_attempts)
    };

    match state.store.enqueue(new).await {
        Ok(id) => (
            StatusCode::ACCEPTED,
            Json(json!({"job_id": id, "status": "accepted"})),
        )
            .into_response(),
        Err(e) => store_error(e),
    }
}

/// A job that finished successfully (or is mid-processing) reports
/// "absent" — success leaves no record by design.
async fn job_status(State(state): State<ApiState>, Path(id): Path<Uuid>) -> Response {
    match state.store.status_of(id).await {
        Ok(Some(status)) => {
            Json(json!({"job_id": id, "status": status.as_str()})).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"job_id": id, "status": "absent"})),
        )
            .into_response(),
        Err(e) => store_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct DlqQuery {
    limit: Option<usize>,
}

async fn list_dlq(State(state): State<ApiState>, Query(q): Query<DlqQuery>) -> Response {
    let limit = q.limit.unwrap_or(100).clamp(1, 500);
    match state.store.list_dead(limit).await {
        Ok(entries) => {
            let items: Vec<Value> = entries
                .iter()
                .map(|e| {
                    let code = e.job.last_error_code.as_deref().unwrap_or("UNKNOWN");
                    json!({
                        "job_id": e.job.id,
                        "job_type": e.job.job_type,
                        "attempts": e.job.attempts,
                        "enqueued_at": e.job.enqueued_at,
                        "dead_at": e.dead_at,
                        "reason_code": e.reason_code,
                        "reason": e.reason,
                        "suggested_action": suggested_action(code),
                    })
                })
                .collect();
            Json(json!({"dead_letters": items})).into_response()
        }
        Err(e) => store_error(e),
    }
}

async fn stats(State(state): State<ApiState>) -> Response {
    match metrics::snapshot(state.store.as_ref()).await {
        Ok(m) => Json(m).into_response(),
        Err(e) => store_error(e),
    }
}

fn store_error(e: StoreError) -> Response {
    let status = match e {
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"error": e.to_string()}))).into_response()
}
