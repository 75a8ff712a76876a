//! Status of requests queued with the `Q2-Async` header.

use crate::error::AppError;
use crate::jobs::JobStatus;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

pub async fn job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let jobs = state
        .jobs
        .as_ref()
        .ok_or_else(|| AppError::NotFound(format!("job {}", id)))?;
    match jobs.status(&id).await? {
        JobStatus::NotFound => Err(AppError::NotFound(format!("job {}", id))),
        status => Ok(Json(json!({ "status": status.message() }))),
    }
}
