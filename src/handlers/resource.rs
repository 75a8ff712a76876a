//! The catch-all resource handler: one request in, one envelope out.

use crate::catalog::DriverHandle;
use crate::error::AppError;
use crate::extractors::AsyncRequested;
use crate::jobs::{JobRequest, JobStatus};
use crate::resolve::{Method, RequestContext};
use crate::response::{created_uri, Envelope};
use crate::service::QueryService;
use crate::state::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Query, State},
    http::{self, header, HeaderMap, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// An executed request ready to be sent.
pub struct Outcome {
    pub status: StatusCode,
    pub location: Option<String>,
    pub envelope: Envelope,
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self.location {
            Some(location) => (
                self.status,
                [(header::LOCATION, location)],
                Json(self.envelope),
            )
                .into_response(),
            None => (self.status, Json(self.envelope)).into_response(),
        }
    }
}

pub async fn dispatch(
    State(state): State<AppState>,
    AsyncRequested(async_requested): AsyncRequested,
    method: http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let method: Method = method
        .as_str()
        .parse()
        .map_err(|_| AppError::MethodNotAllowed(method.to_string()))?;
    let ctx = request_context(&state, method, &uri, &headers, &body).await?;

    if async_requested && method != Method::Get {
        return enqueue(state, &ctx).await;
    }
    Ok(execute(&state, &ctx).await?.into_response())
}

async fn request_context(
    state: &AppState,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<RequestContext, AppError> {
    let Query(params) = Query::<BTreeMap<String, String>>::try_from_uri(uri)
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let mut ctx = RequestContext::new(method, target)
        .with_params(params)
        .with_page_size(state.settings.page_size);
    if body.is_empty() {
        return Ok(ctx);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if content_type.starts_with("application/json") {
        ctx = ctx.with_form(json_params(body)?);
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        ctx = ctx.with_form(form_params(body).await?);
    } else if content_type.is_empty() && body.contains(&b'=') {
        ctx = ctx.with_form(form_params(body).await.unwrap_or_default());
    }
    Ok(ctx.with_body(String::from_utf8_lossy(body).into_owned()))
}

/// Flatten a JSON object body into column values. `null` becomes the NULL literal.
fn json_params(body: &Bytes) -> Result<BTreeMap<String, String>, AppError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(AppError::BadRequest("body must be a JSON object".into()));
    };
    Ok(map
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s,
                Value::Null => "NULL".to_string(),
                other => other.to_string(),
            };
            (k, v)
        })
        .collect())
}

async fn form_params(body: &Bytes) -> Result<BTreeMap<String, String>, AppError> {
    let req = Request::builder()
        .method(http::Method::POST)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.clone()))
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let Form(params) = Form::<BTreeMap<String, String>>::from_request(req, &())
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(params)
}

/// Resolve and run `ctx` on a pooled connection.
pub async fn execute(state: &AppState, ctx: &RequestContext) -> Result<Outcome, AppError> {
    let dialect = state.pool.dialect();
    let mut conn = state.pool.acquire().await?;
    let mut db = DriverHandle::new(dialect, conn.executor());

    let query = QueryService::resolve(ctx, &mut db).await?;
    let version = match QueryService::server_version(&mut db).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "server version unavailable");
            None
        }
    };

    let prefix = state.settings.api_prefix.as_str();
    let not_found = query.single_entity && query.results.is_empty();
    let location = match (ctx.method, &query.last_insert_id) {
        (Method::Post, Some(id)) => Some(created_uri(prefix, query.target_table.as_str(), id)),
        _ => None,
    };
    let status = match ctx.method {
        Method::Get if not_found => StatusCode::NOT_FOUND,
        Method::Post => StatusCode::CREATED,
        _ => StatusCode::OK,
    };
    Ok(Outcome {
        status,
        location,
        envelope: Envelope::success(query, ctx.method, dialect, version, prefix),
    })
}

async fn enqueue(state: AppState, ctx: &RequestContext) -> Result<Response, AppError> {
    let jobs = state
        .jobs
        .clone()
        .ok_or_else(|| AppError::BadRequest("asynchronous requests are not enabled".into()))?;
    let job = JobRequest::from_context(ctx);
    let id = jobs.enqueue(&job).await?;
    let location = format!("{}/async/{}", state.settings.api_prefix, id);

    spawn_job(state, id, job);

    Ok((
        StatusCode::ACCEPTED,
        [(header::LOCATION, location)],
        Json(serde_json::json!({ "status": JobStatus::Pending.message() })),
    )
        .into_response())
}

/// Run a queued request in the background and record its envelope.
pub fn spawn_job(state: AppState, id: String, job: JobRequest) {
    let Some(jobs) = state.jobs.clone() else {
        return;
    };
    tokio::spawn(async move {
        let outcome = match job.into_context() {
            Ok(ctx) => match execute(&state, &ctx).await {
                Ok(outcome) => outcome.envelope,
                Err(e) => Envelope::failure(e.to_string()),
            },
            Err(e) => Envelope::failure(e.to_string()),
        };
        let body = serde_json::to_value(&outcome).unwrap_or_default();
        if let Err(e) = jobs.complete(&id, &body).await {
            tracing::error!(job = %id, error = %e, "failed to record job outcome");
        }
    });
}
