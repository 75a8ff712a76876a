//! Typed errors and HTTP mapping.

use crate::response::Envelope;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// The single error value surfaced at the resolve boundary.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Table or column not found, or a catalog query failed.
    #[error("schema: {0}")]
    Schema(String),
    /// No relation candidate matched the path.
    #[error("relation: {0}")]
    Relation(String),
    /// Missing mandatory parameter, disallowed multi-key operation, malformed filter.
    #[error("validation: {0}")]
    Validation(String),
    /// The backend rejected the synthesized statement.
    #[error("execution: {0}")]
    Execution(String),
}

impl CoreError {
    pub fn schema(msg: impl Into<String>) -> Self {
        CoreError::Schema(msg.into())
    }

    pub fn relation(msg: impl Into<String>) -> Self {
        CoreError::Relation(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    /// Catalog failures are schema errors; statement failures are execution errors.
    pub fn catalog(e: sqlx::Error) -> Self {
        CoreError::Schema(e.to_string())
    }

    pub fn execution(e: sqlx::Error) -> Self {
        CoreError::Execution(e.to_string())
    }

    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Schema(_) => "schema_error",
            CoreError::Relation(_) => "relation_error",
            CoreError::Validation(_) => "validation_error",
            CoreError::Execution(_) => "execution_error",
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("unsupported database url: {0}")]
    UnsupportedDatabase(String),
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job storage: {0}")]
    Io(#[from] std::io::Error),
    #[error("job encoding: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid job id: {0}")]
    InvalidId(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Core(CoreError::Schema(_)) => StatusCode::NOT_FOUND,
            AppError::Core(CoreError::Relation(_)) => StatusCode::NOT_FOUND,
            AppError::Core(CoreError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Core(CoreError::Execution(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Job(JobError::InvalidId(_)) => StatusCode::BAD_REQUEST,
            AppError::Job(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Db(e) => {
                if let sqlx::Error::PoolTimedOut = e {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Envelope::failure(self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_status_mapping() {
        assert_eq!(AppError::from(CoreError::schema("t")).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(CoreError::validation("x")).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(CoreError::Execution("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_core_error_message() {
        let e = CoreError::validation("Parameter name is mandatory");
        assert_eq!(e.to_string(), "validation: Parameter name is mandatory");
        assert_eq!(e.code(), "validation_error");
    }
}
