//! Detect a request asking to be answered asynchronously (`Q2-Async` header).

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const ASYNC_HEADER: &str = "Q2-Async";

/// True when the `Q2-Async` header is present with a truthy value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AsyncRequested(pub bool);

#[async_trait]
impl<S> FromRequestParts<S> for AsyncRequested
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let requested = parts
            .headers
            .get(ASYNC_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_ascii_lowercase())
            .is_some_and(|s| matches!(s.as_str(), "1" | "true" | "yes" | "on"));
        Ok(AsyncRequested(requested))
    }
}
