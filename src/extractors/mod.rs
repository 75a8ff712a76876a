//! Request extractors.

pub mod async_job;

pub use async_job::{AsyncRequested, ASYNC_HEADER};
