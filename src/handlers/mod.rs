//! HTTP handlers for resource requests and async job status.

pub mod jobs;
pub mod resource;
pub use jobs::*;
pub use resource::*;
