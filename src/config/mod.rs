//! Server settings: defaults, environment loading and validation.

pub mod loader;
pub mod types;
pub mod validator;

pub use types::{
    Settings, DEFAULT_API_PREFIX, DEFAULT_BIND_ADDR, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_CONNECTIONS,
};
pub use validator::validate;
