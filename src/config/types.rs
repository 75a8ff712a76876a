//! Runtime settings of the REST front end.

use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_API_PREFIX: &str = "/q2/v1";
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    /// Mount point of the resource routes, always two segments (`/q2/v1`).
    pub api_prefix: String,
    /// Rows per page for whole-table reads; 0 disables pagination.
    pub page_size: u64,
    /// Directory of the async job queue; async requests are refused without it.
    pub async_path: Option<PathBuf>,
    pub max_body_bytes: usize,
    pub max_connections: u32,
}

impl Settings {
    /// Settings with defaults for everything but the database.
    pub fn new(database_url: impl Into<String>) -> Self {
        Settings {
            database_url: database_url.into(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            page_size: 0,
            async_path: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}
