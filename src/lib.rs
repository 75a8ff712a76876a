//! Schemarest SDK: REST access to relational tables, compiled from the live catalog.
//!
//! A request path such as `/q2/v1/authors/1/books` is resolved against the
//! database's own schema (tables, keys, foreign keys), turned into one SQL
//! statement for the backend's dialect, and executed.

pub mod catalog;
pub mod config;
pub mod db;
pub mod dialect;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod jobs;
pub mod pagination;
pub mod resolve;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use catalog::{adapter_for, ColumnAttribute, DriverAdapter, DriverHandle, Ident};
pub use config::Settings;
pub use db::{DbPool, SqlExecutor};
pub use dialect::Dialect;
pub use error::{AppError, ConfigError, CoreError};
pub use jobs::{FileJobQueue, JobQueue};
pub use resolve::{Method, RelationKind, RequestContext, ResolvedQuery};
pub use response::Envelope;
pub use routes::{app, common_routes, resource_routes};
pub use service::QueryService;
pub use state::AppState;
