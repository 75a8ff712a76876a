//! Raw SQL execution over one backend connection, rows decoded to JSON objects.

mod mysql;
mod postgres;
mod sqlite;

use crate::dialect::Dialect;
use crate::error::ConfigError;
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{MySql, Postgres, Sqlite};

/// One result row, columns in select order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Executes literal SQL text on a single connection.
///
/// Implemented for the sqlx Postgres, MySQL and SQLite connections. SQL Server
/// callers supply their own implementation.
#[async_trait]
pub trait SqlExecutor: Send {
    async fn select(&mut self, sql: &str) -> Result<Vec<Row>, sqlx::Error>;

    /// Run a data-modifying statement; returns affected rows.
    async fn execute(&mut self, sql: &str) -> Result<u64, sqlx::Error>;
}

/// Connection pool for one of the bundled backends.
#[derive(Clone, Debug)]
pub enum DbPool {
    Postgres(PgPool),
    MySql(MySqlPool),
    Sqlite(SqlitePool),
}

pub enum PooledConnection {
    Postgres(PoolConnection<Postgres>),
    MySql(PoolConnection<MySql>),
    Sqlite(PoolConnection<Sqlite>),
}

impl DbPool {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, crate::error::AppError> {
        let dialect =
            Dialect::from_url(url).ok_or_else(|| ConfigError::UnsupportedDatabase(url.to_string()))?;
        Ok(match dialect {
            Dialect::Postgres => DbPool::Postgres(
                PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await?,
            ),
            Dialect::MySql => DbPool::MySql(
                MySqlPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await?,
            ),
            Dialect::Sqlite => DbPool::Sqlite(
                SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await?,
            ),
            Dialect::MsSql => return Err(ConfigError::UnsupportedDatabase(url.to_string()).into()),
        })
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            DbPool::Postgres(_) => Dialect::Postgres,
            DbPool::MySql(_) => Dialect::MySql,
            DbPool::Sqlite(_) => Dialect::Sqlite,
        }
    }

    pub async fn acquire(&self) -> Result<PooledConnection, sqlx::Error> {
        Ok(match self {
            DbPool::Postgres(p) => PooledConnection::Postgres(p.acquire().await?),
            DbPool::MySql(p) => PooledConnection::MySql(p.acquire().await?),
            DbPool::Sqlite(p) => PooledConnection::Sqlite(p.acquire().await?),
        })
    }

    /// Readiness probe.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        match self {
            DbPool::Postgres(p) => sqlx::query("SELECT 1").execute(p).await.map(|_| ()),
            DbPool::MySql(p) => sqlx::query("SELECT 1").execute(p).await.map(|_| ()),
            DbPool::Sqlite(p) => sqlx::query("SELECT 1").execute(p).await.map(|_| ()),
        }
    }
}

impl PooledConnection {
    pub fn executor(&mut self) -> &mut dyn SqlExecutor {
        match self {
            PooledConnection::Postgres(c) => &mut **c,
            PooledConnection::MySql(c) => &mut **c,
            PooledConnection::Sqlite(c) => &mut **c,
        }
    }
}

/// Read a column as text regardless of how the driver decoded it.
pub fn text(row: &Row, key: &str) -> Option<String> {
    let v = row
        .get(key)
        .or_else(|| row.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v))?;
    match v {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Read a 0/1, true/false or YES/NO column as a flag.
pub fn flag(row: &Row, key: &str) -> bool {
    match text(row, key) {
        Some(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "t"),
        None => false,
    }
}

pub fn integer(row: &Row, key: &str) -> Option<i64> {
    text(row, key).and_then(|s| s.trim().parse().ok())
}
