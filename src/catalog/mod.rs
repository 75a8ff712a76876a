//! Catalog introspection: one adapter per dialect answering fixed schema questions.
//!
//! Table and column names taken from a request only ever reach catalog queries as
//! escaped string literals. Names that may be interpolated into data statements are
//! [`Ident`] values, which can only be built from catalog results.

mod mssql;
mod mysql;
mod postgres;
mod sqlite;

pub use mssql::MsSqlAdapter;
pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;

use crate::db::{self, Row, SqlExecutor};
use crate::dialect::Dialect;
use crate::error::CoreError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// A table or column name confirmed by the live catalog.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Ident(String);

impl Ident {
    /// Only catalog adapters (and tests) may mint identifiers.
    pub(crate) fn verified(name: impl Into<String>) -> Self {
        Ident(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Ident {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Ident {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<String> for Ident {
    fn eq(&self, other: &String) -> bool {
        &self.0 == other
    }
}

/// Catalog metadata for one column of the resolved table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnAttribute {
    pub ordinal_position: i64,
    pub table_name: Ident,
    pub column_name: Ident,
    pub column_default: Option<String>,
    pub data_type: String,
    pub character_set_name: Option<String>,
    pub column_type: Option<String>,
    pub column_key: Option<String>,
    pub column_comment: Option<String>,
    pub is_unsigned: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub is_auto_increment: bool,
    pub is_nullable: bool,
    pub is_numeric: bool,
    pub is_string: bool,
    pub is_date: bool,
    pub is_boolean: bool,
    /// Discovery URI for foreign-key columns.
    pub column_options: Option<String>,
    pub referenced_schema: Option<String>,
    pub referenced_table: Option<Ident>,
    pub referenced_column: Option<Ident>,
    pub is_referenced_pk_multi: bool,
    /// Comma list when the referenced key is composite.
    pub referenced_pk: Option<String>,
}

impl ColumnAttribute {
    /// Attribute with catalog-neutral defaults; adapters fill the rest.
    pub(crate) fn new(table: Ident, column: Ident, ordinal_position: i64) -> Self {
        ColumnAttribute {
            ordinal_position,
            table_name: table,
            column_name: column,
            column_default: None,
            data_type: String::new(),
            character_set_name: None,
            column_type: None,
            column_key: None,
            column_comment: None,
            is_unsigned: false,
            is_primary_key: false,
            is_foreign_key: false,
            is_auto_increment: false,
            is_nullable: true,
            is_numeric: false,
            is_string: true,
            is_date: false,
            is_boolean: false,
            column_options: None,
            referenced_schema: None,
            referenced_table: None,
            referenced_column: None,
            is_referenced_pk_multi: false,
            referenced_pk: None,
        }
    }

    /// Build from a catalog row whose columns use the attribute field names.
    pub(crate) fn from_row(row: &Row) -> Option<Self> {
        let table = db::text(row, "table_name")?;
        let column = db::text(row, "column_name")?;
        let mut attr = ColumnAttribute::new(
            Ident::verified(table),
            Ident::verified(column),
            db::integer(row, "ordinal_position").unwrap_or(0),
        );
        attr.column_default = non_null_text(row, "column_default");
        attr.data_type = db::text(row, "data_type").unwrap_or_default();
        attr.character_set_name = non_null_text(row, "character_set_name");
        attr.column_type = non_null_text(row, "column_type");
        attr.column_key = non_null_text(row, "column_key");
        attr.column_comment = non_null_text(row, "column_comment");
        attr.is_unsigned = db::flag(row, "is_unsigned");
        attr.is_auto_increment = db::flag(row, "is_auto_increment");
        attr.is_nullable = db::flag(row, "is_nullable");
        attr.is_numeric = db::flag(row, "is_numeric");
        attr.is_string = db::flag(row, "is_string");
        attr.is_date = db::flag(row, "is_date");
        attr.is_boolean = db::flag(row, "is_boolean");
        Some(attr)
    }
}

/// Catalogs spell a missing value as SQL NULL or the text `null`.
fn non_null_text(row: &Row, key: &str) -> Option<String> {
    db::text(row, key).filter(|s| !s.is_empty() && s != "null")
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ForeignKey {
    pub column_name: Ident,
    pub referenced_schema: Option<String>,
    pub referenced_table: Ident,
    /// Absent when the catalog leaves it implicit (SQLite references to a primary key).
    pub referenced_column: Option<Ident>,
}

impl ForeignKey {
    pub(crate) fn from_row(row: &Row) -> Option<Self> {
        Some(ForeignKey {
            column_name: Ident::verified(db::text(row, "column_name")?),
            referenced_schema: non_null_text(row, "referenced_schema"),
            referenced_table: Ident::verified(db::text(row, "referenced_table")?),
            referenced_column: non_null_text(row, "referenced_column").map(Ident::verified),
        })
    }
}

/// A table holding foreign keys; `foreign_key_count` is set by global scans.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReferencingTable {
    pub table_name: Ident,
    pub foreign_key_count: Option<i64>,
}

/// Fixed catalog questions answered per backend.
#[async_trait]
pub trait DriverAdapter: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn table_exists(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Option<Ident>, CoreError>;

    async fn column_exists(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
        column: &str,
    ) -> Result<Option<Ident>, CoreError>;

    /// Ordered by ordinal position.
    async fn column_attributes(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<ColumnAttribute>, CoreError>;

    async fn primary_key_attributes(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<Ident>, CoreError>;

    /// Columns known unsigned outside of `column_attributes`.
    async fn unsigned_attributes(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<Ident>, CoreError>;

    async fn foreign_key_attributes(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<ForeignKey>, CoreError>;

    /// Tables with foreign keys to `table`. Adapters that scan junctions globally
    /// ignore `table` and return every table holding foreign keys, with counts.
    async fn tables_referencing(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<ReferencingTable>, CoreError>;

    async fn last_insert_id(&self, db: &mut dyn SqlExecutor) -> Result<Option<String>, CoreError>;

    async fn server_version(&self, db: &mut dyn SqlExecutor) -> Result<Option<String>, CoreError>;

    /// Whether many-to-many discovery scans all multi-key tables rather than the
    /// tables referencing the last path table.
    fn scans_junctions_globally(&self) -> bool {
        false
    }

    fn literal(&self, s: &str) -> String {
        self.dialect().quote_literal(s, None)
    }
}

static MYSQL: MySqlAdapter = MySqlAdapter;
static POSTGRES: PostgresAdapter = PostgresAdapter;
static SQLITE: SqliteAdapter = SqliteAdapter;
static MSSQL: MsSqlAdapter = MsSqlAdapter;

/// The adapter serving a dialect.
pub fn adapter_for(dialect: Dialect) -> &'static dyn DriverAdapter {
    match dialect {
        Dialect::MySql => &MYSQL,
        Dialect::Postgres => &POSTGRES,
        Dialect::Sqlite => &SQLITE,
        Dialect::MsSql => &MSSQL,
    }
}

/// A connection bound to the adapter for its dialect.
pub struct DriverHandle<'c> {
    pub adapter: &'static dyn DriverAdapter,
    pub conn: &'c mut dyn SqlExecutor,
}

impl<'c> DriverHandle<'c> {
    pub fn new(dialect: Dialect, conn: &'c mut dyn SqlExecutor) -> Self {
        DriverHandle {
            adapter: adapter_for(dialect),
            conn,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.adapter.dialect()
    }
}

/// Run a catalog query, mapping driver failures to schema errors.
pub(crate) async fn catalog_select(
    db: &mut dyn SqlExecutor,
    sql: &str,
) -> Result<Vec<Row>, CoreError> {
    db.select(sql).await.map_err(CoreError::catalog)
}

/// Names from the `column_name` column of each row.
pub(crate) fn column_names(rows: &[Row]) -> Vec<Ident> {
    rows.iter()
        .filter_map(|r| db::text(r, "column_name"))
        .map(Ident::verified)
        .collect()
}

/// First value of `key` in the first row.
pub(crate) fn first_text(rows: &[Row], key: &str) -> Option<String> {
    rows.first().and_then(|r| db::text(r, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_from_row() {
        let row: Row = json!({
            "ordinal_position": 2,
            "table_name": "books",
            "column_name": "title",
            "column_default": "null",
            "data_type": "varchar",
            "character_set_name": "utf8mb4",
            "is_nullable": 0,
            "is_numeric": 0,
            "is_string": 1,
            "is_auto_increment": "0"
        })
        .as_object()
        .unwrap()
        .clone();
        let attr = ColumnAttribute::from_row(&row).unwrap();
        assert_eq!(attr.column_name, "title");
        assert_eq!(attr.ordinal_position, 2);
        assert_eq!(attr.column_default, None);
        assert_eq!(attr.character_set_name.as_deref(), Some("utf8mb4"));
        assert!(!attr.is_nullable);
        assert!(attr.is_string);
    }

    #[test]
    fn test_adapter_dispatch() {
        assert_eq!(adapter_for(Dialect::Sqlite).dialect(), Dialect::Sqlite);
        assert!(adapter_for(Dialect::Postgres).scans_junctions_globally());
        assert!(!adapter_for(Dialect::MySql).scans_junctions_globally());
    }
}
