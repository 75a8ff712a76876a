use super::{
    catalog_select, column_names, first_text, ColumnAttribute, DriverAdapter, ForeignKey, Ident,
    ReferencingTable,
};
use crate::db::{self, SqlExecutor};
use crate::dialect::Dialect;
use crate::error::CoreError;
use async_trait::async_trait;

/// SQLite through the table-valued pragma functions. Flags the other catalogs
/// compute in SQL are derived here from the declared type.
pub struct SqliteAdapter;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

/// Column affinity from a declared type, in SQLite's rule order.
fn affinity(declared: &str) -> Affinity {
    let t = declared.to_ascii_uppercase();
    if t.contains("INT") {
        Affinity::Integer
    } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
        Affinity::Text
    } else if t.is_empty() || t.contains("BLOB") {
        Affinity::Blob
    } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
        Affinity::Real
    } else {
        Affinity::Numeric
    }
}

#[async_trait]
impl DriverAdapter for SqliteAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn table_exists(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Option<Ident>, CoreError> {
        let sql = format!(
            "SELECT name AS table_name FROM sqlite_master \
             WHERE type IN ('table','view') AND name={}",
            self.literal(table)
        );
        let rows = catalog_select(db, &sql).await?;
        Ok(first_text(&rows, "table_name").map(Ident::verified))
    }

    async fn column_exists(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
        column: &str,
    ) -> Result<Option<Ident>, CoreError> {
        let sql = format!(
            "SELECT name AS column_name FROM pragma_table_info({}) WHERE name={}",
            self.literal(table),
            self.literal(column)
        );
        let rows = catalog_select(db, &sql).await?;
        Ok(first_text(&rows, "column_name").map(Ident::verified))
    }

    async fn column_attributes(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<ColumnAttribute>, CoreError> {
        let Some(table_name) = self.table_exists(db, table).await? else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT t.cid AS cid, t.name AS column_name, t.type AS data_type, \
             t.\"notnull\" AS not_null, t.dflt_value AS column_default, t.pk AS pk, \
             e.encoding AS encoding \
             FROM pragma_table_info({}) AS t, pragma_encoding AS e ORDER BY t.cid",
            self.literal(table)
        );
        let rows = catalog_select(db, &sql).await?;
        let pk_count = rows.iter().filter(|r| db::integer(r, "pk").unwrap_or(0) > 0).count();
        let mut attrs = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(column) = db::text(row, "column_name") else {
                continue;
            };
            let declared = db::text(row, "data_type").unwrap_or_default();
            let upper = declared.to_ascii_uppercase();
            let is_pk = db::integer(row, "pk").unwrap_or(0) > 0;
            let aff = affinity(&declared);
            let is_date = upper.contains("DATE") || upper.contains("TIME");
            let is_numeric = !is_date && matches!(aff, Affinity::Integer | Affinity::Real | Affinity::Numeric);

            let mut attr = ColumnAttribute::new(
                table_name.clone(),
                Ident::verified(column),
                db::integer(row, "cid").unwrap_or(0) + 1,
            );
            attr.data_type = declared.clone();
            attr.column_type = Some(declared).filter(|d| !d.is_empty());
            attr.column_default = db::text(row, "column_default");
            // a lone INTEGER PRIMARY KEY aliases the rowid
            attr.is_auto_increment = is_pk && pk_count == 1 && upper == "INTEGER";
            attr.is_nullable = !db::flag(row, "not_null") && !is_pk;
            attr.is_numeric = is_numeric;
            attr.is_string = !is_numeric;
            attr.is_date = is_date;
            attr.is_boolean = upper.contains("BOOL");
            if aff == Affinity::Text {
                attr.character_set_name = db::text(row, "encoding");
            }
            attrs.push(attr);
        }
        Ok(attrs)
    }

    async fn primary_key_attributes(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<Ident>, CoreError> {
        let sql = format!(
            "SELECT name AS column_name FROM pragma_table_info({}) WHERE pk > 0 ORDER BY pk",
            self.literal(table)
        );
        let rows = catalog_select(db, &sql).await?;
        Ok(column_names(&rows))
    }

    async fn unsigned_attributes(
        &self,
        _db: &mut dyn SqlExecutor,
        _table: &str,
    ) -> Result<Vec<Ident>, CoreError> {
        Ok(Vec::new())
    }

    /// A reference written without a target column points at the parent's
    /// primary key; the column is filled from it.
    async fn foreign_key_attributes(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<ForeignKey>, CoreError> {
        let sql = format!(
            "SELECT \"from\" AS column_name, \"table\" AS referenced_table, \
             \"to\" AS referenced_column, seq AS seq \
             FROM pragma_foreign_key_list({}) ORDER BY id, seq",
            self.literal(table)
        );
        let rows = catalog_select(db, &sql).await?;
        let mut keys = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(mut fk) = ForeignKey::from_row(row) else {
                continue;
            };
            if fk.referenced_column.is_none() {
                let parent_pk = self
                    .primary_key_attributes(db, fk.referenced_table.as_str())
                    .await?;
                let seq = db::integer(row, "seq").unwrap_or(0).max(0) as usize;
                fk.referenced_column = parent_pk.get(seq).cloned();
            }
            keys.push(fk);
        }
        Ok(keys)
    }

    async fn tables_referencing(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<ReferencingTable>, CoreError> {
        let t = self.literal(table);
        let sql = format!(
            "SELECT DISTINCT m.name AS table_name FROM sqlite_master AS m \
             JOIN pragma_foreign_key_list(m.name) AS p ON p.\"table\"={t} \
             WHERE m.type='table' AND m.name!={t} ORDER BY m.name"
        );
        let rows = catalog_select(db, &sql).await?;
        Ok(rows
            .iter()
            .filter_map(|r| db::text(r, "table_name"))
            .map(|name| ReferencingTable {
                table_name: Ident::verified(name),
                foreign_key_count: None,
            })
            .collect())
    }

    async fn last_insert_id(&self, db: &mut dyn SqlExecutor) -> Result<Option<String>, CoreError> {
        let rows = catalog_select(db, "SELECT last_insert_rowid() AS last_id").await?;
        Ok(first_text(&rows, "last_id").filter(|id| id != "0"))
    }

    async fn server_version(&self, db: &mut dyn SqlExecutor) -> Result<Option<String>, CoreError> {
        let rows = catalog_select(db, "SELECT sqlite_version() AS version").await?;
        Ok(first_text(&rows, "version"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affinity_rules() {
        assert_eq!(affinity("INTEGER"), Affinity::Integer);
        assert_eq!(affinity("BIGINT UNSIGNED"), Affinity::Integer);
        assert_eq!(affinity("VARCHAR(20)"), Affinity::Text);
        assert_eq!(affinity(""), Affinity::Blob);
        assert_eq!(affinity("DOUBLE PRECISION"), Affinity::Real);
        assert_eq!(affinity("DECIMAL(10,2)"), Affinity::Numeric);
    }
}
