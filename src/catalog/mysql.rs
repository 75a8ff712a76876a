use super::{
    catalog_select, column_names, first_text, ColumnAttribute, DriverAdapter, ForeignKey, Ident,
    ReferencingTable,
};
use crate::db::{self, SqlExecutor};
use crate::dialect::Dialect;
use crate::error::CoreError;
use async_trait::async_trait;

/// MySQL and MariaDB through INFORMATION_SCHEMA, scoped to the connected database.
pub struct MySqlAdapter;

#[async_trait]
impl DriverAdapter for MySqlAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn table_exists(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Option<Ident>, CoreError> {
        let sql = format!(
            "SELECT table_name AS table_name FROM INFORMATION_SCHEMA.tables \
             WHERE table_schema=DATABASE() AND table_name={}",
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
            "SELECT column_name AS column_name FROM INFORMATION_SCHEMA.columns \
             WHERE table_schema=DATABASE() AND table_name={} AND column_name={}",
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
        let sql = format!(
            "SELECT ordinal_position AS ordinal_position,\
             table_name AS table_name,\
             column_name AS column_name,\
             column_default AS column_default,\
             data_type AS data_type,\
             character_set_name AS character_set_name,\
             column_type AS column_type,\
             column_key AS column_key,\
             column_comment AS column_comment,\
             (column_type LIKE '%unsigned%') AS is_unsigned,\
             (extra LIKE '%auto_increment%') AS is_auto_increment,\
             (is_nullable = 'YES') AS is_nullable,\
             (numeric_precision IS NOT NULL) AS is_numeric,\
             (numeric_precision IS NULL) AS is_string,\
             (data_type IN ('date','datetime','timestamp')) AS is_date,\
             (column_type LIKE 'tinyint(1)%') AS is_boolean \
             FROM INFORMATION_SCHEMA.columns \
             WHERE table_schema=DATABASE() AND table_name={} \
             ORDER BY ordinal_position ASC",
            self.literal(table)
        );
        let rows = catalog_select(db, &sql).await?;
        Ok(rows.iter().filter_map(ColumnAttribute::from_row).collect())
    }

    async fn primary_key_attributes(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<Ident>, CoreError> {
        let sql = format!(
            "SELECT column_name AS column_name FROM INFORMATION_SCHEMA.statistics \
             WHERE table_schema=DATABASE() AND table_name={} AND index_name='PRIMARY' \
             ORDER BY seq_in_index",
            self.literal(table)
        );
        let rows = catalog_select(db, &sql).await?;
        Ok(column_names(&rows))
    }

    /// Unsignedness is already part of `column_attributes`.
    async fn unsigned_attributes(
        &self,
        _db: &mut dyn SqlExecutor,
        _table: &str,
    ) -> Result<Vec<Ident>, CoreError> {
        Ok(Vec::new())
    }

    async fn foreign_key_attributes(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<ForeignKey>, CoreError> {
        let sql = format!(
            "SELECT column_name AS column_name,\
             referenced_table_schema AS referenced_schema,\
             referenced_table_name AS referenced_table,\
             referenced_column_name AS referenced_column \
             FROM INFORMATION_SCHEMA.key_column_usage \
             WHERE table_schema=DATABASE() AND referenced_column_name IS NOT NULL \
             AND table_name={} ORDER BY ordinal_position",
            self.literal(table)
        );
        let rows = catalog_select(db, &sql).await?;
        Ok(rows.iter().filter_map(ForeignKey::from_row).collect())
    }

    async fn tables_referencing(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<ReferencingTable>, CoreError> {
        let sql = format!(
            "SELECT DISTINCT table_name AS table_name \
             FROM INFORMATION_SCHEMA.key_column_usage \
             WHERE table_schema=DATABASE() AND referenced_table_name={} \
             ORDER BY table_name",
            self.literal(table)
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
        let rows = catalog_select(db, "SELECT last_insert_id() AS last_id").await?;
        Ok(first_text(&rows, "last_id").filter(|id| id != "0"))
    }

    async fn server_version(&self, db: &mut dyn SqlExecutor) -> Result<Option<String>, CoreError> {
        let rows = catalog_select(db, "SELECT version() AS version").await?;
        Ok(first_text(&rows, "version"))
    }
}
