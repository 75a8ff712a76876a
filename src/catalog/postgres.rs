use super::{
    catalog_select, column_names, first_text, ColumnAttribute, DriverAdapter, ForeignKey, Ident,
    ReferencingTable,
};
use crate::db::{self, SqlExecutor};
use crate::dialect::Dialect;
use crate::error::CoreError;
use async_trait::async_trait;

/// PostgreSQL through INFORMATION_SCHEMA. Catalog domains (`sql_identifier`,
/// `cardinal_number`, ...) are cast to plain types so rows decode.
pub struct PostgresAdapter;

const SCHEMA_FILTER: &str = "table_schema = ANY (current_schemas(false))";

#[async_trait]
impl DriverAdapter for PostgresAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn table_exists(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Option<Ident>, CoreError> {
        let sql = format!(
            "SELECT table_name::text AS table_name FROM INFORMATION_SCHEMA.tables \
             WHERE {} AND table_name={}",
            SCHEMA_FILTER,
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
            "SELECT column_name::text AS column_name FROM INFORMATION_SCHEMA.columns \
             WHERE {} AND table_name={} AND column_name={}",
            SCHEMA_FILTER,
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
            "SELECT ordinal_position::int AS ordinal_position,\
             table_name::text AS table_name,\
             column_name::text AS column_name,\
             column_default::text AS column_default,\
             data_type::text AS data_type,\
             character_set_name::text AS character_set_name,\
             udt_name::text AS column_type,\
             CASE WHEN column_default LIKE 'nextval%' OR is_identity='YES' THEN 1 ELSE 0 END AS is_auto_increment,\
             CASE WHEN is_nullable='NO' THEN 0 ELSE 1 END AS is_nullable,\
             CASE WHEN numeric_precision IS NOT NULL THEN 1 ELSE 0 END AS is_numeric,\
             CASE WHEN numeric_precision IS NULL THEN 1 ELSE 0 END AS is_string,\
             CASE WHEN data_type IN ('date','timestamp without time zone','timestamp with time zone') \
             THEN 1 ELSE 0 END AS is_date,\
             CASE WHEN data_type='boolean' THEN 1 ELSE 0 END AS is_boolean \
             FROM INFORMATION_SCHEMA.columns WHERE {} AND table_name={} \
             ORDER BY ordinal_position ASC",
            SCHEMA_FILTER,
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
            "SELECT kcu.column_name::text AS column_name \
             FROM INFORMATION_SCHEMA.table_constraints tc \
             JOIN INFORMATION_SCHEMA.key_column_usage kcu \
             ON kcu.table_catalog=tc.table_catalog AND kcu.table_schema=tc.table_schema \
             AND kcu.table_name=tc.table_name AND kcu.constraint_name=tc.constraint_name \
             WHERE tc.constraint_type='PRIMARY KEY' AND tc.{} AND tc.table_name={} \
             ORDER BY kcu.ordinal_position",
            SCHEMA_FILTER,
            self.literal(table)
        );
        let rows = catalog_select(db, &sql).await?;
        Ok(column_names(&rows))
    }

    /// Columns guarded by a `CHECK (col >= 0)` constraint. Only the exact check
    /// text Postgres normalises that constraint to is recognised.
    async fn unsigned_attributes(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<Ident>, CoreError> {
        let sql = format!(
            "SELECT cu.column_name::text AS column_name \
             FROM INFORMATION_SCHEMA.constraint_column_usage AS cu \
             JOIN INFORMATION_SCHEMA.check_constraints AS cc \
             ON cc.constraint_schema=cu.constraint_schema AND cc.constraint_name=cu.constraint_name \
             WHERE cu.{} AND cu.table_name={} \
             AND cc.check_clause=concat('((', cu.column_name::text, ' >= 0))')",
            SCHEMA_FILTER,
            self.literal(table)
        );
        let rows = catalog_select(db, &sql).await?;
        Ok(column_names(&rows))
    }

    async fn foreign_key_attributes(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<ForeignKey>, CoreError> {
        let sql = format!(
            "SELECT k1.column_name::text AS column_name,\
             k2.table_schema::text AS referenced_schema,\
             k2.table_name::text AS referenced_table,\
             k2.column_name::text AS referenced_column \
             FROM INFORMATION_SCHEMA.key_column_usage k1 \
             JOIN INFORMATION_SCHEMA.referential_constraints fk \
             USING (constraint_schema, constraint_name) \
             JOIN INFORMATION_SCHEMA.key_column_usage k2 \
             ON k2.constraint_schema=fk.unique_constraint_schema \
             AND k2.constraint_name=fk.unique_constraint_name \
             AND k2.ordinal_position=k1.position_in_unique_constraint \
             WHERE k1.{} AND k1.table_name={t} AND k2.table_name!={t} \
             ORDER BY k1.ordinal_position",
            SCHEMA_FILTER,
            t = self.literal(table)
        );
        let rows = catalog_select(db, &sql).await?;
        Ok(rows.iter().filter_map(ForeignKey::from_row).collect())
    }

    async fn tables_referencing(
        &self,
        db: &mut dyn SqlExecutor,
        _table: &str,
    ) -> Result<Vec<ReferencingTable>, CoreError> {
        let sql = format!(
            "SELECT table_name::text AS table_name, count(table_name)::bigint AS count \
             FROM INFORMATION_SCHEMA.table_constraints \
             WHERE constraint_type='FOREIGN KEY' AND {} \
             GROUP BY table_name ORDER BY count DESC, table_name",
            SCHEMA_FILTER
        );
        let rows = catalog_select(db, &sql).await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                Some(ReferencingTable {
                    table_name: Ident::verified(db::text(r, "table_name")?),
                    foreign_key_count: db::integer(r, "count"),
                })
            })
            .collect())
    }

    /// Sequence names are not derivable from the catalog alone.
    async fn last_insert_id(&self, _db: &mut dyn SqlExecutor) -> Result<Option<String>, CoreError> {
        Ok(None)
    }

    async fn server_version(&self, db: &mut dyn SqlExecutor) -> Result<Option<String>, CoreError> {
        let rows = catalog_select(db, "SELECT version() AS version").await?;
        Ok(first_text(&rows, "version"))
    }

    fn scans_junctions_globally(&self) -> bool {
        true
    }
}
