use super::{
    catalog_select, column_names, first_text, ColumnAttribute, DriverAdapter, ForeignKey, Ident,
    ReferencingTable,
};
use crate::db::{self, SqlExecutor};
use crate::dialect::Dialect;
use crate::error::CoreError;
use async_trait::async_trait;

/// SQL Server through INFORMATION_SCHEMA and COLUMNPROPERTY. Runs over any
/// caller-supplied [`SqlExecutor`].
pub struct MsSqlAdapter;

const FK_JOINS: &str = "FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE k \
     JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS c \
     ON k.table_name=c.table_name AND k.table_schema=c.table_schema \
     AND k.table_catalog=c.table_catalog AND k.constraint_catalog=c.constraint_catalog \
     AND k.constraint_name=c.constraint_name \
     JOIN INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc \
     ON rc.constraint_schema=c.constraint_schema AND rc.constraint_catalog=c.constraint_catalog \
     AND rc.constraint_name=c.constraint_name \
     JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE ccu \
     ON rc.unique_constraint_schema=ccu.constraint_schema \
     AND rc.unique_constraint_catalog=ccu.constraint_catalog \
     AND rc.unique_constraint_name=ccu.constraint_name \
     AND ccu.ordinal_position=k.ordinal_position";

#[async_trait]
impl DriverAdapter for MsSqlAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::MsSql
    }

    async fn table_exists(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Option<Ident>, CoreError> {
        let sql = format!(
            "SELECT table_name AS table_name FROM INFORMATION_SCHEMA.TABLES \
             WHERE table_catalog=DB_NAME() AND table_name={}",
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
            "SELECT column_name AS column_name FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE table_catalog=DB_NAME() AND table_name={} AND column_name={}",
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
            "SELECT ordinal_position AS ordinal_position,table_name AS table_name,\
             column_name AS column_name,column_default AS column_default,\
             data_type AS data_type,character_set_name AS character_set_name,\
             data_type AS column_type,\
             COLUMNPROPERTY(OBJECT_ID(table_schema+'.'+table_name), column_name, 'IsIdentity') \
             AS is_auto_increment,\
             CASE WHEN is_nullable='YES' THEN 1 ELSE 0 END AS is_nullable,\
             CASE WHEN numeric_precision IS NULL THEN 0 ELSE 1 END AS is_numeric,\
             CASE WHEN numeric_precision IS NULL THEN 1 ELSE 0 END AS is_string,\
             CASE WHEN data_type IN ('date','datetime','datetime2','smalldatetime') \
             THEN 1 ELSE 0 END AS is_date,\
             CASE WHEN data_type='bit' THEN 1 ELSE 0 END AS is_boolean \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE table_catalog=DB_NAME() AND table_name={} \
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
            "SELECT k.column_name AS column_name \
             FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE k \
             JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS c \
             ON k.table_name=c.table_name AND k.table_schema=c.table_schema \
             AND k.table_catalog=c.table_catalog AND k.constraint_catalog=c.constraint_catalog \
             AND k.constraint_name=c.constraint_name \
             WHERE c.constraint_type='PRIMARY KEY' AND k.constraint_catalog=DB_NAME() \
             AND k.table_name={} ORDER BY k.ordinal_position",
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

    async fn foreign_key_attributes(
        &self,
        db: &mut dyn SqlExecutor,
        table: &str,
    ) -> Result<Vec<ForeignKey>, CoreError> {
        let sql = format!(
            "SELECT k.column_name AS column_name,ccu.table_schema AS referenced_schema,\
             ccu.table_name AS referenced_table,ccu.column_name AS referenced_column \
             {} WHERE k.constraint_catalog=DB_NAME() AND k.table_name={} \
             AND c.constraint_type='FOREIGN KEY'",
            FK_JOINS,
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
        let t = self.literal(table);
        let sql = format!(
            "SELECT DISTINCT k.table_name AS table_name {} \
             WHERE k.constraint_catalog=DB_NAME() AND ccu.table_name={t} AND k.table_name!={t}",
            FK_JOINS
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

    /// Identity generated in the caller's scope; ids produced by triggers are not reported.
    async fn last_insert_id(&self, db: &mut dyn SqlExecutor) -> Result<Option<String>, CoreError> {
        let rows = catalog_select(db, "SELECT SCOPE_IDENTITY() AS last_id").await?;
        Ok(first_text(&rows, "last_id"))
    }

    async fn server_version(&self, db: &mut dyn SqlExecutor) -> Result<Option<String>, CoreError> {
        let rows = catalog_select(
            db,
            "SELECT CAST(SERVERPROPERTY('productversion') AS nvarchar(128)) AS version",
        )
        .await?;
        Ok(first_text(&rows, "version"))
    }
}
