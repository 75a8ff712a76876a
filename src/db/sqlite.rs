use super::{Row, SqlExecutor};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnection, SqliteRow};

#[async_trait]
impl SqlExecutor for SqliteConnection {
    async fn select(&mut self, sql: &str) -> Result<Vec<Row>, sqlx::Error> {
        tracing::debug!(sql = %sql, "select");
        let rows = sqlx::query(sql).fetch_all(&mut *self).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        tracing::debug!(sql = %sql, "execute");
        let done = sqlx::query(sql).execute(&mut *self).await?;
        Ok(done.rows_affected())
    }
}

fn row_to_json(row: &SqliteRow) -> Row {
    use sqlx::Column;
    use sqlx::Row as _;
    let mut map = Row::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

/// SQLite values carry their storage class, so integers are tried before the
/// bool decoder (which also accepts integers).
fn cell_to_value(row: &SqliteRow, name: &str) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(b)) = row.try_get::<Option<Vec<u8>>, _>(name) {
        return Value::String(String::from_utf8_lossy(&b).into_owned());
    }
    Value::Null
}
