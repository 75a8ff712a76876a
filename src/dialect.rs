//! SQL dialects: driver identification, literal escaping, pagination syntax.

use crate::error::CoreError;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
    MsSql,
}

impl Dialect {
    /// Match a driver or url scheme name. MariaDB is served by the MySQL dialect.
    pub fn from_driver_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "pg" | "pgsql" | "postgres" | "postgresql" => Some(Dialect::Postgres),
            "sqlite" | "sqlite3" => Some(Dialect::Sqlite),
            "mssql" | "sqlserver" | "odbc" | "freetds" => Some(Dialect::MsSql),
            _ => None,
        }
    }

    /// Dialect from a connection url, e.g. `postgres://...` or `sqlite::memory:`.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?;
        Self::from_driver_name(scheme)
    }

    /// Name reported as `dbd_driver_name` in responses.
    pub fn driver_name(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "pgsql",
            Dialect::Sqlite => "sqlite3",
            Dialect::MsSql => "odbc",
        }
    }

    /// Escape a string for use inside single quotes.
    pub fn escape(&self, s: &str) -> String {
        match self {
            Dialect::MySql => {
                let mut out = String::with_capacity(s.len() + 2);
                for c in s.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("''"),
                        '"' => out.push_str("\\\""),
                        '\0' => out.push_str("\\0"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\x1a' => out.push_str("\\Z"),
                        c => out.push(c),
                    }
                }
                out
            }
            _ => s.replace('\'', "''"),
        }
    }

    /// Quoted string literal. MySQL literals carry a `_charset` introducer when the
    /// column declares one.
    pub fn quote_literal(&self, s: &str, charset: Option<&str>) -> String {
        match (self, charset) {
            (Dialect::MySql, Some(cs)) if is_charset_name(cs) => {
                format!("_{}'{}'", cs, self.escape(s))
            }
            _ => format!("'{}'", self.escape(s)),
        }
    }

    /// Whether `DEFAULT` may appear in an INSERT values list.
    pub fn supports_default_keyword(&self) -> bool {
        matches!(self, Dialect::MySql | Dialect::Postgres)
    }

    /// Expression ordering a column numerically.
    pub fn numeric_cast(&self, column: &str) -> String {
        match self {
            Dialect::MySql => format!("CAST({} AS UNSIGNED)", column),
            Dialect::Postgres => format!("CAST({} AS NUMERIC)", column),
            Dialect::Sqlite => format!("CAST({} AS INTEGER)", column),
            Dialect::MsSql => format!("TRY_CAST({} AS BIGINT)", column),
        }
    }

    /// Append ORDER BY and the page clause to a base SELECT.
    ///
    /// SQL Server needs an ORDER BY to page; without explicit ordering the primary
    /// key is used and its absence is an error.
    pub fn paginate(
        &self,
        base: &str,
        order_by: &[String],
        primary_key: Option<&str>,
        size: u64,
        offset: u64,
    ) -> Result<String, CoreError> {
        let ordered = if order_by.is_empty() {
            base.to_string()
        } else {
            format!("{} ORDER BY {}", base, order_by.join(","))
        };
        Ok(match self {
            Dialect::MySql => format!("{} LIMIT {},{}", ordered, offset, size),
            Dialect::Postgres | Dialect::Sqlite => {
                format!("{} LIMIT {} OFFSET {}", ordered, size, offset)
            }
            Dialect::MsSql => {
                let order = if order_by.is_empty() {
                    primary_key
                        .ok_or_else(|| CoreError::validation("Primary key not found"))?
                        .to_string()
                } else {
                    order_by.join(",")
                };
                format!(
                    "{} ORDER BY {} OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                    base, order, offset, size
                )
            }
        })
    }

    /// Total-rows query wrapping an unordered SELECT.
    pub fn count_query(&self, base: &str) -> String {
        format!("SELECT count(*) AS c FROM ({}) AS t", base)
    }
}

fn is_charset_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
