//! Next-page cursor for paginated whole-table reads.

use crate::catalog::DriverHandle;
use crate::db;
use crate::error::CoreError;
use crate::sql::Statement;
use regex::Regex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub size: u64,
    pub offset: u64,
}

impl Page {
    /// A total is only worth counting when the page came back full.
    pub fn needs_total(&self, returned: usize) -> bool {
        self.size > 0 && returned as u64 == self.size
    }

    pub fn next_offset(&self, total: u64) -> Option<u64> {
        let next = self.offset + self.size;
        (self.size > 0 && next < total).then_some(next)
    }
}

/// `path` with its `/next/<n>` segment set to `offset`, query string kept.
pub fn next_uri(path: &str, query: Option<&str>, offset: u64) -> Result<String, CoreError> {
    let re = Regex::new(r"/next/\d+/?$")
        .map_err(|e| CoreError::validation(format!("next cursor pattern: {}", e)))?;
    let cursor = format!("/next/{}", offset);
    let base = if re.is_match(path) {
        re.replace(path, cursor.as_str()).into_owned()
    } else {
        format!("{}{}", path.trim_end_matches('/'), cursor)
    };
    Ok(match query {
        Some(q) if !q.is_empty() => format!("{}?{}", base, q),
        _ => base,
    })
}

/// Run the count companion of a full page and return the row total with the
/// cursor to the following page, if any.
pub async fn track(
    db: &mut DriverHandle<'_>,
    stmt: &Statement,
    page: Page,
    returned: usize,
    path: &str,
    query: Option<&str>,
) -> Result<(Option<u64>, Option<String>), CoreError> {
    let Some(count_sql) = &stmt.count_sql else {
        return Ok((None, None));
    };
    if !page.needs_total(returned) {
        return Ok((None, None));
    }
    tracing::debug!(sql = %count_sql, "counting rows");
    let rows = db.conn.select(count_sql).await.map_err(CoreError::execution)?;
    let total = rows
        .first()
        .and_then(|r| db::integer(r, "c"))
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0);
    let next = match page.next_offset(total) {
        Some(offset) => Some(next_uri(path, query, offset)?),
        None => None,
    };
    Ok((Some(total), next))
}
