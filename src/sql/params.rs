//! Request parameter values: filter grammar and literal encoding.
//!
//! A value may carry a `filter:value` prefix. Filter letters:
//! `a`/`d` order ascending/descending, `A`/`D` order numerically,
//! `r` range (`r:5,10`, `r:5,`, `r:,10`), `s` set (`s:1,2,3`).
//! `*` alone matches everything and `NULL` matches SQL NULL.

use crate::catalog::ColumnAttribute;
use crate::dialect::Dialect;
use crate::error::CoreError;
use crate::resolve::RelatedTable;
use std::collections::BTreeMap;

/// Predicate and ordering contributed by one parameter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    pub predicate: Option<String>,
    pub order_by: Option<String>,
}

/// Split `raw` into its filter letters and value. A prefix that is not purely
/// alphabetic belongs to the value, so times like `10:30` stay intact.
fn split_filter(raw: &str) -> (Option<&str>, &str) {
    match raw.split_once(':') {
        Some((f, v)) if !f.is_empty() && f.chars().all(|c| c.is_ascii_alphabetic()) => (Some(f), v),
        _ => (None, raw),
    }
}

pub fn parse_value(
    dialect: Dialect,
    attr: &ColumnAttribute,
    raw: &str,
) -> Result<Filter, CoreError> {
    let col = attr.column_name.as_str();
    let (filter, value) = split_filter(raw);
    let mut out = Filter::default();

    if let Some(f) = filter {
        out.order_by = if f.contains('a') {
            Some(format!("{} ASC", col))
        } else if f.contains('d') {
            Some(format!("{} DESC", col))
        } else if f.contains('A') {
            Some(format!("{} ASC, {} ASC", dialect.numeric_cast(col), col))
        } else if f.contains('D') {
            Some(format!("{} DESC, {} DESC", dialect.numeric_cast(col), col))
        } else {
            None
        };
        if f.contains('r') {
            out.predicate = range(dialect, attr, value)?;
            return Ok(out);
        }
        if f.contains('s') {
            out.predicate = set(dialect, attr, value);
            return Ok(out);
        }
        if value.is_empty() {
            return Ok(out);
        }
    }
    if value == "*" {
        return Ok(out);
    }
    out.predicate = Some(comparison(dialect, attr, value));
    Ok(out)
}

fn tokens(value: &str) -> Vec<&str> {
    value.split(',').filter(|t| !t.is_empty()).collect()
}

fn range(dialect: Dialect, attr: &ColumnAttribute, value: &str) -> Result<Option<String>, CoreError> {
    let col = &attr.column_name;
    let bounds = tokens(value);
    Ok(match bounds.as_slice() {
        [] => None,
        [one] => {
            let v = encode_value(dialect, attr, one, false);
            if value.starts_with(',') {
                Some(format!("({}<={})", col, v))
            } else {
                Some(format!("({}>={})", col, v))
            }
        }
        [low, high] => Some(format!(
            "({col}>={}) AND ({col}<={})",
            encode_value(dialect, attr, low, false),
            encode_value(dialect, attr, high, false),
        )),
        _ => {
            return Err(CoreError::validation(format!(
                "Range filter on {} takes at most two values",
                col
            )))
        }
    })
}

fn set(dialect: Dialect, attr: &ColumnAttribute, value: &str) -> Option<String> {
    let members: Vec<String> = tokens(value)
        .into_iter()
        .map(|t| comparison(dialect, attr, t))
        .collect();
    if members.is_empty() {
        None
    } else {
        Some(format!("({})", members.join(" OR ")))
    }
}

fn comparison(dialect: Dialect, attr: &ColumnAttribute, value: &str) -> String {
    let col = &attr.column_name;
    let encoded = encode_value(dialect, attr, value, true);
    if encoded == "NULL" {
        format!("{} IS NULL", col)
    } else if charset(attr).is_some() {
        format!("({} LIKE {})", col, encoded)
    } else {
        format!("({}={})", col, encoded)
    }
}

/// Character set of a textual column; numeric and date columns have none.
fn charset(attr: &ColumnAttribute) -> Option<&str> {
    if attr.is_numeric || attr.is_date {
        None
    } else {
        attr.character_set_name.as_deref()
    }
}

pub fn is_number(s: &str) -> bool {
    !s.is_empty() && s.trim() == s && s.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Encode a request value as a literal for `attr`'s column.
///
/// Numeric columns take number-shaped values unquoted; everything else is
/// escaped and quoted. With `wildcard`, `*` in textual values becomes `%`.
pub fn encode_value(dialect: Dialect, attr: &ColumnAttribute, raw: &str, wildcard: bool) -> String {
    if raw.eq_ignore_ascii_case("null") {
        return "NULL".to_string();
    }
    if attr.is_numeric && is_number(raw) {
        return raw.to_string();
    }
    let cs = charset(attr);
    if wildcard && cs.is_some() {
        dialect.quote_literal(&raw.replace('*', "%"), cs)
    } else {
        dialect.quote_literal(raw, cs)
    }
}

/// Literal for a key or an assigned value; no wildcard translation.
pub fn literal(dialect: Dialect, attr: Option<&ColumnAttribute>, raw: &str) -> String {
    match attr {
        Some(a) => encode_value(dialect, a, raw, false),
        None if is_number(raw) => raw.to_string(),
        None => dialect.quote_literal(raw, None),
    }
}

/// Split request parameters into those naming a column of the target (or of a
/// related path table) and the rest.
pub fn bind_params(
    params: &BTreeMap<String, String>,
    attributes: &[ColumnAttribute],
    related: &[RelatedTable],
) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let known = |name: &str| {
        attributes.iter().any(|a| a.column_name == name)
            || related
                .iter()
                .flat_map(|r| r.attributes.iter())
                .any(|a| a.column_name == name)
    };
    params
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .partition(|(k, _)| known(k))
}

/// WHERE predicates and ORDER BY items for every bound parameter naming one of `attributes`.
pub fn filters(
    dialect: Dialect,
    attributes: &[ColumnAttribute],
    bound: &BTreeMap<String, String>,
) -> Result<(Vec<String>, Vec<String>), CoreError> {
    let mut predicates = Vec::new();
    let mut order_by = Vec::new();
    for attr in attributes {
        let Some(raw) = bound.get(attr.column_name.as_str()) else {
            continue;
        };
        let f = parse_value(dialect, attr, raw)?;
        predicates.extend(f.predicate);
        order_by.extend(f.order_by);
    }
    Ok((predicates, order_by))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Ident;

    fn numeric(column: &str) -> ColumnAttribute {
        let mut a = ColumnAttribute::new(Ident::verified("t"), Ident::verified(column), 1);
        a.is_numeric = true;
        a.is_string = false;
        a
    }

    fn text(column: &str, charset: Option<&str>) -> ColumnAttribute {
        let mut a = ColumnAttribute::new(Ident::verified("t"), Ident::verified(column), 1);
        a.character_set_name = charset.map(str::to_string);
        a
    }

    fn predicate(attr: &ColumnAttribute, raw: &str) -> Option<String> {
        parse_value(Dialect::Sqlite, attr, raw).unwrap().predicate
    }

    #[test]
    fn test_range_and_set() {
        let col = numeric("col");
        assert_eq!(predicate(&col, "r:5,10").as_deref(), Some("(col>=5) AND (col<=10)"));
        assert_eq!(predicate(&col, "r:5").as_deref(), Some("(col>=5)"));
        assert_eq!(predicate(&col, "r:,10").as_deref(), Some("(col<=10)"));
        assert_eq!(predicate(&col, "r:"), None);
        assert!(parse_value(Dialect::Sqlite, &col, "r:1,2,3").is_err());
        assert_eq!(
            predicate(&col, "s:1,2,3").as_deref(),
            Some("((col=1) OR (col=2) OR (col=3))")
        );
    }

    #[test]
    fn test_order_only() {
        let col = numeric("col");
        let f = parse_value(Dialect::Sqlite, &col, "a:").unwrap();
        assert_eq!(f.predicate, None);
        assert_eq!(f.order_by.as_deref(), Some("col ASC"));

        let f = parse_value(Dialect::MySql, &col, "D:").unwrap();
        assert_eq!(f.order_by.as_deref(), Some("CAST(col AS UNSIGNED) DESC, col DESC"));
    }

    #[test]
    fn test_order_with_value() {
        let f = parse_value(Dialect::Sqlite, &numeric("n"), "d:4").unwrap();
        assert_eq!(f.predicate.as_deref(), Some("(n=4)"));
        assert_eq!(f.order_by.as_deref(), Some("n DESC"));
    }

    #[test]
    fn test_text_comparisons() {
        let title = text("title", Some("UTF-8"));
        assert_eq!(predicate(&title, "Dune*").as_deref(), Some("(title LIKE 'Dune%')"));
        assert_eq!(predicate(&title, "null").as_deref(), Some("title IS NULL"));
        assert_eq!(predicate(&title, "*"), None);
        assert_eq!(predicate(&title, "10:30").as_deref(), Some("(title LIKE '10:30')"));

        let code = text("code", None);
        assert_eq!(predicate(&code, "O'Neil").as_deref(), Some("(code='O''Neil')"));
    }

    #[test]
    fn test_numeric_column_quotes_non_numbers() {
        let n = numeric("n");
        assert_eq!(encode_value(Dialect::Postgres, &n, "12.5", false), "12.5");
        assert_eq!(encode_value(Dialect::Postgres, &n, "12a", false), "'12a'");
        assert_eq!(encode_value(Dialect::Postgres, &n, "NuLL", false), "NULL");
    }

    #[test]
    fn test_mysql_charset_introducer() {
        let name = text("name", Some("utf8mb4"));
        assert_eq!(encode_value(Dialect::MySql, &name, "x", false), "_utf8mb4'x'");
    }

    #[test]
    fn test_bind_params_partition() {
        let attrs = vec![numeric("id"), text("title", None)];
        let params: BTreeMap<String, String> = [
            ("title".to_string(), "x".to_string()),
            ("shop_id".to_string(), "3".to_string()),
        ]
        .into();
        let (bound, other) = bind_params(&params, &attrs, &[]);
        assert_eq!(bound.len(), 1);
        assert!(bound.contains_key("title"));
        assert!(other.contains_key("shop_id"));
    }
}
