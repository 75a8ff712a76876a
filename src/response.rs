//! Response envelope and discovery links.

use crate::catalog::ColumnAttribute;
use crate::dialect::Dialect;
use crate::resolve::{Method, ResolvedQuery};
use serde::Serialize;
use serde_json::Value;

/// Body of every resource response, success or failure.
#[derive(Serialize, Debug, Default)]
pub struct Envelope {
    pub err: bool,
    pub log: Option<String>,
    pub http_method: Option<String>,
    pub dbd_driver_name: Option<String>,
    pub db_server_vers: Option<String>,
    pub table: Option<String>,
    pub column: Option<String>,
    pub sql: Option<String>,
    pub attributes: Vec<ColumnAttribute>,
    pub results: Value,
    pub next: Option<String>,
    pub affected_rows: u64,
    pub last_insert_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
}

impl Envelope {
    pub fn failure(message: String) -> Self {
        Envelope {
            err: true,
            log: Some(message),
            ..Envelope::default()
        }
    }

    /// Envelope for an executed request. `prefix` is the mount point used to
    /// build the URI of a created row.
    pub fn success(
        query: ResolvedQuery,
        method: Method,
        dialect: Dialect,
        server_version: Option<String>,
        prefix: &str,
    ) -> Self {
        let links = discovery_links(&query.attributes, &query.results);
        let results = match (&query.last_insert_id, method) {
            (Some(id), Method::Post) if query.results.is_empty() => {
                Value::String(created_uri(prefix, query.target_table.as_str(), id))
            }
            _ => Value::Array(query.results.into_iter().map(Value::Object).collect()),
        };
        Envelope {
            err: false,
            log: None,
            http_method: Some(method.to_string()),
            dbd_driver_name: Some(dialect.driver_name().to_string()),
            db_server_vers: server_version,
            table: Some(query.target_table.to_string()),
            column: query.column.map(|c| c.to_string()),
            sql: Some(query.sql),
            attributes: query.attributes,
            results,
            next: query.next,
            affected_rows: query.affected_rows,
            last_insert_id: query.last_insert_id,
            links: (!links.is_empty()).then_some(links),
        }
    }
}

pub fn created_uri(prefix: &str, table: &str, id: &str) -> String {
    format!("{}/{}/{}", prefix.trim_end_matches('/'), table, id)
}

/// One link per distinct foreign-key value in the results, for every column
/// carrying a discovery URI.
pub fn discovery_links(attributes: &[ColumnAttribute], results: &[crate::db::Row]) -> Vec<String> {
    let mut links = Vec::new();
    for attr in attributes.iter().filter(|a| a.column_options.is_some()) {
        let Some(table) = &attr.referenced_table else {
            continue;
        };
        for row in results {
            let value = match row.get(attr.column_name.as_str()) {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            let link = format!("{}/{};rel=\"{}\"", table, value, table);
            if !links.contains(&link) {
                links.push(link);
            }
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Ident;
    use serde_json::json;

    fn author_fk() -> ColumnAttribute {
        let mut a = ColumnAttribute::new(Ident::verified("books"), Ident::verified("author_id"), 2);
        a.referenced_table = Some(Ident::verified("authors"));
        a.referenced_column = Some(Ident::verified("id"));
        a.column_options = Some("/authors/id".into());
        a
    }

    #[test]
    fn test_discovery_links() {
        let rows: Vec<crate::db::Row> = vec![
            json!({"id": 1, "author_id": 7}).as_object().unwrap().clone(),
            json!({"id": 2, "author_id": 7}).as_object().unwrap().clone(),
            json!({"id": 3, "author_id": null}).as_object().unwrap().clone(),
        ];
        let links = discovery_links(&[author_fk()], &rows);
        assert_eq!(links, vec!["authors/7;rel=\"authors\"".to_string()]);
    }

    #[test]
    fn test_failure_body() {
        let body = serde_json::to_value(Envelope::failure("schema: Table x not found".into())).unwrap();
        assert_eq!(body["err"], json!(true));
        assert_eq!(body["log"], json!("schema: Table x not found"));
        assert_eq!(body["results"], Value::Null);
        assert!(body.get("links").is_none());
    }

    #[test]
    fn test_created_uri() {
        assert_eq!(created_uri("/q2/v1/", "books", "12"), "/q2/v1/books/12");
    }
}
