//! Request resolution: path parsing, relation discovery, attribute enrichment.

pub mod attributes;
pub mod relation;
pub mod uri;

pub use attributes::{column_options, enrich, RelatedTable, TableSchema};
pub use relation::{RelationKind, Resolution};
pub use uri::UriPath;

use crate::catalog::{ColumnAttribute, ForeignKey, Ident};
use crate::db::Row;
use crate::error::CoreError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(CoreError::validation(format!("Method {} not supported", other))),
        }
    }
}

/// Everything the core needs from one request. Built once by the transport.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub method: Method,
    /// Request path without the query string.
    pub path: String,
    pub query: Option<String>,
    pub uri: UriPath,
    /// Query-string parameters.
    pub params: BTreeMap<String, String>,
    /// Parameters decoded from a form or JSON object body.
    pub form: BTreeMap<String, String>,
    /// Raw body, the new value for a PATCH on a single column.
    pub body: Option<String>,
    /// Rows per page; 0 disables pagination.
    pub page_size: u64,
}

impl RequestContext {
    /// Context for `path_and_query`, e.g. `/q2/v1/books?title=x`.
    pub fn new(method: Method, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string()).filter(|q| !q.is_empty())),
            None => (path_and_query, None),
        };
        RequestContext {
            method,
            path: path.to_string(),
            query,
            uri: UriPath::parse(path),
            params: BTreeMap::new(),
            form: BTreeMap::new(),
            body: None,
            page_size: 0,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn with_form(mut self, form: BTreeMap<String, String>) -> Self {
        self.form = form;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Query parameters when present, otherwise body parameters. A body sent to
    /// a single column is that column's value, never parameters.
    pub fn effective_params(&self, column: Option<&Ident>) -> BTreeMap<String, String> {
        if !self.params.is_empty() {
            self.params.clone()
        } else if column.is_none() {
            self.form.clone()
        } else {
            BTreeMap::new()
        }
    }
}

/// The accumulated outcome of one `Resolve` call.
#[derive(Clone, Debug, Serialize)]
pub struct ResolvedQuery {
    pub target_table: Ident,
    pub relation: RelationKind,
    /// Single-column projection or update target.
    pub column: Option<Ident>,
    /// Path tables left after a column segment is taken out.
    pub path_tables: Vec<String>,
    pub attributes: Vec<ColumnAttribute>,
    pub primary_key_attrs: Vec<Ident>,
    pub unsigned_attrs: Vec<Ident>,
    pub foreign_key_attrs: Vec<ForeignKey>,
    /// Other path tables, loaded for many-to-many targets.
    pub related: Vec<RelatedTable>,
    pub bound_params: BTreeMap<String, String>,
    pub other_params: BTreeMap<String, String>,
    pub sql: String,
    pub results: Vec<Row>,
    pub affected_rows: u64,
    pub last_insert_id: Option<String>,
    pub next: Option<String>,
    pub total_rows: Option<u64>,
    /// A GET addressing one entity, answered 404 when nothing matches.
    pub single_entity: bool,
}

impl ResolvedQuery {
    pub(crate) fn new(resolution: Resolution, schema: TableSchema) -> Self {
        ResolvedQuery {
            target_table: resolution.target,
            relation: resolution.relation,
            column: resolution.column,
            path_tables: resolution.tables,
            attributes: schema.attributes,
            primary_key_attrs: schema.primary_key,
            unsigned_attrs: schema.unsigned,
            foreign_key_attrs: schema.foreign_keys,
            related: Vec::new(),
            bound_params: BTreeMap::new(),
            other_params: BTreeMap::new(),
            sql: String::new(),
            results: Vec::new(),
            affected_rows: 0,
            last_insert_id: None,
            next: None,
            total_rows: None,
            single_entity: false,
        }
    }

    pub fn attribute(&self, column: &str) -> Option<&ColumnAttribute> {
        self.attributes.iter().find(|a| a.column_name == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!("patch".parse::<Method>().unwrap(), Method::Patch);
        assert!("OPTIONS".parse::<Method>().is_err());
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_context_splits_query() {
        let ctx = RequestContext::new(Method::Get, "/q2/v1/books/next/10?title=a");
        assert_eq!(ctx.path, "/q2/v1/books/next/10");
        assert_eq!(ctx.query.as_deref(), Some("title=a"));
        assert_eq!(ctx.uri.tables, vec!["books"]);
        assert_eq!(ctx.uri.offset, 10);
    }

    #[test]
    fn test_effective_params_prefers_query() {
        let form: BTreeMap<String, String> = [("a".to_string(), "1".to_string())].into();
        let ctx = RequestContext::new(Method::Post, "/q2/v1/books").with_form(form);
        assert_eq!(ctx.effective_params(None).get("a").map(String::as_str), Some("1"));
        let col = Ident::verified("title");
        assert!(ctx.effective_params(Some(&col)).is_empty());

        let ctx = ctx.with_param("b", "2");
        let params = ctx.effective_params(None);
        assert!(params.contains_key("b"));
        assert!(!params.contains_key("a"));
    }
}
