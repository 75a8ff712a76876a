//! Builds the statement for a resolved request.
//!
//! SELECT statements come from an ordered table of shapes; the first shape
//! whose preconditions hold produces the statement. Identifiers come only
//! from [`Ident`] values and every literal goes through the dialect escape.

use super::params::{filters, literal};
use crate::catalog::{ColumnAttribute, Ident};
use crate::dialect::Dialect;
use crate::error::CoreError;
use crate::resolve::{Method, RelationKind, RequestContext, ResolvedQuery, UriPath};
use std::collections::BTreeMap;

/// A statement ready to run, with its row-count companion when paginated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub count_sql: Option<String>,
    pub single_entity: bool,
}

impl Statement {
    fn new(sql: String) -> Self {
        Statement {
            sql,
            count_sql: None,
            single_entity: false,
        }
    }

    fn entity(sql: String) -> Self {
        Statement {
            sql,
            count_sql: None,
            single_entity: true,
        }
    }
}

/// Inputs of statement synthesis. Building never touches the catalog.
pub struct Synthesis<'a> {
    pub dialect: Dialect,
    pub method: Method,
    pub query: &'a ResolvedQuery,
    pub uri: &'a UriPath,
    pub body: Option<&'a str>,
    pub page_size: u64,
}

type Shape = for<'s> fn(&Synthesis<'s>) -> Result<Option<Statement>, CoreError>;

/// SELECT shapes in priority order.
const SELECT_SHAPES: &[(&str, Shape)] = &[
    ("table", select_table),
    ("table_key", select_table_key),
    ("table_params", select_table_params),
    ("table_key_params", select_table_key_params),
    ("table_column", select_table_column),
    ("table_column_params", select_table_column_params),
    ("table_key_column", select_table_key_column),
    ("table_key_column_params", select_table_key_column_params),
    ("one_to_one_key", select_one_to_one_key),
    ("one_to_many_key", select_one_to_many_key),
    ("many_to_many_key", select_many_to_many_key),
    ("one_to_one_key_params", select_one_to_one_key_params),
    ("one_to_many_key_params", select_one_to_many_key_params),
    ("many_to_many_key_params", select_many_to_many_key_params),
];

impl<'a> Synthesis<'a> {
    pub fn new(ctx: &'a RequestContext, query: &'a ResolvedQuery, dialect: Dialect) -> Self {
        Synthesis {
            dialect,
            method: ctx.method,
            query,
            uri: &ctx.uri,
            body: ctx.body.as_deref(),
            page_size: ctx.page_size,
        }
    }

    pub fn build(&self) -> Result<Statement, CoreError> {
        match self.method {
            Method::Get => {
                for (name, shape) in SELECT_SHAPES {
                    if let Some(stmt) = shape(self)? {
                        tracing::debug!(shape = name, sql = %stmt.sql, "select shape matched");
                        return Ok(stmt);
                    }
                }
                Err(CoreError::validation(format!(
                    "No query matches the request on {}",
                    self.query.target_table
                )))
            }
            Method::Post => self.insert().map(Statement::new),
            Method::Put => self.update(true).map(Statement::new),
            Method::Patch => self.update(false).map(Statement::new),
            Method::Delete => self.delete().map(Statement::new),
        }
    }

    fn table(&self) -> &Ident {
        &self.query.target_table
    }

    fn tables(&self) -> &[String] {
        &self.query.path_tables
    }

    fn is_single(&self) -> bool {
        self.query.relation == RelationKind::Single
    }

    fn has_keys(&self) -> bool {
        self.uri.has_keys()
    }

    fn has_params(&self) -> bool {
        !self.query.bound_params.is_empty()
    }

    fn literal_for(&self, column: &str, raw: &str) -> String {
        literal(self.dialect, self.query.attribute(column), raw)
    }

    fn primary_key(&self) -> Result<&Ident, CoreError> {
        self.query
            .primary_key_attrs
            .first()
            .ok_or_else(|| CoreError::validation(format!("Table {} has no primary key", self.table())))
    }

    fn single_primary_key(&self) -> Result<&Ident, CoreError> {
        match self.query.primary_key_attrs.as_slice() {
            [pk] => Ok(pk),
            [] => Err(CoreError::validation(format!(
                "Table {} has no primary key",
                self.table()
            ))),
            _ => Err(CoreError::validation(format!(
                "Table {} has a multi-column primary key",
                self.table()
            ))),
        }
    }

    /// Key addressing the target row itself.
    fn target_key(&self) -> Option<&'a str> {
        let last = self.tables().len().saturating_sub(1);
        match self.query.relation {
            RelationKind::Single => self.uri.key_at(0),
            RelationKind::OneToMany => self.uri.key_at(last),
            RelationKind::OneToOne => self
                .uri
                .key_at(last)
                .or_else(|| self.uri.key_at(last.saturating_sub(1))),
            RelationKind::ManyToMany => None,
        }
    }

    fn single_key_condition(&self) -> Result<Option<String>, CoreError> {
        let Some(key) = self.uri.key_at(0) else {
            return Ok(None);
        };
        let pk = self.primary_key()?;
        Ok(Some(format!("({}={})", pk, self.literal_for(pk.as_str(), key))))
    }

    /// Foreign keys of the target referencing a keyed path table, each bound to
    /// that key.
    fn foreign_key_values(&self) -> Vec<(&'a ColumnAttribute, &'a str)> {
        let mut out = Vec::new();
        for (i, table) in self.query.path_tables.iter().enumerate() {
            if self.query.target_table == *table {
                continue;
            }
            let Some(key) = self.uri.key_at(i) else {
                continue;
            };
            for attr in &self.query.attributes {
                if attr.referenced_table.as_ref().is_some_and(|t| *t == *table) {
                    out.push((attr, key));
                }
            }
        }
        out
    }

    fn key_conditions(&self) -> Vec<String> {
        let mut conds: Vec<String> = self
            .foreign_key_values()
            .into_iter()
            .map(|(attr, key)| {
                format!(
                    "({}={})",
                    attr.column_name,
                    literal(self.dialect, Some(attr), key)
                )
            })
            .collect();
        if self.query.relation == RelationKind::OneToMany {
            let own = self.uri.key_at(self.tables().len().saturating_sub(1));
            if let (Some(key), [pk]) = (own, self.query.primary_key_attrs.as_slice()) {
                conds.push(format!("({}={})", pk, self.literal_for(pk.as_str(), key)));
            }
        }
        conds
    }

    fn multi_key_conditions(&self) -> Result<Vec<String>, CoreError> {
        let conds = self.key_conditions();
        if conds.is_empty() {
            return Err(CoreError::validation(format!(
                "No key in the path constrains {}",
                self.table()
            )));
        }
        Ok(conds)
    }

    fn target_filters(&self) -> Result<(Vec<String>, Vec<String>), CoreError> {
        filters(self.dialect, &self.query.attributes, &self.query.bound_params)
    }

    /// Whole-table scan, paginated when a page size is set.
    fn scan(&self, base: String, order_by: Vec<String>) -> Result<Statement, CoreError> {
        if self.page_size == 0 {
            return Ok(Statement::new(format!("{}{}", base, order_clause(&order_by))));
        }
        let pk = self.query.primary_key_attrs.first().map(Ident::as_str);
        let sql = self
            .dialect
            .paginate(&base, &order_by, pk, self.page_size, self.uri.offset)?;
        Ok(Statement {
            sql,
            count_sql: Some(self.dialect.count_query(&base)),
            single_entity: false,
        })
    }

    /// Primary-key columns followed by the requested column.
    fn projection(&self, column: &Ident) -> String {
        let mut cols: Vec<&str> = self.query.primary_key_attrs.iter().map(Ident::as_str).collect();
        if !self.query.primary_key_attrs.contains(column) {
            cols.push(column.as_str());
        }
        cols.join(",")
    }

    fn insert(&self) -> Result<String, CoreError> {
        let q = self.query;
        let mut values: BTreeMap<&str, &str> = q
            .bound_params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if let [pk] = q.primary_key_attrs.as_slice() {
            let auto = q.attribute(pk.as_str()).is_some_and(|a| a.is_auto_increment);
            if let (false, Some(key)) = (auto, self.target_key()) {
                values.insert(pk.as_str(), key);
            }
        }
        for (attr, key) in self.foreign_key_values() {
            values.insert(attr.column_name.as_str(), key);
        }

        let mut columns = Vec::new();
        let mut literals = Vec::new();
        for attr in &q.attributes {
            let name = attr.column_name.as_str();
            match values.get(name) {
                Some(v) => {
                    columns.push(name);
                    literals.push(literal(self.dialect, Some(attr), v));
                }
                None if attr.is_auto_increment || attr.is_nullable => {
                    if self.dialect.supports_default_keyword() {
                        columns.push(name);
                        literals.push("DEFAULT".to_string());
                    }
                }
                None => {
                    return Err(CoreError::validation(format!("Parameter {} is mandatory", name)));
                }
            }
        }
        if columns.is_empty() {
            return Ok(format!("INSERT INTO {} DEFAULT VALUES", self.table()));
        }
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(),
            columns.join(","),
            literals.join(",")
        ))
    }

    /// PUT (`all`) replaces every non-key column; PATCH sets the bound ones, or
    /// the addressed column from the request body.
    fn update(&self, all: bool) -> Result<String, CoreError> {
        let q = self.query;
        if q.relation == RelationKind::ManyToMany {
            return Err(CoreError::validation(
                "Update through a many-to-many path is not supported",
            ));
        }
        let pk = self.single_primary_key()?;
        if q.relation == RelationKind::OneToMany && self.target_key().is_none() {
            return Err(CoreError::validation("No primary key in URI"));
        }
        let conds = match q.relation {
            RelationKind::Single => self.single_key_condition()?.into_iter().collect(),
            _ => self.key_conditions(),
        };
        if conds.is_empty() {
            return Err(CoreError::validation("No primary key in URI"));
        }
        if let Some(col) = &q.column {
            if col == pk {
                return Err(CoreError::validation(format!(
                    "Primary key {} cannot be updated",
                    col
                )));
            }
        }

        let mut values: BTreeMap<&str, &str> = q
            .bound_params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        for (attr, key) in self.foreign_key_values() {
            values.insert(attr.column_name.as_str(), key);
        }
        if let Some(col) = &q.column {
            let body = self.body.ok_or_else(|| {
                CoreError::validation(format!("No value in request body for {}", col))
            })?;
            values.insert(col.as_str(), body);
        }

        let mut pairs = Vec::new();
        for attr in q.attributes.iter().filter(|a| !a.is_primary_key) {
            let name = attr.column_name.as_str();
            match values.get(name) {
                Some(v) => pairs.push(format!("{}={}", name, literal(self.dialect, Some(attr), v))),
                None if all => {
                    return Err(CoreError::validation(format!("Parameter {} is mandatory", name)))
                }
                None => {}
            }
        }
        if pairs.is_empty() {
            return Err(CoreError::validation("No request parameters found"));
        }
        Ok(format!(
            "UPDATE {} SET {}{}",
            self.table(),
            pairs.join(","),
            where_clause(&conds)
        ))
    }

    fn delete(&self) -> Result<String, CoreError> {
        if !self.has_keys() {
            return Err(CoreError::validation("No primary key in URI"));
        }
        if self.tables().len() > 1 {
            let conds = self.key_conditions();
            if !conds.is_empty() {
                return Ok(format!("DELETE FROM {}{}", self.table(), where_clause(&conds)));
            }
        }
        let pk = self.single_primary_key()?;
        let key = self
            .target_key()
            .ok_or_else(|| CoreError::validation("No primary key in URI"))?;
        Ok(format!(
            "DELETE FROM {} WHERE ({}={})",
            self.table(),
            pk,
            self.literal_for(pk.as_str(), key)
        ))
    }
}

fn where_clause(conds: &[String]) -> String {
    if conds.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conds.join(" AND "))
    }
}

fn order_clause(order_by: &[String]) -> String {
    if order_by.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", order_by.join(","))
    }
}

fn select_table(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    if !s.is_single() || s.has_keys() || s.query.column.is_some() || s.has_params() {
        return Ok(None);
    }
    s.scan(format!("SELECT * FROM {}", s.table()), Vec::new()).map(Some)
}

fn select_table_key(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    if !s.is_single() || !s.has_keys() || s.query.column.is_some() || s.has_params() {
        return Ok(None);
    }
    let cond = s.single_key_condition()?.into_iter().collect::<Vec<_>>();
    Ok(Some(Statement::entity(format!(
        "SELECT * FROM {}{}",
        s.table(),
        where_clause(&cond)
    ))))
}

fn select_table_params(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    if !s.is_single() || s.has_keys() || s.query.column.is_some() || !s.has_params() {
        return Ok(None);
    }
    let (conds, order_by) = s.target_filters()?;
    s.scan(
        format!("SELECT * FROM {}{}", s.table(), where_clause(&conds)),
        order_by,
    )
    .map(Some)
}

fn select_table_key_params(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    if !s.is_single() || !s.has_keys() || s.query.column.is_some() || !s.has_params() {
        return Ok(None);
    }
    let (mut conds, order_by) = s.target_filters()?;
    conds.extend(s.single_key_condition()?);
    Ok(Some(Statement::entity(format!(
        "SELECT * FROM {}{}{}",
        s.table(),
        where_clause(&conds),
        order_clause(&order_by)
    ))))
}

fn select_table_column(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    let Some(column) = &s.query.column else {
        return Ok(None);
    };
    if !s.is_single() || s.has_keys() || s.has_params() {
        return Ok(None);
    }
    Ok(Some(Statement::new(format!(
        "SELECT {} FROM {}",
        s.projection(column),
        s.table()
    ))))
}

fn select_table_column_params(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    let Some(column) = &s.query.column else {
        return Ok(None);
    };
    if !s.is_single() || s.has_keys() || !s.has_params() {
        return Ok(None);
    }
    let (conds, order_by) = s.target_filters()?;
    Ok(Some(Statement::new(format!(
        "SELECT {} FROM {}{}{}",
        s.projection(column),
        s.table(),
        where_clause(&conds),
        order_clause(&order_by)
    ))))
}

fn select_table_key_column(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    let Some(column) = &s.query.column else {
        return Ok(None);
    };
    if !s.is_single() || !s.has_keys() || s.has_params() {
        return Ok(None);
    }
    let cond = s.single_key_condition()?.into_iter().collect::<Vec<_>>();
    Ok(Some(Statement::entity(format!(
        "SELECT {} FROM {}{}",
        column,
        s.table(),
        where_clause(&cond)
    ))))
}

fn select_table_key_column_params(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    if !s.is_single() || !s.has_keys() || s.query.column.is_none() || !s.has_params() {
        return Ok(None);
    }
    Err(CoreError::validation(
        "Filtering a single column of one row is not supported",
    ))
}

fn select_related_key(
    s: &Synthesis<'_>,
    relation: RelationKind,
) -> Result<Option<Statement>, CoreError> {
    if s.query.relation != relation || !s.has_keys() || s.has_params() {
        return Ok(None);
    }
    let conds = s.multi_key_conditions()?;
    let sql = format!("SELECT * FROM {}{}", s.table(), where_clause(&conds));
    let single_entity = match relation {
        RelationKind::OneToOne => true,
        RelationKind::OneToMany => s.target_key().is_some(),
        _ => false,
    };
    Ok(Some(Statement {
        sql,
        count_sql: None,
        single_entity,
    }))
}

fn select_one_to_one_key(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    select_related_key(s, RelationKind::OneToOne)
}

fn select_one_to_many_key(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    select_related_key(s, RelationKind::OneToMany)
}

fn select_many_to_many_key(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    select_related_key(s, RelationKind::ManyToMany)
}

fn select_related_key_params(
    s: &Synthesis<'_>,
    relation: RelationKind,
) -> Result<Option<Statement>, CoreError> {
    if s.query.relation != relation || !s.has_keys() || !s.has_params() {
        return Ok(None);
    }
    let (mut conds, order_by) = s.target_filters()?;
    conds.extend(s.multi_key_conditions()?);
    Ok(Some(Statement::new(format!(
        "SELECT * FROM {}{}{}",
        s.table(),
        where_clause(&conds),
        order_clause(&order_by)
    ))))
}

fn select_one_to_one_key_params(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    select_related_key_params(s, RelationKind::OneToOne)
}

fn select_one_to_many_key_params(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    select_related_key_params(s, RelationKind::OneToMany)
}

/// Rows of the last path table linked through the junction. Parameters naming
/// that table's columns filter the outer query; those naming junction-only
/// columns filter the junction rows.
fn select_many_to_many_key_params(s: &Synthesis<'_>) -> Result<Option<Statement>, CoreError> {
    if s.query.relation != RelationKind::ManyToMany || !s.has_keys() || !s.has_params() {
        return Ok(None);
    }
    let Some(last) = s.tables().last() else {
        return Ok(None);
    };
    let related = s
        .query
        .related
        .iter()
        .find(|r| r.table == *last)
        .ok_or_else(|| CoreError::schema(format!("Table {} not found", last)))?;
    let link = s
        .query
        .attributes
        .iter()
        .find(|a| a.referenced_table.as_ref() == Some(&related.table))
        .ok_or_else(|| {
            CoreError::relation(format!("{} does not reference {}", s.table(), related.table))
        })?;
    let target_column = link
        .referenced_column
        .as_ref()
        .or_else(|| related.primary_key.first())
        .ok_or_else(|| {
            CoreError::validation(format!("Table {} has no primary key", related.table))
        })?;

    let junction_only: Vec<ColumnAttribute> = s
        .query
        .attributes
        .iter()
        .filter(|a| !related.attributes.iter().any(|r| r.column_name == a.column_name))
        .cloned()
        .collect();
    let (link_predicates, link_order) = filters(s.dialect, &junction_only, &s.query.bound_params)?;
    if !link_order.is_empty() {
        return Err(CoreError::validation(format!(
            "Cannot order {} rows by a column of {}",
            related.table,
            s.table()
        )));
    }
    let mut link_conds = s.multi_key_conditions()?;
    link_conds.extend(link_predicates);

    let mut conds = vec![format!(
        "{} IN (SELECT {} FROM {}{})",
        target_column,
        link.column_name,
        s.table(),
        where_clause(&link_conds)
    )];
    let (predicates, order_by) = filters(s.dialect, &related.attributes, &s.query.bound_params)?;
    conds.extend(predicates);
    Ok(Some(Statement::new(format!(
        "SELECT * FROM {}{}{}",
        related.table,
        where_clause(&conds),
        order_clause(&order_by)
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnAttribute, ForeignKey};
    use crate::resolve::{RelatedTable, Resolution, TableSchema};

    fn column(table: &str, name: &str, pos: i64) -> ColumnAttribute {
        ColumnAttribute::new(Ident::verified(table), Ident::verified(name), pos)
    }

    fn numeric(mut a: ColumnAttribute) -> ColumnAttribute {
        a.is_numeric = true;
        a.is_string = false;
        a
    }

    fn required(mut a: ColumnAttribute) -> ColumnAttribute {
        a.is_nullable = false;
        a
    }

    fn books() -> Vec<ColumnAttribute> {
        let mut id = required(numeric(column("books", "id", 1)));
        id.is_primary_key = true;
        id.is_auto_increment = true;
        let mut author = numeric(column("books", "author_id", 2));
        author.is_foreign_key = true;
        author.referenced_table = Some(Ident::verified("authors"));
        author.referenced_column = Some(Ident::verified("id"));
        let title = required(column("books", "title", 3));
        let year = numeric(column("books", "year", 4));
        vec![id, author, title, year]
    }

    fn query(
        table: &str,
        relation: RelationKind,
        tables: &[&str],
        attributes: Vec<ColumnAttribute>,
        pk: &[&str],
    ) -> ResolvedQuery {
        let resolution = Resolution {
            target: Ident::verified(table),
            relation,
            column: None,
            tables: tables.iter().map(|t| t.to_string()).collect(),
        };
        let schema = TableSchema {
            attributes,
            primary_key: pk.iter().map(|c| Ident::verified(*c)).collect(),
            unsigned: Vec::new(),
            foreign_keys: Vec::new(),
        };
        ResolvedQuery::new(resolution, schema)
    }

    fn books_query() -> ResolvedQuery {
        query("books", RelationKind::Single, &["books"], books(), &["id"])
    }

    fn build(method: Method, path: &str, q: &ResolvedQuery) -> Result<Statement, CoreError> {
        let ctx = RequestContext::new(method, path);
        Synthesis::new(&ctx, q, Dialect::Sqlite).build()
    }

    fn sql(method: Method, path: &str, q: &ResolvedQuery) -> String {
        build(method, path, q).unwrap().sql
    }

    fn bind(mut q: ResolvedQuery, params: &[(&str, &str)]) -> ResolvedQuery {
        q.bound_params = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        q
    }

    #[test]
    fn test_select_whole_table() {
        let q = books_query();
        let stmt = build(Method::Get, "/q2/v1/books", &q).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM books");
        assert_eq!(stmt.count_sql, None);
        assert!(!stmt.single_entity);
    }

    #[test]
    fn test_select_paginated() {
        let q = books_query();
        let ctx = RequestContext::new(Method::Get, "/q2/v1/books/next/10").with_page_size(10);
        let stmt = Synthesis::new(&ctx, &q, Dialect::Sqlite).build().unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM books LIMIT 10 OFFSET 10");
        assert_eq!(
            stmt.count_sql.as_deref(),
            Some("SELECT count(*) AS c FROM (SELECT * FROM books) AS t")
        );
    }

    #[test]
    fn test_select_by_key() {
        let q = books_query();
        let stmt = build(Method::Get, "/q2/v1/books/7", &q).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM books WHERE (id=7)");
        assert!(stmt.single_entity);
    }

    #[test]
    fn test_select_with_filters() {
        let q = bind(books_query(), &[("year", "r:1990,2000"), ("title", "a:")]);
        assert_eq!(
            sql(Method::Get, "/q2/v1/books", &q),
            "SELECT * FROM books WHERE (year>=1990) AND (year<=2000) ORDER BY title ASC"
        );
        assert_eq!(
            sql(Method::Get, "/q2/v1/books/3", &q),
            "SELECT * FROM books WHERE (year>=1990) AND (year<=2000) AND (id=3) ORDER BY title ASC"
        );
    }

    #[test]
    fn test_select_column() {
        let mut q = books_query();
        q.column = Some(Ident::verified("title"));
        assert_eq!(sql(Method::Get, "/q2/v1/books/*/title", &q), "SELECT id,title FROM books");
        assert_eq!(
            sql(Method::Get, "/q2/v1/books/4/title", &q),
            "SELECT title FROM books WHERE (id=4)"
        );
        let q = bind(q, &[("year", "5")]);
        assert!(matches!(
            build(Method::Get, "/q2/v1/books/4/title", &q),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_select_one_to_many() {
        let q = query("books", RelationKind::OneToMany, &["authors", "books"], books(), &["id"]);
        let stmt = build(Method::Get, "/q2/v1/authors/1/books", &q).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM books WHERE (author_id=1)");
        assert!(!stmt.single_entity);

        let stmt = build(Method::Get, "/q2/v1/authors/1/books/9", &q).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM books WHERE (author_id=1) AND (id=9)");
        assert!(stmt.single_entity);
    }

    fn junction() -> ResolvedQuery {
        let mut a = required(numeric(column("author_book", "author_id", 1)));
        a.is_primary_key = true;
        a.referenced_table = Some(Ident::verified("authors"));
        a.referenced_column = Some(Ident::verified("id"));
        let mut b = required(numeric(column("author_book", "book_id", 2)));
        b.is_primary_key = true;
        b.referenced_table = Some(Ident::verified("books"));
        b.referenced_column = Some(Ident::verified("id"));
        let mut q = query(
            "author_book",
            RelationKind::ManyToMany,
            &["authors", "books"],
            vec![a, b],
            &["author_id", "book_id"],
        );
        q.foreign_key_attrs = vec![ForeignKey {
            column_name: Ident::verified("author_id"),
            referenced_schema: None,
            referenced_table: Ident::verified("authors"),
            referenced_column: Some(Ident::verified("id")),
        }];
        q.related = vec![RelatedTable {
            table: Ident::verified("books"),
            attributes: books(),
            primary_key: vec![Ident::verified("id")],
        }];
        q
    }

    #[test]
    fn test_many_to_many() {
        let q = junction();
        assert_eq!(
            sql(Method::Get, "/q2/v1/authors/1/books/2", &q),
            "SELECT * FROM author_book WHERE (author_id=1) AND (book_id=2)"
        );
        let q = bind(q, &[("year", "2001")]);
        assert_eq!(
            sql(Method::Get, "/q2/v1/authors/1/books", &q),
            "SELECT * FROM books WHERE id IN (SELECT book_id FROM author_book WHERE (author_id=1)) AND (year=2001)"
        );
    }

    #[test]
    fn test_many_to_many_junction_filters() {
        let q = bind(junction(), &[("book_id", "s:2,3"), ("year", "2001")]);
        assert_eq!(
            sql(Method::Get, "/q2/v1/authors/1/books", &q),
            "SELECT * FROM books WHERE id IN (SELECT book_id FROM author_book WHERE (author_id=1) \
             AND ((book_id=2) OR (book_id=3))) AND (year=2001)"
        );
        let q = bind(junction(), &[("book_id", "a:")]);
        assert!(matches!(
            build(Method::Get, "/q2/v1/authors/1/books", &q),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_insert() {
        let q = bind(books_query(), &[("title", "Dune")]);
        assert_eq!(
            sql(Method::Post, "/q2/v1/books", &q),
            "INSERT INTO books (title) VALUES ('Dune')"
        );
        let ctx = RequestContext::new(Method::Post, "/q2/v1/books");
        let stmt = Synthesis::new(&ctx, &q, Dialect::MySql).build().unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO books (id,author_id,title,year) VALUES (DEFAULT,DEFAULT,'Dune',DEFAULT)"
        );
    }

    #[test]
    fn test_insert_takes_path_keys() {
        let q = bind(
            query("books", RelationKind::OneToMany, &["authors", "books"], books(), &["id"]),
            &[("title", "Emma"), ("author_id", "99")],
        );
        assert_eq!(
            sql(Method::Post, "/q2/v1/authors/3/books", &q),
            "INSERT INTO books (author_id,title) VALUES (3,'Emma')"
        );
    }

    #[test]
    fn test_insert_missing_mandatory() {
        let q = bind(books_query(), &[("year", "1999")]);
        match build(Method::Post, "/q2/v1/books", &q) {
            Err(CoreError::Validation(msg)) => assert_eq!(msg, "Parameter title is mandatory"),
            other => panic!("unexpected {:?}", other),
        }

        let mut attrs = books();
        attrs[2].column_default = Some("'untitled'".into());
        let q = bind(
            query("books", RelationKind::Single, &["books"], attrs, &["id"]),
            &[("year", "1999")],
        );
        assert!(matches!(
            build(Method::Post, "/q2/v1/books", &q),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_insert_default_values() {
        let q = query("ticks", RelationKind::Single, &["ticks"], Vec::new(), &[]);
        assert_eq!(sql(Method::Post, "/q2/v1/ticks", &q), "INSERT INTO ticks DEFAULT VALUES");
    }

    #[test]
    fn test_put_requires_every_column() {
        let q = bind(books_query(), &[("title", "A"), ("year", "1")]);
        assert!(matches!(
            build(Method::Put, "/q2/v1/books/5", &q),
            Err(CoreError::Validation(_))
        ));
        let q = bind(books_query(), &[("title", "A"), ("year", "1"), ("author_id", "2")]);
        assert_eq!(
            sql(Method::Put, "/q2/v1/books/5", &q),
            "UPDATE books SET author_id=2,title='A',year=1 WHERE (id=5)"
        );
    }

    #[test]
    fn test_patch() {
        let q = bind(books_query(), &[("year", "1965")]);
        assert_eq!(
            sql(Method::Patch, "/q2/v1/books/5", &q),
            "UPDATE books SET year=1965 WHERE (id=5)"
        );
        assert!(matches!(
            build(Method::Patch, "/q2/v1/books", &q),
            Err(CoreError::Validation(_))
        ));

        let mut q = books_query();
        q.column = Some(Ident::verified("title"));
        let ctx = RequestContext::new(Method::Patch, "/q2/v1/books/5/title").with_body("Dune");
        let stmt = Synthesis::new(&ctx, &q, Dialect::Sqlite).build().unwrap();
        assert_eq!(stmt.sql, "UPDATE books SET title='Dune' WHERE (id=5)");
    }

    #[test]
    fn test_update_rejects_composite_key() {
        let q = bind(junction(), &[("author_id", "1")]);
        assert!(build(Method::Patch, "/q2/v1/authors/1/books/2", &q).is_err());
    }

    #[test]
    fn test_delete() {
        let q = books_query();
        assert_eq!(sql(Method::Delete, "/q2/v1/books/5", &q), "DELETE FROM books WHERE (id=5)");
        assert!(build(Method::Delete, "/q2/v1/books", &q).is_err());
        assert_eq!(
            sql(Method::Delete, "/q2/v1/authors/1/books/2", &junction()),
            "DELETE FROM author_book WHERE (author_id=1) AND (book_id=2)"
        );
    }
}
