//! Picks the table a path addresses and how its tables relate.
//!
//! Candidates are tried in a fixed order: one-to-one, one-to-many,
//! many-to-many, then a single table (optionally with a column). The first
//! candidate that validates against the catalog wins.

use crate::catalog::{DriverHandle, ForeignKey, Ident};
use crate::error::CoreError;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToMany,
    Single,
}

const CANDIDATES: [RelationKind; 4] = [
    RelationKind::OneToOne,
    RelationKind::OneToMany,
    RelationKind::ManyToMany,
    RelationKind::Single,
];

#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub target: Ident,
    pub relation: RelationKind,
    pub column: Option<Ident>,
    /// Path tables, without the column segment when one was taken.
    pub tables: Vec<String>,
}

pub async fn resolve_relation(
    tables: &[String],
    db: &mut DriverHandle<'_>,
) -> Result<Resolution, CoreError> {
    if tables.is_empty() {
        return Err(CoreError::schema("No table in request path"));
    }
    for kind in CANDIDATES {
        let found = match kind {
            RelationKind::OneToOne => one_to_one(tables, db).await?,
            RelationKind::OneToMany => one_to_many(tables, db).await?,
            RelationKind::ManyToMany => many_to_many(tables, db).await?,
            RelationKind::Single => return single(tables, db).await,
        };
        if let Some(target) = found {
            tracing::debug!(target_table = %target, relation = ?kind, "relation resolved");
            return Ok(Resolution {
                target,
                relation: kind,
                column: None,
                tables: tables.to_vec(),
            });
        }
    }
    Err(CoreError::relation(format!(
        "No relation found between {}",
        tables.join(", ")
    )))
}

fn referenced_in(fk: &ForeignKey, tables: &[String]) -> usize {
    tables.iter().filter(|t| fk.referenced_table == **t).count()
}

/// The last table's primary key is exactly its foreign key set, and every
/// foreign key points at an earlier path table.
async fn one_to_one(
    tables: &[String],
    db: &mut DriverHandle<'_>,
) -> Result<Option<Ident>, CoreError> {
    let Some((last, parents)) = tables.split_last() else {
        return Ok(None);
    };
    if parents.is_empty() {
        return Ok(None);
    }
    let pk = db.adapter.primary_key_attributes(db.conn, last).await?;
    if pk.is_empty() {
        return Ok(None);
    }
    let fks = db.adapter.foreign_key_attributes(db.conn, last).await?;
    if fks.is_empty() {
        return Ok(None);
    }
    let pk_set: BTreeSet<&str> = pk.iter().map(Ident::as_str).collect();
    let fk_set: BTreeSet<&str> = fks.iter().map(|k| k.column_name.as_str()).collect();
    if pk_set != fk_set {
        return Ok(None);
    }
    if !fks.iter().all(|k| referenced_in(k, parents) > 0) {
        return Ok(None);
    }
    db.adapter.table_exists(db.conn, last).await
}

/// The last table's foreign keys account for every other path table.
async fn one_to_many(
    tables: &[String],
    db: &mut DriverHandle<'_>,
) -> Result<Option<Ident>, CoreError> {
    let Some(last) = tables.last() else {
        return Ok(None);
    };
    if tables.len() < 2 {
        return Ok(None);
    }
    let fks = db.adapter.foreign_key_attributes(db.conn, last).await?;
    let matched: usize = fks
        .iter()
        .filter(|k| k.referenced_table != *last)
        .map(|k| referenced_in(k, tables))
        .sum();
    if matched != tables.len() - 1 {
        return Ok(None);
    }
    db.adapter.table_exists(db.conn, last).await
}

/// A junction table whose foreign keys reference every path table.
async fn many_to_many(
    tables: &[String],
    db: &mut DriverHandle<'_>,
) -> Result<Option<Ident>, CoreError> {
    let Some(last) = tables.last() else {
        return Ok(None);
    };
    if tables.len() < 2 {
        return Ok(None);
    }
    let global = db.adapter.scans_junctions_globally();
    let candidates = db.adapter.tables_referencing(db.conn, last).await?;
    for candidate in candidates {
        if global && candidate.foreign_key_count.is_some_and(|n| n < 2) {
            continue;
        }
        let fks = db
            .adapter
            .foreign_key_attributes(db.conn, candidate.table_name.as_str())
            .await?;
        if global {
            if fks.len() < tables.len() {
                continue;
            }
        } else if fks.len() != tables.len() {
            continue;
        }
        let matched: usize = fks.iter().map(|k| referenced_in(k, tables)).sum();
        if matched == tables.len() {
            return Ok(Some(candidate.table_name));
        }
    }
    Ok(None)
}

/// One table, or a table and one of its columns.
async fn single(tables: &[String], db: &mut DriverHandle<'_>) -> Result<Resolution, CoreError> {
    let name = &tables[0];
    let target = db
        .adapter
        .table_exists(db.conn, name)
        .await?
        .ok_or_else(|| CoreError::schema(format!("Table {} not found", name)))?;
    let column = match tables {
        [_] => None,
        [_, column] => Some(
            db.adapter
                .column_exists(db.conn, name, column)
                .await?
                .ok_or_else(|| {
                    CoreError::schema(format!("Column {} not found in table {}", column, name))
                })?,
        ),
        _ => {
            return Err(CoreError::relation(format!(
                "No relation found between {}",
                tables.join(", ")
            )))
        }
    };
    Ok(Resolution {
        target,
        relation: RelationKind::Single,
        column,
        tables: vec![name.clone()],
    })
}
