//! Loads and enriches the catalog attributes of the resolved table.

use crate::catalog::{ColumnAttribute, DriverHandle, ForeignKey, Ident};
use crate::error::CoreError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Catalog facts about one table, attributes already enriched.
#[derive(Clone, Debug, Default)]
pub struct TableSchema {
    pub attributes: Vec<ColumnAttribute>,
    pub primary_key: Vec<Ident>,
    pub unsigned: Vec<Ident>,
    pub foreign_keys: Vec<ForeignKey>,
}

/// A path table other than the target, needed to build many-to-many statements.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RelatedTable {
    pub table: Ident,
    pub attributes: Vec<ColumnAttribute>,
    pub primary_key: Vec<Ident>,
}

impl TableSchema {
    pub async fn load(db: &mut DriverHandle<'_>, table: &Ident) -> Result<Self, CoreError> {
        let name = table.as_str();
        let attributes = db.adapter.column_attributes(db.conn, name).await?;
        if attributes.is_empty() {
            return Err(CoreError::schema(format!("No columns found for table {}", name)));
        }
        let primary_key = db.adapter.primary_key_attributes(db.conn, name).await?;
        let unsigned = db.adapter.unsigned_attributes(db.conn, name).await?;
        let foreign_keys = db.adapter.foreign_key_attributes(db.conn, name).await?;

        let mut referenced_pks: BTreeMap<Ident, Vec<Ident>> = BTreeMap::new();
        for fk in &foreign_keys {
            if referenced_pks.contains_key(&fk.referenced_table) {
                continue;
            }
            let pk = db
                .adapter
                .primary_key_attributes(db.conn, fk.referenced_table.as_str())
                .await?;
            referenced_pks.insert(fk.referenced_table.clone(), pk);
        }

        let attributes = enrich(attributes, &primary_key, &unsigned, &foreign_keys, &referenced_pks);
        Ok(TableSchema {
            attributes,
            primary_key,
            unsigned,
            foreign_keys,
        })
    }
}

/// Attributes and primary keys of every path table except `target`.
pub async fn load_related(
    db: &mut DriverHandle<'_>,
    tables: &[String],
    target: &Ident,
) -> Result<Vec<RelatedTable>, CoreError> {
    let mut related = Vec::new();
    for name in tables.iter().filter(|t| *target != **t) {
        let Some(table) = db.adapter.table_exists(db.conn, name).await? else {
            return Err(CoreError::schema(format!("Table {} not found", name)));
        };
        let attributes = db.adapter.column_attributes(db.conn, name).await?;
        let primary_key = db.adapter.primary_key_attributes(db.conn, name).await?;
        related.push(RelatedTable {
            table,
            attributes,
            primary_key,
        });
    }
    Ok(related)
}

/// Set key flags and foreign-key references on catalog attributes.
pub fn enrich(
    mut attributes: Vec<ColumnAttribute>,
    primary_key: &[Ident],
    unsigned: &[Ident],
    foreign_keys: &[ForeignKey],
    referenced_pks: &BTreeMap<Ident, Vec<Ident>>,
) -> Vec<ColumnAttribute> {
    for attr in &mut attributes {
        if primary_key.contains(&attr.column_name) {
            attr.is_primary_key = true;
        }
        if unsigned.contains(&attr.column_name) {
            attr.is_unsigned = true;
        }
        let Some(fk) = foreign_keys.iter().find(|k| k.column_name == attr.column_name) else {
            continue;
        };
        attr.is_foreign_key = true;
        attr.referenced_schema = fk.referenced_schema.clone();
        attr.referenced_table = Some(fk.referenced_table.clone());
        attr.referenced_column = fk.referenced_column.clone();
        if let Some(pk) = referenced_pks.get(&fk.referenced_table).filter(|pk| !pk.is_empty()) {
            attr.is_referenced_pk_multi = pk.len() > 1;
            attr.referenced_pk = Some(
                pk.iter().map(Ident::as_str).collect::<Vec<_>>().join(","),
            );
        }
    }
    attributes
}

/// Fill `column_options` with a discovery URI for each foreign-key column.
///
/// A composite referenced key also carries the unconsumed request parameters
/// naming its other members, e.g. `/orders/order_id?shop_id=3`.
pub fn column_options(attributes: &mut [ColumnAttribute], other_params: &BTreeMap<String, String>) {
    for attr in attributes.iter_mut() {
        let (Some(table), Some(column)) = (&attr.referenced_table, &attr.referenced_column) else {
            continue;
        };
        let mut uri = format!("/{}/{}", table, column);
        if attr.is_referenced_pk_multi {
            let members: Vec<&str> = attr
                .referenced_pk
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .collect();
            let pairs: Vec<String> = other_params
                .iter()
                .filter(|(k, _)| members.contains(&k.as_str()) && *column != **k)
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            if !pairs.is_empty() {
                uri.push('?');
                uri.push_str(&pairs.join("&"));
            }
        }
        attr.column_options = Some(uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(table: &str, column: &str, pos: i64) -> ColumnAttribute {
        ColumnAttribute::new(Ident::verified(table), Ident::verified(column), pos)
    }

    fn fk(column: &str, table: &str, referenced: &str) -> ForeignKey {
        ForeignKey {
            column_name: Ident::verified(column),
            referenced_schema: None,
            referenced_table: Ident::verified(table),
            referenced_column: Some(Ident::verified(referenced)),
        }
    }

    #[test]
    fn test_enrich_sets_flags() {
        let attrs = vec![attr("books", "id", 1), attr("books", "author_id", 2), attr("books", "title", 3)];
        let pk = vec![Ident::verified("id")];
        let fks = vec![fk("author_id", "authors", "id")];
        let refs: BTreeMap<Ident, Vec<Ident>> =
            [(Ident::verified("authors"), vec![Ident::verified("id")])].into();
        let out = enrich(attrs, &pk, &[], &fks, &refs);

        assert!(out[0].is_primary_key);
        assert!(!out[0].is_foreign_key);
        assert!(out[1].is_foreign_key);
        assert_eq!(out[1].referenced_table.as_ref().map(Ident::as_str), Some("authors"));
        assert!(!out[1].is_referenced_pk_multi);
        assert_eq!(out[1].referenced_pk.as_deref(), Some("id"));
        assert_eq!(out[2].referenced_pk, None);
        assert!(!out[2].is_primary_key && !out[2].is_foreign_key);
    }

    #[test]
    fn test_column_options_single_key() {
        let refs: BTreeMap<Ident, Vec<Ident>> =
            [(Ident::verified("authors"), vec![Ident::verified("id")])].into();
        let mut out = enrich(
            vec![attr("books", "author_id", 1), attr("books", "title", 2)],
            &[],
            &[],
            &[fk("author_id", "authors", "id")],
            &refs,
        );
        column_options(&mut out, &BTreeMap::new());
        assert_eq!(out[0].column_options.as_deref(), Some("/authors/id"));
        assert_eq!(out[1].column_options, None);
    }

    #[test]
    fn test_column_options_composite_key() {
        let refs: BTreeMap<Ident, Vec<Ident>> = [(
            Ident::verified("orders"),
            vec![Ident::verified("shop_id"), Ident::verified("order_id")],
        )]
        .into();
        let mut out = enrich(
            vec![attr("lines", "order_id", 1)],
            &[],
            &[],
            &[fk("order_id", "orders", "order_id")],
            &refs,
        );
        assert_eq!(out[0].referenced_pk.as_deref(), Some("shop_id,order_id"));

        let others: BTreeMap<String, String> = [
            ("shop_id".to_string(), "3".to_string()),
            ("order_id".to_string(), "9".to_string()),
            ("color".to_string(), "red".to_string()),
        ]
        .into();
        column_options(&mut out, &others);
        assert_eq!(out[0].column_options.as_deref(), Some("/orders/order_id?shop_id=3"));
    }
}
