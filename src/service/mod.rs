//! QueryService: the single resolve operation, from request context to executed statement.

use crate::catalog::DriverHandle;
use crate::error::CoreError;
use crate::pagination::{self, Page};
use crate::resolve::attributes::load_related;
use crate::resolve::relation::resolve_relation;
use crate::resolve::{column_options, Method, RelationKind, RequestContext, ResolvedQuery, TableSchema};
use crate::sql::{bind_params, Statement, Synthesis};

pub struct QueryService;

impl QueryService {
    /// Resolve the request against the live catalog, build its statement and run it.
    ///
    /// The first failure ends resolution; nothing after it runs.
    pub async fn resolve(
        ctx: &RequestContext,
        db: &mut DriverHandle<'_>,
    ) -> Result<ResolvedQuery, CoreError> {
        let result = Self::run(ctx, db).await;
        match &result {
            Ok(q) => tracing::info!(
                method = %ctx.method,
                table = %q.target_table,
                relation = ?q.relation,
                rows = q.results.len(),
                affected = q.affected_rows,
                "request resolved"
            ),
            Err(e) => tracing::warn!(
                method = %ctx.method,
                path = %ctx.path,
                kind = e.code(),
                error = %e,
                "request failed"
            ),
        }
        result
    }

    async fn run(
        ctx: &RequestContext,
        db: &mut DriverHandle<'_>,
    ) -> Result<ResolvedQuery, CoreError> {
        let resolution = resolve_relation(&ctx.uri.tables, db).await?;
        let schema = TableSchema::load(db, &resolution.target).await?;
        let mut query = ResolvedQuery::new(resolution, schema);
        if query.relation == RelationKind::ManyToMany {
            query.related = load_related(db, &query.path_tables, &query.target_table).await?;
        }

        let params = ctx.effective_params(query.column.as_ref());
        // Many-to-many filters reach the junction and the last path table only.
        let last_related = &query.related[query.related.len().saturating_sub(1)..];
        let (bound, other) = bind_params(&params, &query.attributes, last_related);
        query.bound_params = bound;
        query.other_params = other;
        column_options(&mut query.attributes, &query.other_params);

        let stmt = Synthesis::new(ctx, &query, db.dialect()).build()?;
        query.sql = stmt.sql.clone();
        query.single_entity = stmt.single_entity;
        Self::execute(ctx, db, &mut query, &stmt).await?;
        Ok(query)
    }

    async fn execute(
        ctx: &RequestContext,
        db: &mut DriverHandle<'_>,
        query: &mut ResolvedQuery,
        stmt: &Statement,
    ) -> Result<(), CoreError> {
        tracing::debug!(sql = %stmt.sql, "executing statement");
        if ctx.method == Method::Get {
            query.results = db.conn.select(&stmt.sql).await.map_err(CoreError::execution)?;
            let page = Page {
                size: ctx.page_size,
                offset: ctx.uri.offset,
            };
            let (total, next) = pagination::track(
                db,
                stmt,
                page,
                query.results.len(),
                &ctx.path,
                ctx.query.as_deref(),
            )
            .await?;
            query.total_rows = total;
            query.next = next;
            return Ok(());
        }
        query.affected_rows = db.conn.execute(&stmt.sql).await.map_err(CoreError::execution)?;
        if ctx.method == Method::Post {
            query.last_insert_id = db.adapter.last_insert_id(db.conn).await?;
        }
        Ok(())
    }

    /// Version string reported by the backend.
    pub async fn server_version(db: &mut DriverHandle<'_>) -> Result<Option<String>, CoreError> {
        db.adapter.server_version(db.conn).await
    }
}
