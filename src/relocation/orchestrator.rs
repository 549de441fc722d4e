// ABOUTME: Orchestrates one table relocation phase by phase
// ABOUTME: Tries a native rename first, otherwise rebuilds the table at the destination

use super::context::{Phase, RelocationContext};
use super::precheck::check_databases_exist;
use super::request::{Mode, RelocationRequest, Scope};
use super::RelocationReport;
use crate::catalog::{self, CatalogConfig};
use crate::client::{introspect, DatabaseClient};
use crate::error::RelocationError;
use crate::export::StructureExporter;
use crate::identifier::quote_identifier;
use crate::sql::{self, retarget, retarget_text, Keyword, ObjectKind};

/// Moves and copies tables.
///
/// Statements run one at a time on the borrowed client. Nothing is rolled
/// back when a statement fails: earlier phases stay applied and the error
/// reports which ones completed.
pub struct Relocator<'a> {
    client: &'a mut dyn DatabaseClient,
    exporter: &'a dyn StructureExporter,
    catalog: &'a CatalogConfig,
}

impl<'a> Relocator<'a> {
    pub fn new(
        client: &'a mut dyn DatabaseClient,
        exporter: &'a dyn StructureExporter,
        catalog: &'a CatalogConfig,
    ) -> Self {
        Self {
            client,
            exporter,
            catalog,
        }
    }

    /// Move or copy one table.
    ///
    /// Phases run in this order, each skipped when it has nothing to do:
    /// 1. Native rename (moves of structure and data only; success ends here)
    /// 2. Source and target database existence check
    /// 3. Structure build: optional drop of the destination, then CREATE
    /// 4. Foreign keys (moves, or copies requesting them)
    /// 5. Secondary indexes
    /// 6. AUTO_INCREMENT counter
    /// 7. Row copy with `INSERT ... SELECT` over non-generated columns
    /// 8. Moves drop the source and rename its catalog entries; copies
    ///    duplicate them
    ///
    /// # Errors
    ///
    /// Returns [`RelocationError::InvalidRequest`] when the request fails
    /// validation, and [`RelocationError::Statement`] when the server rejects
    /// a statement. A missing database is not an error: the report comes back
    /// with `success == false` and nothing executed.
    pub async fn relocate(
        &mut self,
        request: &RelocationRequest,
    ) -> Result<RelocationReport, RelocationError> {
        request.validate()?;
        let mut ctx = RelocationContext::new(request);

        if request.is_move && request.scope == Scope::StructureAndData {
            if let Some(message) = self.try_native_rename(&mut ctx).await? {
                return Ok(ctx.finish(true, message));
            }
        }

        ctx.begin(Phase::PreconditionCheck);
        let missing = check_databases_exist(
            &mut *self.client,
            &request.source.database,
            &request.target.database,
        )
        .await
        .map_err(|e| ctx.fail(e))?;
        if let Some(message) = missing {
            tracing::warn!("⚠ {}", message);
            return Ok(ctx.finish(false, message));
        }
        ctx.complete(Phase::PreconditionCheck);

        if request.scope.creates_structure() {
            self.build_structure(&mut ctx).await?;
            self.apply_constraints(&mut ctx).await?;
            self.apply_indexes(&mut ctx).await?;
            self.apply_auto_increment(&mut ctx).await?;
        }

        if request.scope.copies_rows() {
            self.copy_rows(&mut ctx).await?;
        }

        if request.is_move {
            self.drop_source(&mut ctx).await?;
            let message = format!(
                "Table {} has been moved to {}.",
                request.source, request.target
            );
            tracing::info!("✓ {}", message);
            return Ok(ctx.finish(true, message));
        }

        if request.scope == Scope::DataOnly {
            tracing::debug!("Data-only copy, catalog entries not duplicated");
        } else if ctx.relations_maintained {
            tracing::debug!("Destination was dropped first, catalog entries left as they are");
        } else {
            self.copy_metadata(&mut ctx).await?;
        }

        let message = format!(
            "Table {} has been copied to {}.",
            request.source, request.target
        );
        tracing::info!("✓ {}", message);
        Ok(ctx.finish(true, message))
    }

    /// `Some(message)` when the server renamed the table itself
    async fn try_native_rename(
        &mut self,
        ctx: &mut RelocationContext<'_>,
    ) -> Result<Option<String>, RelocationError> {
        let request = ctx.request;
        ctx.begin(Phase::FastRename);

        let sql = format!(
            "RENAME TABLE {} TO {}",
            request.source.qualified(),
            request.target.qualified()
        );
        if let Err(e) = self.client.execute(&sql).await {
            tracing::debug!("Native rename unavailable, rebuilding instead: {}", e);
            return Ok(None);
        }
        ctx.log.push(sql);

        catalog::rename_table_entry(
            &mut *self.client,
            self.catalog,
            &request.source,
            &request.target,
        )
        .await
        .map_err(|e| ctx.fail(e))?;
        ctx.complete(Phase::FastRename);

        let message = format!(
            "Table {} has been renamed to {}.",
            quote_identifier(&request.source.table),
            quote_identifier(&request.target.table)
        );
        tracing::info!("✓ {}", message);
        Ok(Some(message))
    }

    async fn build_structure(&mut self, ctx: &mut RelocationContext<'_>) -> Result<(), RelocationError> {
        let request = ctx.request;
        ctx.begin(Phase::StructureBuild);
        tracing::info!("Building structure of {}...", request.target);

        self.client
            .select_database(&request.target.database)
            .await
            .map_err(|e| ctx.fail(e))?;

        let source_kind = introspect::object_kind(&mut *self.client, &request.source)
            .await
            .map_err(|e| ctx.fail(e))?;
        let is_view = source_kind == Some(ObjectKind::View);

        let sql_mode = introspect::session_sql_mode(&mut *self.client)
            .await
            .map_err(|e| ctx.fail(e))?;
        ctx.dialect = sql::Dialect::from_sql_mode(&sql_mode);

        let mut exported = self
            .exporter
            .export(
                &mut *self.client,
                &request.source.database,
                &request.source.table,
                is_view,
                ctx.dialect,
            )
            .await
            .map_err(|e| ctx.fail(e))?;
        if !request.include_auto_increment {
            exported.auto_increment.clear();
        }
        let definition = std::mem::take(&mut exported.definition);
        ctx.pending = exported;

        if request.drop_if_exists {
            let kind = introspect::object_kind(&mut *self.client, &request.target)
                .await
                .map_err(|e| ctx.fail(e))?
                .unwrap_or(ObjectKind::Table);
            let drop = sql::drop_statement(kind, ctx.destination.clone(), true);
            self.run(ctx, drop.to_string()).await?;
            ctx.relations_maintained = true;
        }

        let create = if is_view {
            // MySQL view clauses (ALGORITHM, DEFINER, SQL SECURITY) are kept as exported
            retarget_text(&definition, Keyword::VIEW, &ctx.destination, ctx.dialect)
                .map_err(|e| ctx.fail(e.into()))?
        } else {
            let create = sql::parse(&definition, ctx.dialect)
                .map_err(|e| ctx.fail(e.into()))?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    ctx.fail(anyhow::anyhow!(
                        "Export of {} produced no statement",
                        request.source
                    ))
                })?;
            retarget(create, &ctx.destination).to_string()
        };
        self.run(ctx, create).await?;

        tracing::info!("✓ Created {}", request.target);
        ctx.complete(Phase::StructureBuild);
        Ok(())
    }

    async fn apply_constraints(&mut self, ctx: &mut RelocationContext<'_>) -> Result<(), RelocationError> {
        let request = ctx.request;
        if !request.applies_constraints() || ctx.pending.constraints.is_empty() {
            tracing::debug!("No foreign keys to apply");
            return Ok(());
        }
        ctx.begin(Phase::ConstraintApply);

        let pending = std::mem::take(&mut ctx.pending.constraints);
        for statement in self.retargeted(ctx, &pending)? {
            if request.mode == Mode::SingleTable {
                self.run(ctx, statement).await?;
            } else {
                tracing::debug!("Deferring foreign keys of {} until the batch completes", request.target);
                ctx.log.push(statement.clone());
                ctx.deferred_constraints.push(statement);
            }
        }

        tracing::info!("✓ Foreign keys handled for {}", request.target);
        ctx.complete(Phase::ConstraintApply);
        Ok(())
    }

    async fn apply_indexes(&mut self, ctx: &mut RelocationContext<'_>) -> Result<(), RelocationError> {
        if ctx.pending.indexes.is_empty() {
            tracing::debug!("No secondary indexes to apply");
            return Ok(());
        }
        ctx.begin(Phase::IndexApply);

        let pending = std::mem::take(&mut ctx.pending.indexes);
        for statement in self.retargeted(ctx, &pending)? {
            self.run(ctx, statement).await?;
        }

        tracing::info!("✓ Indexes created on {}", ctx.request.target);
        ctx.complete(Phase::IndexApply);
        Ok(())
    }

    async fn apply_auto_increment(
        &mut self,
        ctx: &mut RelocationContext<'_>,
    ) -> Result<(), RelocationError> {
        if ctx.pending.auto_increment.is_empty() {
            return Ok(());
        }
        ctx.begin(Phase::AutoIncrementApply);

        let pending = std::mem::take(&mut ctx.pending.auto_increment);
        let keyword = sql::leading_keyword(&pending, ctx.dialect).map_err(|e| ctx.fail(e.into()))?;
        if keyword != Some(Keyword::ALTER) {
            tracing::debug!("Auto-increment export is not an ALTER, skipped");
            return Ok(());
        }

        let statement = retarget_text(&pending, Keyword::TABLE, &ctx.destination, ctx.dialect)
            .map_err(|e| ctx.fail(e.into()))?;
        self.run(ctx, statement).await?;
        ctx.complete(Phase::AutoIncrementApply);
        Ok(())
    }

    async fn copy_rows(&mut self, ctx: &mut RelocationContext<'_>) -> Result<(), RelocationError> {
        let request = ctx.request;
        ctx.begin(Phase::DataCopy);
        let target_kind = introspect::object_kind(&mut *self.client, &request.target)
            .await
            .map_err(|e| ctx.fail(e))?;
        if target_kind == Some(ObjectKind::View) {
            tracing::debug!("{} is a view, no rows to copy", request.target);
            return Ok(());
        }
        tracing::info!("Copying rows from {} to {}...", request.source, request.target);

        self.run(ctx, "SET SQL_MODE='NO_AUTO_VALUE_ON_ZERO'".to_string())
            .await?;

        let columns = introspect::non_generated_columns(&mut *self.client, &request.source)
            .await
            .map_err(|e| ctx.fail(e))?;
        if columns.is_empty() {
            tracing::warn!("⚠ {} has no writable columns, no rows copied", request.source);
        } else {
            let column_list = columns
                .iter()
                .map(|column| quote_identifier(column))
                .collect::<Vec<_>>()
                .join(", ");
            let insert = format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                request.target, column_list, column_list, request.source
            );
            self.run(ctx, insert).await?;
            tracing::info!("✓ Rows copied to {}", request.target);
        }

        ctx.complete(Phase::DataCopy);
        Ok(())
    }

    async fn drop_source(&mut self, ctx: &mut RelocationContext<'_>) -> Result<(), RelocationError> {
        let request = ctx.request;
        ctx.begin(Phase::SourceCleanup);

        self.client
            .select_database(&request.source.database)
            .await
            .map_err(|e| ctx.fail(e))?;

        let kind = introspect::object_kind(&mut *self.client, &request.source)
            .await
            .map_err(|e| ctx.fail(e))?
            .unwrap_or(ObjectKind::Table);
        let drop = sql::drop_statement(kind, sql::object_name(&request.source), false);
        self.run(ctx, drop.to_string()).await?;

        catalog::rename_table_entry(
            &mut *self.client,
            self.catalog,
            &request.source,
            &request.target,
        )
        .await
        .map_err(|e| ctx.fail(e))?;

        tracing::info!("✓ Dropped {}", request.source);
        ctx.complete(Phase::SourceCleanup);
        Ok(())
    }

    async fn copy_metadata(&mut self, ctx: &mut RelocationContext<'_>) -> Result<(), RelocationError> {
        let request = ctx.request;
        ctx.begin(Phase::CopyMetadata);

        catalog::duplicate_table_entries(
            &mut *self.client,
            self.catalog,
            &request.source,
            &request.target,
        )
        .await
        .map_err(|e| ctx.fail(e))?;

        ctx.complete(Phase::CopyMetadata);
        Ok(())
    }

    /// Parse pending export text and point every statement at the destination
    fn retargeted(
        &self,
        ctx: &RelocationContext<'_>,
        pending: &str,
    ) -> Result<Vec<String>, RelocationError> {
        let statements = sql::parse(pending, ctx.dialect).map_err(|e| ctx.fail(e.into()))?;
        Ok(statements
            .into_iter()
            .map(|statement| retarget(statement, &ctx.destination).to_string())
            .collect())
    }

    /// Execute one statement and log it once the server accepted it
    async fn run(&mut self, ctx: &mut RelocationContext<'_>, sql: String) -> Result<(), RelocationError> {
        ctx.prepare(&sql);
        self.client.execute(&sql).await.map_err(|e| ctx.fail(e))?;
        ctx.log.push(sql);
        Ok(())
    }
}
