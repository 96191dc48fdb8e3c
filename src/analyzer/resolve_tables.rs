//! Replaces `UnresolvedTable(name)` with the catalog's `Table` definition
//! (spec §4.x, "resolve_tables").

use std::sync::Arc;

use crate::catalog::{TableCapability, TableDef};
use crate::plan::PlanNode;
use crate::schema::{ColumnSchema, DataType, Schema};
use crate::transform::transform_up;

use super::errors::AnalyzerError;
use super::rule::{Rule, RuleContext};
use super::transformed::Transformed;

/// Name of the built-in one-row, one-column table every database exposes
/// without a catalog entry, matching the conventional SQL `dual` pseudo-table.
const DUAL_TABLE_NAME: &str = "dual";
const DUAL_COLUMN_NAME: &str = "dummy";
const DUAL_COLUMN_VALUE: &str = "x";

/// Builds the `dual` table: one row, one column (`dummy`, a string holding
/// `"x"`). Spec §4.x carves this out as a special case resolved without
/// consulting the catalog.
fn dual_table(database: &str) -> Arc<TableDef> {
    Arc::new(TableDef {
        database: database.to_string(),
        name: DUAL_TABLE_NAME.to_string(),
        schema: Schema::new(vec![ColumnSchema::new(
            DUAL_COLUMN_NAME,
            DataType::Utf8,
            DUAL_TABLE_NAME,
            false,
        )]),
        capability: TableCapability::Basic,
    })
}

/// The constant row `dual` always yields, for callers (e.g. an executor,
/// out of scope here) that need the literal value rather than just the
/// schema.
pub fn dual_row_value() -> &'static str {
    DUAL_COLUMN_VALUE
}

pub struct ResolveTables;

impl Rule for ResolveTables {
    fn name(&self) -> &'static str {
        "resolve_tables"
    }

    fn apply(
        &self,
        rc: &RuleContext,
        plan: Arc<PlanNode>,
    ) -> Result<Transformed<Arc<PlanNode>>, AnalyzerError> {
        let mut error = None;
        let result = transform_up(&plan, &mut |node| {
            if error.is_some() {
                return node;
            }
            match node.as_ref() {
                PlanNode::UnresolvedTable(name) if name == DUAL_TABLE_NAME => {
                    log::debug!("resolving built-in 'dual' table");
                    Arc::new(PlanNode::Table(dual_table(rc.current_database)))
                }
                PlanNode::UnresolvedTable(name) => {
                    log::debug!("resolving table '{}'", name);
                    match rc.catalog.table(rc.current_database, name) {
                        Ok(table) => Arc::new(PlanNode::Table(table)),
                        Err(_) => {
                            error = Some(AnalyzerError::ErrTableNotFound(name.clone()));
                            node
                        }
                    }
                }
                _ => node,
            }
        });

        if let Some(e) = error {
            return Err(e);
        }
        Ok(if Arc::ptr_eq(&result, &plan) {
            Transformed::No(result)
        } else {
            Transformed::Yes(result)
        })
    }
}
