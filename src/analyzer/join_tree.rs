//! Shared helpers for walking the `CrossJoin`/`InnerJoin` trees that
//! `pushdown` and `assign_indexes` both operate over: collecting the
//! table-producing leaves of a join tree, and rebuilding the same tree
//! shape with substituted leaves (optionally re-indexing join predicates
//! against a new combined schema).

use std::sync::Arc;

use crate::catalog::TableDef;
use crate::expr::visitors::transform_expr_up;
use crate::expr::Expr;
use crate::plan::{CrossJoin, InnerJoin, PlanError, PlanNode};
use crate::schema::Schema;

use super::errors::AnalyzerError;

/// Collects the leaves of a `CrossJoin`/`InnerJoin` tree, in left-to-right
/// order. A node that isn't itself a join is a leaf of one (a bare `Table`,
/// an aliased table, a subquery, an already pushed-down scan, ...).
pub fn collect_leaves(node: &Arc<PlanNode>, leaves: &mut Vec<Arc<PlanNode>>) {
    match node.as_ref() {
        PlanNode::CrossJoin(j) => {
            collect_leaves(&j.left, leaves);
            collect_leaves(&j.right, leaves);
        }
        PlanNode::InnerJoin(j) => {
            collect_leaves(&j.left, leaves);
            collect_leaves(&j.right, leaves);
        }
        _ => leaves.push(node.clone()),
    }
}

/// Every `InnerJoin` predicate's column references, anywhere in the tree,
/// merged into `out`.
pub fn collect_join_predicate_refs(node: &Arc<PlanNode>, out: &mut Vec<(String, String)>) {
    match node.as_ref() {
        PlanNode::CrossJoin(j) => {
            collect_join_predicate_refs(&j.left, out);
            collect_join_predicate_refs(&j.right, out);
        }
        PlanNode::InnerJoin(j) => {
            out.extend(collect_refs(&j.predicate));
            collect_join_predicate_refs(&j.left, out);
            collect_join_predicate_refs(&j.right, out);
        }
        _ => {}
    }
}

/// `(table, name)` pairs for every `GetFieldWithTable` reachable in `expr`.
pub fn collect_refs(expr: &Expr) -> Vec<(String, String)> {
    use crate::expr::visitors::{walk_expr, ExpressionVisitor};

    #[derive(Default)]
    struct Collector {
        refs: Vec<(String, String)>,
    }
    impl ExpressionVisitor for Collector {
        fn visit_get_field_with_table(&mut self, _index: usize, table: &str, name: &str) {
            self.refs.push((table.to_string(), name.to_string()));
        }
    }

    let mut collector = Collector::default();
    walk_expr(expr, &mut collector);
    collector.refs
}

/// The table tag every column of `leaf`'s output schema shares (a genuine
/// table-producing leaf is single-provenance by construction).
pub fn leaf_tag(leaf: &Arc<PlanNode>) -> Option<String> {
    leaf.schema().get(0).map(|col| col.table.clone())
}

/// The `TableDef` a leaf wraps, if it's a (possibly pushed-down) table scan
/// rather than some other relation (a subquery, say).
pub fn table_def_of(leaf: &Arc<PlanNode>) -> Option<Arc<TableDef>> {
    match leaf.as_ref() {
        PlanNode::Table(t) => Some(t.clone()),
        PlanNode::ProjectionPushdownTable(t) => Some(t.table.clone()),
        PlanNode::ProjectionAndFilterPushdownTable(t) => Some(t.table.clone()),
        PlanNode::IndexableTable(t) => Some(t.inner.table.clone()),
        PlanNode::TableAlias(a) => table_def_of(&a.input),
        _ => None,
    }
}

/// Rebuilds the same `CrossJoin`/`InnerJoin` shape as `node`, substituting
/// leaves from `new_leaves` (consumed in the same left-to-right order
/// [`collect_leaves`] produced them) and re-indexing every `InnerJoin`
/// predicate against `new_schema` (positions looked up by `(table, name)`,
/// not translated arithmetically — correct regardless of how leaves
/// reordered or narrowed their columns).
pub fn rebuild_with_leaves(
    node: &Arc<PlanNode>,
    new_leaves: &mut std::vec::IntoIter<Arc<PlanNode>>,
    new_schema: &Schema,
) -> Result<Arc<PlanNode>, AnalyzerError> {
    match node.as_ref() {
        PlanNode::CrossJoin(j) => {
            let left = rebuild_with_leaves(&j.left, new_leaves, new_schema)?;
            let right = rebuild_with_leaves(&j.right, new_leaves, new_schema)?;
            Ok(Arc::new(PlanNode::CrossJoin(CrossJoin { left, right })))
        }
        PlanNode::InnerJoin(j) => {
            let left = rebuild_with_leaves(&j.left, new_leaves, new_schema)?;
            let right = rebuild_with_leaves(&j.right, new_leaves, new_schema)?;
            let predicate = reindex_expr(j.predicate.clone(), new_schema)?;
            Ok(Arc::new(PlanNode::InnerJoin(InnerJoin {
                left,
                right,
                predicate,
            })))
        }
        _ => Ok(new_leaves
            .next()
            .expect("rebuild_with_leaves: leaf count must match collect_leaves")),
    }
}

/// Rewrites every `GetField`/`GetFieldWithTable` in `expr` to its position in
/// `schema`, found by `(table, name)` identity rather than by translating the
/// old index — correct even when pushdown reordered or narrowed a table's
/// emitted columns. A lookup miss means the rewritten tree no longer has a
/// column matching the reference at all (a malformed plan, not a mere
/// reshuffle), so it's reported as `ErrInvalidPlan` rather than silently
/// pinned to index 0 (spec §7, §8 invariant 3).
pub fn reindex_expr(expr: Expr, schema: &Schema) -> Result<Expr, AnalyzerError> {
    let mut error = None;
    let result = transform_expr_up(expr, &mut |e| {
        if error.is_some() {
            return e;
        }
        match e {
            Expr::GetField {
                index: old_index,
                name,
                data_type,
                nullable,
            } => match schema.find("", &name) {
                Some((index, col)) => Expr::GetField {
                    index,
                    data_type: col.data_type,
                    name: col.name.clone(),
                    nullable: col.nullable,
                },
                None => {
                    error = Some(
                        PlanError::GetFieldIndexOutOfRange {
                            index: old_index,
                            len: schema.len(),
                        }
                        .into(),
                    );
                    Expr::GetField {
                        index: old_index,
                        data_type,
                        name,
                        nullable,
                    }
                }
            },
            Expr::GetFieldWithTable {
                index: old_index,
                table,
                name,
                data_type,
                nullable,
            } => match schema.find(&table, &name) {
                Some((index, col)) => Expr::GetFieldWithTable {
                    index,
                    data_type: col.data_type,
                    name: col.name.clone(),
                    table: col.table.clone(),
                    nullable: col.nullable,
                },
                None => {
                    error = Some(
                        PlanError::GetFieldIndexOutOfRange {
                            index: old_index,
                            len: schema.len(),
                        }
                        .into(),
                    );
                    Expr::GetFieldWithTable {
                        index: old_index,
                        data_type,
                        name,
                        table,
                        nullable,
                    }
                }
            },
            other => other,
        }
    });

    match error {
        Some(e) => Err(e),
        None => Ok(result),
    }
}
