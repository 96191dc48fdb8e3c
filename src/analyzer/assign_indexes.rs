//! Binds index lookups into indexable table scans (spec §4.15,
//! "assign_indexes"). For each resolved `Filter` directly over a join tree,
//! [`crate::analyzer::index_combination::get_indexes`] computes a per-table
//! candidate lookup from the predicate; every table the map covers gets its
//! scan rewrapped as an `IndexableTable` carrying that lookup. The outer
//! `Filter`'s predicate is left exactly as it was — the index is an
//! optimization the table scan may use to narrow its own output, not a
//! replacement for the filter a downstream executor still evaluates.

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{Catalog, IndexLookup, ReleaseGuard, TableCapability, TableDef};
use crate::expr::Expr;
use crate::plan::{
    Filter, IndexableTable, PlanNode, ProjectionAndFilterPushdownTable, TableAlias,
};
use crate::schema::Schema;
use crate::transform::transform_up;

use super::errors::AnalyzerError;
use super::index_combination::get_indexes;
use super::join_tree::{collect_leaves, leaf_tag, rebuild_with_leaves, table_def_of};
use super::rule::{Rule, RuleContext};
use super::transformed::Transformed;

pub struct AssignIndexes;

impl Rule for AssignIndexes {
    fn name(&self) -> &'static str {
        "assign_indexes"
    }

    fn apply(
        &self,
        rc: &RuleContext,
        plan: Arc<PlanNode>,
    ) -> Result<Transformed<Arc<PlanNode>>, AnalyzerError> {
        if !plan.resolved() {
            return Ok(Transformed::No(plan));
        }

        let catalog = rc.catalog.clone();
        let database = rc.current_database.to_string();

        let mut error = None;
        let result = transform_up(&plan, &mut |node| {
            if error.is_some() {
                return node;
            }
            match node.as_ref() {
                PlanNode::Filter(f) => match assign_for_filter(f, &node, &catalog, &database) {
                    Ok(n) => n,
                    Err(e) => {
                        error = Some(e);
                        node
                    }
                },
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

/// Computes `getIndexes(predicate)` against the tables the filter's own join
/// tree exposes, and rewraps every covered leaf as an `IndexableTable`. A
/// filter with no indexable predicate (invariant 7, spec §8) is returned
/// unchanged.
fn assign_for_filter(
    f: &Filter,
    node: &Arc<PlanNode>,
    catalog: &Arc<dyn Catalog>,
    database: &str,
) -> Result<Arc<PlanNode>, AnalyzerError> {
    let mut leaves = Vec::new();
    collect_leaves(&f.input, &mut leaves);

    let defs: HashMap<String, Arc<TableDef>> = leaves
        .iter()
        .filter_map(|leaf| Some((leaf_tag(leaf)?, table_def_of(leaf)?)))
        .collect();
    let table_def_of_fn = |t: &str| defs.get(t).cloned();

    let lookups = get_indexes(&f.predicate, database, catalog.as_ref(), &table_def_of_fn);
    if lookups.is_empty() {
        return Ok(node.clone());
    }

    let new_leaves: Vec<Arc<PlanNode>> = leaves
        .iter()
        .map(|leaf| match leaf_tag(leaf).and_then(|t| lookups.get(&t).cloned()) {
            Some(lookup) => wrap_with_index(leaf, lookup, catalog),
            None => leaf.clone(),
        })
        .collect();

    let new_schema = new_leaves
        .iter()
        .fold(Schema::empty(), |acc, leaf| Schema::concat(&acc, &leaf.schema()));
    let mut iter = new_leaves.into_iter();
    let new_input = rebuild_with_leaves(&f.input, &mut iter, &new_schema)?;

    if *new_input == *f.input {
        return Ok(node.clone());
    }

    Ok(Arc::new(PlanNode::Filter(Filter {
        input: new_input,
        predicate: f.predicate.clone(),
    })))
}

/// Wraps `leaf` (possibly underneath a `TableAlias`) in an `IndexableTable`
/// carrying `lookup`. A leaf already wrapped is left alone: re-deriving it
/// would throw away the release guard a previous pass already attached.
fn wrap_with_index(
    leaf: &Arc<PlanNode>,
    lookup: Arc<dyn IndexLookup>,
    catalog: &Arc<dyn Catalog>,
) -> Arc<PlanNode> {
    match leaf.as_ref() {
        PlanNode::TableAlias(a) => Arc::new(PlanNode::TableAlias(TableAlias {
            alias: a.alias.clone(),
            input: wrap_inner(&a.input, lookup, catalog),
        })),
        _ => wrap_inner(leaf, lookup, catalog),
    }
}

fn wrap_inner(
    inner: &Arc<PlanNode>,
    lookup: Arc<dyn IndexLookup>,
    catalog: &Arc<dyn Catalog>,
) -> Arc<PlanNode> {
    let pf = match inner.as_ref() {
        PlanNode::IndexableTable(existing) => {
            if format!("{:?}", existing.lookup) == format!("{:?}", lookup) {
                return inner.clone();
            }
            existing.inner.clone()
        }
        PlanNode::ProjectionAndFilterPushdownTable(t) => t.clone(),
        PlanNode::ProjectionPushdownTable(t) => ProjectionAndFilterPushdownTable {
            table: t.table.clone(),
            projected_exprs: exprs_for_names(&t.table, &t.projected_columns),
            pushed_filters: Vec::new(),
        },
        PlanNode::Table(t) => {
            let capable = matches!(t.capability, TableCapability::Indexable(_));
            if !capable {
                return inner.clone();
            }
            ProjectionAndFilterPushdownTable {
                table: t.clone(),
                projected_exprs: full_projected_exprs(t),
                pushed_filters: Vec::new(),
            }
        }
        _ => return inner.clone(),
    };

    let index_ids = lookup.index_ids();
    let release = if index_ids.is_empty() {
        None
    } else {
        let catalog = catalog.clone();
        let ids = index_ids.clone();
        Some(Arc::new(ReleaseGuard::new(Box::new(move || {
            for id in &ids {
                catalog.release_index(id);
            }
        }))))
    };

    Arc::new(PlanNode::IndexableTable(IndexableTable {
        inner: pf,
        lookup,
        index_ids,
        release,
    }))
}

fn full_projected_exprs(table_def: &Arc<TableDef>) -> Vec<Expr> {
    table_def
        .schema
        .iter()
        .enumerate()
        .map(|(index, col)| Expr::GetFieldWithTable {
            index,
            data_type: col.data_type,
            name: col.name.clone(),
            table: col.table.clone(),
            nullable: col.nullable,
        })
        .collect()
}

fn exprs_for_names(table_def: &Arc<TableDef>, names: &[String]) -> Vec<Expr> {
    table_def
        .schema
        .iter()
        .enumerate()
        .filter(|(_, col)| names.contains(&col.name))
        .map(|(index, col)| Expr::GetFieldWithTable {
            index,
            data_type: col.data_type,
            name: col.name.clone(),
            table: col.table.clone(),
            nullable: col.nullable,
        })
        .collect()
}
