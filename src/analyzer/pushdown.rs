//! Pushes column projection and (single-table) filter predicates down into
//! table scans whose backend advertises the matching capability (spec
//! §4.14, "pushdown"). A scan is rewritten into exactly one of
//! `ProjectionPushdownTable`/`ProjectionAndFilterPushdownTable` depending on
//! what its `TableCapability` supports and what the rest of the plan still
//! needs from it; a scan already wrapped into `IndexableTable` by
//! `assign_indexes` is left untouched, since re-deriving it here would throw
//! away the attached index lookup for no benefit.
//!
//! The required-columns computation looks at the *whole* plan up front
//! rather than threading a working set down through `transform_up`, so a
//! leaf two joins away from the `Project` that needs its last column still
//! gets it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::expr::combinators::{and, split_conjuncts};
use crate::expr::Expr;
use crate::plan::{
    Filter, GroupBy, PlanNode, Project, ProjectionAndFilterPushdownTable, ProjectionPushdownTable,
    Sort, TableAlias,
};
use crate::schema::Schema;
use crate::transform::transform_up;

use super::errors::AnalyzerError;
use super::join_tree::{collect_leaves, collect_refs, leaf_tag, rebuild_with_leaves, reindex_expr, table_def_of};
use super::rule::{Rule, RuleContext};
use super::transformed::Transformed;

pub struct Pushdown;

impl Rule for Pushdown {
    fn name(&self) -> &'static str {
        "pushdown"
    }

    fn apply(
        &self,
        _rc: &RuleContext,
        plan: Arc<PlanNode>,
    ) -> Result<Transformed<Arc<PlanNode>>, AnalyzerError> {
        if !plan.resolved() {
            return Ok(Transformed::No(plan));
        }

        let required = compute_required(&plan);

        let mut error = None;
        let result = transform_up(&plan, &mut |node| {
            if error.is_some() {
                return node;
            }
            let rewritten = match node.as_ref() {
                PlanNode::Filter(f) if is_pushdown_root(&f.input) => push_filter(f, &required),
                _ if is_pushdown_root(&node) => {
                    rewrite_leaves(&node, &required, &HashMap::new()).map(|(n, _)| n)
                }
                PlanNode::Project(p) => reindex_project(p, node.clone()),
                PlanNode::Filter(f) => reindex_filter(f, node.clone()),
                PlanNode::Sort(s) => reindex_sort(s, node.clone()),
                PlanNode::GroupBy(g) => reindex_group_by(g, node.clone()),
                _ => Ok(node.clone()),
            };
            match rewritten {
                Ok(n) => n,
                Err(e) => {
                    error = Some(e);
                    node
                }
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

/// Whether `node` is the root of a (possibly single-leaf) join tree that
/// `pushdown` may rewrite: a bare join, or any shape `table_def_of` can see
/// through to a catalog table.
fn is_pushdown_root(node: &Arc<PlanNode>) -> bool {
    matches!(node.as_ref(), PlanNode::CrossJoin(_) | PlanNode::InnerJoin(_)) || table_def_of(node).is_some()
}

/// Every column any node in `plan` references from a table-producing leaf,
/// keyed by that leaf's table tag. A leaf absent from this map (or present
/// with an empty set) needs nothing projected from it beyond what its own
/// shape already requires (e.g. a join predicate referencing it, already
/// folded in by [`collect_node_refs`]).
fn compute_required(plan: &Arc<PlanNode>) -> HashMap<String, HashSet<String>> {
    let mut required: HashMap<String, HashSet<String>> = HashMap::new();
    collect_required(plan, &mut required);
    required
}

fn collect_required(node: &Arc<PlanNode>, out: &mut HashMap<String, HashSet<String>>) {
    for (table, name) in collect_node_refs(node) {
        out.entry(table).or_default().insert(name);
    }
    for child in node.children() {
        collect_required(&child, out);
    }
}

/// `(table, name)` pairs directly referenced by `node`'s own attributes
/// (not its children's) — the expressions a `transform_up`-style
/// `with_children` call never reindexes on its own.
fn collect_node_refs(node: &Arc<PlanNode>) -> Vec<(String, String)> {
    match node.as_ref() {
        PlanNode::Project(p) => p.items.iter().flat_map(collect_refs).collect(),
        PlanNode::Filter(f) => collect_refs(&f.predicate),
        PlanNode::Sort(s) => s.fields.iter().flat_map(|field| collect_refs(&field.expr)).collect(),
        PlanNode::GroupBy(g) => g
            .group_exprs
            .iter()
            .chain(g.agg_exprs.iter())
            .flat_map(collect_refs)
            .collect(),
        PlanNode::InnerJoin(j) => collect_refs(&j.predicate),
        _ => Vec::new(),
    }
}

/// Rewrites a `Filter` directly over a join tree: single-table conjuncts are
/// offered to the table they reference; accepted ones are pushed into the
/// scan and dropped from the residual predicate, which is reindexed and
/// reattached (or elided entirely if nothing remains).
fn push_filter(f: &Filter, required: &HashMap<String, HashSet<String>>) -> Result<Arc<PlanNode>, AnalyzerError> {
    let conjuncts = split_conjuncts(&f.predicate);
    let mut by_table: HashMap<String, Vec<Expr>> = HashMap::new();
    let mut residual = Vec::new();

    for conjunct in conjuncts {
        match single_table_ref(&conjunct) {
            Some(table) => by_table.entry(table).or_default().push(conjunct),
            None => residual.push(conjunct),
        }
    }

    let (new_input, accepted) = rewrite_leaves(&f.input, required, &by_table)?;

    for (table, offered) in by_table {
        let taken = accepted.get(&table).cloned().unwrap_or_default();
        for conjunct in offered {
            if !taken.contains(&conjunct) {
                residual.push(conjunct);
            }
        }
    }

    let new_schema = new_input.schema();
    let residual: Vec<Expr> = residual
        .into_iter()
        .map(|e| reindex_expr(e, &new_schema))
        .collect::<Result<_, _>>()?;

    Ok(match and(residual) {
        Some(predicate) => Arc::new(PlanNode::Filter(Filter {
            input: new_input,
            predicate,
        })),
        None => new_input,
    })
}

/// The single table tag every `GetFieldWithTable` in `expr` shares, or
/// `None` if `expr` spans more than one table (such a conjunct can never be
/// pushed into a single scan).
fn single_table_ref(expr: &Expr) -> Option<String> {
    let refs = collect_refs(expr);
    let mut tables = refs.into_iter().map(|(table, _)| table);
    let first = tables.next()?;
    if tables.all(|t| t == first) {
        Some(first)
    } else {
        None
    }
}

/// Rewrites every leaf of the join tree rooted at `root`, then rebuilds the
/// same tree shape over the rewritten leaves. Returns the rebuilt tree and,
/// per table tag, the filter conjuncts (of `candidates`) that were actually
/// accepted by that leaf's backend.
fn rewrite_leaves(
    root: &Arc<PlanNode>,
    required: &HashMap<String, HashSet<String>>,
    candidates: &HashMap<String, Vec<Expr>>,
) -> Result<(Arc<PlanNode>, HashMap<String, Vec<Expr>>), AnalyzerError> {
    let mut leaves = Vec::new();
    collect_leaves(root, &mut leaves);

    let mut accepted = HashMap::new();
    let mut new_leaves = Vec::with_capacity(leaves.len());
    for leaf in &leaves {
        let tag = leaf_tag(leaf);
        let wanted = tag
            .as_deref()
            .and_then(|t| required.get(t))
            .cloned()
            .unwrap_or_default();
        let offered = tag
            .as_deref()
            .and_then(|t| candidates.get(t))
            .cloned()
            .unwrap_or_default();

        let (new_leaf, taken) = rewrite_leaf(leaf, &wanted, &offered);
        if let Some(t) = tag {
            if !taken.is_empty() {
                accepted.insert(t, taken);
            }
        }
        new_leaves.push(new_leaf);
    }

    let new_schema = new_leaves
        .iter()
        .fold(Schema::empty(), |acc, leaf| Schema::concat(&acc, &leaf.schema()));
    let mut iter = new_leaves.into_iter();
    let rebuilt = rebuild_with_leaves(root, &mut iter, &new_schema)?;
    Ok((rebuilt, accepted))
}

/// Rewrites a single leaf, peeling off (and later restoring) a `TableAlias`
/// wrapper so the alias tag downstream column references depend on survives
/// the rewrite.
fn rewrite_leaf(leaf: &Arc<PlanNode>, wanted: &HashSet<String>, offered: &[Expr]) -> (Arc<PlanNode>, Vec<Expr>) {
    let (alias, inner) = peel_alias(leaf);
    let (new_inner, taken) = rewrite_inner(&inner, wanted, offered);

    let rewrapped = match alias {
        Some(alias) => Arc::new(PlanNode::TableAlias(TableAlias {
            alias,
            input: new_inner,
        })),
        None => new_inner,
    };
    (rewrapped, taken)
}

fn peel_alias(leaf: &Arc<PlanNode>) -> (Option<String>, Arc<PlanNode>) {
    match leaf.as_ref() {
        PlanNode::TableAlias(a) => (Some(a.alias.clone()), a.input.clone()),
        _ => (None, leaf.clone()),
    }
}

fn rewrite_inner(inner: &Arc<PlanNode>, wanted: &HashSet<String>, offered: &[Expr]) -> (Arc<PlanNode>, Vec<Expr>) {
    // An already-indexed scan is terminal from pushdown's perspective: it
    // carries a `lookup`/`release` guard `assign_indexes` attached, which a
    // fresh rewrite here would silently drop.
    if matches!(inner.as_ref(), PlanNode::IndexableTable(_)) {
        return (inner.clone(), Vec::new());
    }

    let Some(table_def) = table_def_of(inner) else {
        return (inner.clone(), Vec::new());
    };

    match &table_def.capability {
        crate::catalog::TableCapability::Basic => (inner.clone(), Vec::new()),

        crate::catalog::TableCapability::ProjectionPushdown(_) => {
            if wanted.is_empty() {
                return (inner.clone(), Vec::new());
            }
            let columns = projected_column_names(&table_def, wanted);
            (
                Arc::new(PlanNode::ProjectionPushdownTable(ProjectionPushdownTable {
                    table: table_def,
                    projected_columns: columns,
                })),
                Vec::new(),
            )
        }

        crate::catalog::TableCapability::ProjectionAndFilterPushdown(backend) => {
            rewrite_pushdown_filter_inner(inner, table_def, backend.handled_filters(offered), wanted)
        }

        crate::catalog::TableCapability::Indexable(backend) => {
            rewrite_pushdown_filter_inner(inner, table_def, backend.handled_filters(offered), wanted)
        }
    }
}

/// Shared rewrite for the two capabilities that accept filters: merges
/// newly accepted conjuncts with any this leaf already pushed down on an
/// earlier fixed-point iteration, rather than overwriting — `offered` only
/// contains conjuncts still present in the residual predicate, so a
/// conjunct already pushed down (and thus no longer offered) must not be
/// forgotten.
fn rewrite_pushdown_filter_inner(
    inner: &Arc<PlanNode>,
    table_def: Arc<crate::catalog::TableDef>,
    newly_accepted: Vec<Expr>,
    wanted: &HashSet<String>,
) -> (Arc<PlanNode>, Vec<Expr>) {
    let mut pushed_filters = match inner.as_ref() {
        PlanNode::ProjectionAndFilterPushdownTable(existing) => existing.pushed_filters.clone(),
        _ => Vec::new(),
    };
    for conjunct in &newly_accepted {
        if !pushed_filters.contains(conjunct) {
            pushed_filters.push(conjunct.clone());
        }
    }

    let projected_exprs = projected_exprs(&table_def, wanted);
    if let PlanNode::ProjectionAndFilterPushdownTable(existing) = inner.as_ref() {
        if existing.projected_exprs == projected_exprs && existing.pushed_filters == pushed_filters {
            return (inner.clone(), Vec::new());
        }
    }

    (
        Arc::new(PlanNode::ProjectionAndFilterPushdownTable(ProjectionAndFilterPushdownTable {
            table: table_def,
            projected_exprs,
            pushed_filters,
        })),
        newly_accepted,
    )
}

fn projected_column_names(table_def: &Arc<crate::catalog::TableDef>, wanted: &HashSet<String>) -> Vec<String> {
    table_def
        .schema
        .iter()
        .map(|col| col.name.clone())
        .filter(|name| wanted.contains(name))
        .collect()
}

fn projected_exprs(table_def: &Arc<crate::catalog::TableDef>, wanted: &HashSet<String>) -> Vec<Expr> {
    table_def
        .schema
        .iter()
        .enumerate()
        .filter(|(_, col)| wanted.contains(&col.name))
        .map(|(index, col)| Expr::GetFieldWithTable {
            index,
            data_type: col.data_type,
            name: col.name.clone(),
            table: col.table.clone(),
            nullable: col.nullable,
        })
        .collect()
}

fn reindex_project(p: &Project, node: Arc<PlanNode>) -> Result<Arc<PlanNode>, AnalyzerError> {
    let schema = p.input.schema();
    let items: Vec<Expr> = p
        .items
        .iter()
        .cloned()
        .map(|e| reindex_expr(e, &schema))
        .collect::<Result<_, _>>()?;
    Ok(if items == p.items {
        node
    } else {
        Arc::new(PlanNode::Project(Project {
            input: p.input.clone(),
            items,
        }))
    })
}

fn reindex_filter(f: &Filter, node: Arc<PlanNode>) -> Result<Arc<PlanNode>, AnalyzerError> {
    let schema = f.input.schema();
    let predicate = reindex_expr(f.predicate.clone(), &schema)?;
    Ok(if predicate == f.predicate {
        node
    } else {
        Arc::new(PlanNode::Filter(Filter {
            input: f.input.clone(),
            predicate,
        }))
    })
}

fn reindex_sort(s: &Sort, node: Arc<PlanNode>) -> Result<Arc<PlanNode>, AnalyzerError> {
    let schema = s.input.schema();
    let fields: Vec<_> = s
        .fields
        .iter()
        .cloned()
        .map(|mut field| -> Result<_, AnalyzerError> {
            field.expr = reindex_expr(field.expr, &schema)?;
            Ok(field)
        })
        .collect::<Result<_, _>>()?;
    Ok(if fields == s.fields {
        node
    } else {
        Arc::new(PlanNode::Sort(Sort {
            input: s.input.clone(),
            fields,
        }))
    })
}

fn reindex_group_by(g: &GroupBy, node: Arc<PlanNode>) -> Result<Arc<PlanNode>, AnalyzerError> {
    let schema = g.input.schema();
    let group_exprs: Vec<Expr> = g
        .group_exprs
        .iter()
        .cloned()
        .map(|e| reindex_expr(e, &schema))
        .collect::<Result<_, _>>()?;
    let agg_exprs: Vec<Expr> = g
        .agg_exprs
        .iter()
        .cloned()
        .map(|e| reindex_expr(e, &schema))
        .collect::<Result<_, _>>()?;
    Ok(if group_exprs == g.group_exprs && agg_exprs == g.agg_exprs {
        node
    } else {
        Arc::new(PlanNode::GroupBy(GroupBy {
            input: g.input.clone(),
            group_exprs,
            agg_exprs,
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::{AcceptAllBackend, EqualityOnlyBackend};
    use crate::catalog::{TableCapability, TableDef};
    use crate::context::Context;
    use crate::plan::CrossJoin;
    use crate::schema::{ColumnSchema, DataType};

    fn rc<'a>(
        catalog: Arc<dyn crate::catalog::Catalog>,
        ctx: &'a Context,
        analyze_subplan: &'a dyn Fn(Arc<PlanNode>) -> Result<Arc<PlanNode>, AnalyzerError>,
    ) -> RuleContext<'a> {
        RuleContext {
            ctx,
            catalog,
            current_database: "db",
            analyze_subplan,
        }
    }

    fn schema(name: &str, columns: &[&str]) -> Schema {
        Schema::new(
            columns
                .iter()
                .map(|c| ColumnSchema::new(*c, DataType::Int64, name, false))
                .collect(),
        )
    }

    fn table_def(name: &str, columns: &[&str], capability: TableCapability) -> Arc<TableDef> {
        Arc::new(TableDef {
            database: "db".into(),
            name: name.into(),
            schema: schema(name, columns),
            capability,
        })
    }

    fn get_field_with_table(name: &str, column: &str, index: usize) -> Expr {
        Expr::GetFieldWithTable {
            index,
            data_type: DataType::Int64,
            name: column.into(),
            table: name.into(),
            nullable: false,
        }
    }

    fn apply(plan: Arc<PlanNode>) -> Arc<PlanNode> {
        let catalog: Arc<dyn crate::catalog::Catalog> = Arc::new(crate::catalog::memory::MemoryCatalog::new());
        let ctx = Context::new("s1", "db");
        let noop = |p: Arc<PlanNode>| Ok(p);
        let rule_ctx = rc(catalog, &ctx, &noop);
        Pushdown.apply(&rule_ctx, plan).unwrap().get_plan()
    }

    #[test]
    fn projection_pushdown_narrows_columns_and_reindexes_the_project_above_it() {
        let def = table_def(
            "t1",
            &["a", "b", "c"],
            TableCapability::ProjectionPushdown(Arc::new(crate::catalog::memory::EqualityOnlyBackend)),
        );
        let table = Arc::new(PlanNode::Table(def));
        let plan = Arc::new(PlanNode::Project(Project {
            input: table,
            items: vec![get_field_with_table("t1", "c", 2)],
        }));

        let result = apply(plan);
        match result.as_ref() {
            PlanNode::Project(p) => {
                match p.input.as_ref() {
                    PlanNode::ProjectionPushdownTable(t) => {
                        assert_eq!(t.projected_columns, vec!["c".to_string()]);
                    }
                    other => panic!("expected ProjectionPushdownTable, got {other:?}"),
                }
                assert!(matches!(p.items[0], Expr::GetFieldWithTable { index: 0, .. }));
            }
            other => panic!("expected Project, got {other:?}"),
        }
    }

    #[test]
    fn equality_filter_is_pushed_and_residual_filter_is_elided() {
        let def = table_def(
            "t1",
            &["a"],
            TableCapability::ProjectionAndFilterPushdown(Arc::new(EqualityOnlyBackend)),
        );
        let table = Arc::new(PlanNode::Table(def));
        let predicate = get_field_with_table("t1", "a", 0).eq(Expr::Literal(crate::expr::LiteralValue::Int64(1)));
        let plan = Arc::new(PlanNode::Filter(Filter {
            input: table,
            predicate,
        }));

        let result = apply(plan);
        match result.as_ref() {
            PlanNode::ProjectionAndFilterPushdownTable(t) => {
                assert_eq!(t.pushed_filters.len(), 1);
            }
            other => panic!("expected the Filter to be elided, got {other:?}"),
        }
    }

    #[test]
    fn cross_table_conjunct_stays_in_the_residual_predicate() {
        let left = table_def("t1", &["a"], TableCapability::ProjectionAndFilterPushdown(Arc::new(AcceptAllBackend)));
        let right = table_def("t2", &["b"], TableCapability::ProjectionAndFilterPushdown(Arc::new(AcceptAllBackend)));
        let join = Arc::new(PlanNode::CrossJoin(CrossJoin {
            left: Arc::new(PlanNode::Table(left)),
            right: Arc::new(PlanNode::Table(right)),
        }));
        let predicate = get_field_with_table("t1", "a", 0).eq(get_field_with_table("t2", "b", 1));
        let plan = Arc::new(PlanNode::Filter(Filter {
            input: join,
            predicate: predicate.clone(),
        }));

        let result = apply(plan);
        match result.as_ref() {
            PlanNode::Filter(f) => {
                assert!(matches!(f.predicate, Expr::Comparison { .. }));
            }
            other => panic!("expected the cross-table predicate to stay a Filter, got {other:?}"),
        }
    }

    #[test]
    fn single_table_conjunct_is_pushed_while_cross_table_conjunct_stays() {
        let left = table_def("t1", &["a"], TableCapability::ProjectionAndFilterPushdown(Arc::new(AcceptAllBackend)));
        let right = table_def("t2", &["b"], TableCapability::ProjectionAndFilterPushdown(Arc::new(AcceptAllBackend)));
        let join = Arc::new(PlanNode::CrossJoin(CrossJoin {
            left: Arc::new(PlanNode::Table(left)),
            right: Arc::new(PlanNode::Table(right)),
        }));
        let single_table = get_field_with_table("t1", "a", 0).eq(Expr::Literal(crate::expr::LiteralValue::Int64(1)));
        let cross_table = get_field_with_table("t1", "a", 0).eq(get_field_with_table("t2", "b", 1));
        let predicate = Expr::Boolean {
            kind: crate::expr::BooleanKind::And,
            children: vec![single_table, cross_table.clone()],
        };
        let plan = Arc::new(PlanNode::Filter(Filter {
            input: join,
            predicate,
        }));

        let result = apply(plan);
        match result.as_ref() {
            PlanNode::Filter(f) => {
                assert_eq!(f.predicate, cross_table);
                match f.input.as_ref() {
                    PlanNode::CrossJoin(j) => match j.left.as_ref() {
                        PlanNode::ProjectionAndFilterPushdownTable(t) => {
                            assert_eq!(t.pushed_filters.len(), 1);
                        }
                        other => panic!("expected left leaf pushdown, got {other:?}"),
                    },
                    other => panic!("expected CrossJoin, got {other:?}"),
                }
            }
            other => panic!("expected a residual Filter, got {other:?}"),
        }
    }

    #[test]
    fn table_alias_survives_pushdown() {
        let def = table_def(
            "t1",
            &["a", "b"],
            TableCapability::ProjectionPushdown(Arc::new(EqualityOnlyBackend)),
        );
        let aliased = Arc::new(PlanNode::TableAlias(TableAlias {
            alias: "x".into(),
            input: Arc::new(PlanNode::Table(def)),
        }));
        let plan = Arc::new(PlanNode::Project(Project {
            input: aliased,
            items: vec![get_field_with_table("x", "b", 1)],
        }));

        let result = apply(plan);
        match result.as_ref() {
            PlanNode::Project(p) => match p.input.as_ref() {
                PlanNode::TableAlias(a) => {
                    assert_eq!(a.alias, "x");
                    assert!(matches!(a.input.as_ref(), PlanNode::ProjectionPushdownTable(_)));
                }
                other => panic!("expected TableAlias to survive, got {other:?}"),
            },
            other => panic!("expected Project, got {other:?}"),
        }
    }

    #[test]
    fn reindexing_a_column_absent_from_the_new_schema_errors_instead_of_defaulting_to_zero() {
        let project = Project {
            input: Arc::new(PlanNode::Table(table_def("t1", &["a"], TableCapability::Basic))),
            items: vec![get_field_with_table("t1", "gone", 0)],
        };
        let node = Arc::new(PlanNode::Project(project.clone()));

        let err = reindex_project(&project, node).unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::Plan(crate::plan::PlanError::GetFieldIndexOutOfRange { .. })
        ));
    }
}
