//! Cross-cutting invariants from spec.md §8, checked against the full
//! `Analyzer::analyze` pipeline rather than any single rule.

use std::sync::Arc;

use plan_analyzer::catalog::memory::MemoryCatalog;
use plan_analyzer::catalog::{Catalog, TableCapability};
use plan_analyzer::context::Context;
use plan_analyzer::expr::Expr;
use plan_analyzer::plan::{CrossJoin, Filter, NaturalJoin, PlanNode, Project};
use plan_analyzer::schema::{ColumnSchema, DataType, Schema};
use plan_analyzer::{Analyzer, AnalyzerError};

fn schema(columns: &[(&str, &str)]) -> Schema {
    Schema::new(
        columns
            .iter()
            .map(|(table, name)| ColumnSchema::new(*name, DataType::Int64, *table, false))
            .collect(),
    )
}

fn catalog_with_tables(tables: &[(&str, &[&str])]) -> Arc<dyn Catalog> {
    let mut catalog = MemoryCatalog::new().with_database("db");
    for (name, columns) in tables {
        let cols: Vec<(&str, &str)> = columns.iter().map(|c| (*name, *c)).collect();
        catalog = catalog.with_table("db", *name, schema(&cols), TableCapability::Basic);
    }
    Arc::new(catalog)
}

/// Recursively checks that no `Expr` in `node`'s own attributes or subtree
/// is an unresolved variant (invariant 2, spec §8), and that no
/// `UnresolvedTable`/`NaturalJoin` node survives.
fn assert_no_unresolved_remnants(node: &PlanNode) {
    match node {
        PlanNode::UnresolvedTable(name) => {
            panic!("UnresolvedTable({name}) survived analysis")
        }
        PlanNode::NaturalJoin(_) => panic!("NaturalJoin survived analysis"),
        PlanNode::Project(p) => {
            for item in &p.items {
                assert_expr_resolved(item);
            }
        }
        PlanNode::Filter(f) => assert_expr_resolved(&f.predicate),
        PlanNode::Sort(s) => {
            for field in &s.fields {
                assert_expr_resolved(&field.expr);
            }
        }
        PlanNode::GroupBy(g) => {
            for expr in g.group_exprs.iter().chain(g.agg_exprs.iter()) {
                assert_expr_resolved(expr);
            }
        }
        PlanNode::InnerJoin(j) => assert_expr_resolved(&j.predicate),
        _ => {}
    }
    for child in node.children() {
        assert_no_unresolved_remnants(&child);
    }
}

fn assert_expr_resolved(expr: &Expr) {
    assert!(expr.is_resolved(), "expression left unresolved: {expr:?}");
}

// Invariant 1: re-analyzing an already-analyzed plan is a no-op.
#[test]
fn analysis_is_idempotent() {
    let catalog = catalog_with_tables(&[("t1", &["a", "b"])]);
    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("idempotence", "db");

    let plan = Arc::new(PlanNode::Project(Project {
        input: Arc::new(PlanNode::UnresolvedTable("t1".into())),
        items: vec![Expr::Star],
    }));

    let once = analyzer.analyze(&ctx, plan).unwrap();
    let twice = analyzer.analyze(&ctx, once.clone()).unwrap();
    assert_eq!(*once, *twice);
}

// Invariant 2: a fully analyzed plan contains no unresolved expression or
// plan-node variant anywhere in its tree.
#[test]
fn no_unresolved_variants_survive_analysis() {
    let catalog = catalog_with_tables(&[("t1", &["a", "id"]), ("t2", &["b", "id"])]);
    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("no-remnants", "db");

    let join = Arc::new(PlanNode::NaturalJoin(NaturalJoin {
        left: Arc::new(PlanNode::UnresolvedTable("t1".into())),
        right: Arc::new(PlanNode::UnresolvedTable("t2".into())),
    }));
    let plan = Arc::new(PlanNode::Filter(Filter {
        input: join,
        predicate: Expr::unresolved_qualified("t1", "a").eq(Expr::Literal(
            plan_analyzer::expr::LiteralValue::Int64(1),
        )),
    }));

    let result = analyzer.analyze(&ctx, plan).unwrap();
    assert!(result.resolved());
    assert_no_unresolved_remnants(&result);
}

// Invariant 4: `*` expansion always lists columns in the child schema's own
// order, regardless of join shape.
#[test]
fn star_expansion_matches_child_schema_order() {
    let catalog = catalog_with_tables(&[("t1", &["a", "b"]), ("t2", &["c", "d"])]);
    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("star-order", "db");

    let join = Arc::new(PlanNode::CrossJoin(CrossJoin {
        left: Arc::new(PlanNode::UnresolvedTable("t1".into())),
        right: Arc::new(PlanNode::UnresolvedTable("t2".into())),
    }));
    let plan = Arc::new(PlanNode::Project(Project {
        input: join,
        items: vec![Expr::Star],
    }));

    let result = analyzer.analyze(&ctx, plan).unwrap();
    let names: Vec<String> = result.schema().iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, vec!["a", "b", "c", "d"]);
}

// Invariant 5: a natural join with no overlapping columns never survives as
// a `NaturalJoin` node — it always becomes a plain `CrossJoin`.
#[test]
fn disjoint_natural_join_always_becomes_cross_join() {
    let catalog = catalog_with_tables(&[("t1", &["a"]), ("t2", &["b"])]);
    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("disjoint", "db");

    let join = Arc::new(PlanNode::NaturalJoin(NaturalJoin {
        left: Arc::new(PlanNode::UnresolvedTable("t1".into())),
        right: Arc::new(PlanNode::UnresolvedTable("t2".into())),
    }));
    let result = analyzer.analyze(&ctx, join).unwrap();
    assert!(matches!(result.as_ref(), PlanNode::CrossJoin(_)));
}

// A bare reference to an unregistered table is a hard resolution error, not
// a silently-empty result.
#[test]
fn unresolvable_table_reference_is_reported() {
    let catalog = catalog_with_tables(&[]);
    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("missing-table", "db");

    let plan = Arc::new(PlanNode::UnresolvedTable("ghost".into()));
    let err = analyzer.analyze(&ctx, plan).unwrap_err();
    assert_eq!(err, AnalyzerError::ErrTableNotFound("ghost".into()));
}
