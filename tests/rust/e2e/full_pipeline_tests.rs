//! A single query exercising subqueries, natural joins, `*` expansion,
//! projection pushdown, and an `ORDER BY` literal position together,
//! checked against the converged output of `Analyzer::analyze` (spec §8).

use std::sync::Arc;

use plan_analyzer::catalog::memory::{EqualityOnlyBackend, MemoryCatalog};
use plan_analyzer::catalog::{Catalog, TableCapability};
use plan_analyzer::context::Context;
use plan_analyzer::expr::{Expr, LiteralValue};
use plan_analyzer::plan::{NaturalJoin, PlanNode, Project, Sort, SortField, SubqueryAlias};
use plan_analyzer::schema::{ColumnSchema, DataType, Schema};
use plan_analyzer::Analyzer;

fn schema(columns: &[(&str, &str)]) -> Schema {
    Schema::new(
        columns
            .iter()
            .map(|(table, name)| ColumnSchema::new(*name, DataType::Int64, *table, false))
            .collect(),
    )
}

// `SELECT * FROM (SELECT id, amount FROM orders) o NATURAL JOIN customers
// ORDER BY 2`, where `orders` advertises projection pushdown and
// `customers` is a plain scan.
#[test]
fn subquery_natural_join_star_and_orderby_literal_converge_together() {
    let catalog = MemoryCatalog::new()
        .with_database("db")
        .with_table(
            "db",
            "orders",
            schema(&[("orders", "id"), ("orders", "amount")]),
            TableCapability::ProjectionPushdown(Arc::new(EqualityOnlyBackend)),
        )
        .with_table(
            "db",
            "customers",
            schema(&[("customers", "id"), ("customers", "name")]),
            TableCapability::Basic,
        );
    let catalog: Arc<dyn Catalog> = Arc::new(catalog);

    let inner_sub = Arc::new(PlanNode::Project(Project {
        input: Arc::new(PlanNode::UnresolvedTable("orders".into())),
        items: vec![Expr::unresolved_column("id"), Expr::unresolved_column("amount")],
    }));
    let subquery = Arc::new(PlanNode::SubqueryAlias(SubqueryAlias {
        alias: "o".into(),
        input: inner_sub,
        cached_schema: None,
    }));
    let join = Arc::new(PlanNode::NaturalJoin(NaturalJoin {
        left: subquery,
        right: Arc::new(PlanNode::UnresolvedTable("customers".into())),
    }));
    let star_project = Arc::new(PlanNode::Project(Project {
        input: join,
        items: vec![Expr::Star],
    }));
    let plan = Arc::new(PlanNode::Sort(Sort {
        input: star_project,
        fields: vec![SortField::asc(Expr::Literal(LiteralValue::Int64(2)))],
    }));

    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("e2e-1", "db");
    let result = analyzer.analyze(&ctx, plan).unwrap();

    assert!(result.resolved());

    let names: Vec<String> = result.schema().iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, vec!["id", "amount", "name"]);

    match result.as_ref() {
        PlanNode::Sort(s) => {
            assert_eq!(s.fields.len(), 1);
            match &s.fields[0].expr {
                Expr::GetFieldWithTable { index, name, .. } => {
                    assert_eq!(*index, 1);
                    assert_eq!(name, "amount");
                }
                other => panic!("expected an ORDER BY position resolved to a column, got {other:?}"),
            }
        }
        other => panic!("expected a Sort at the top of the converged plan, got {other:?}"),
    }

    let again = analyzer.analyze(&ctx, result.clone()).unwrap();
    assert_eq!(*again, *result);
}
