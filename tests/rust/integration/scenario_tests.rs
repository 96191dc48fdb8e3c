//! One test per concrete scenario in spec.md §8 (S1-S7), driven through the
//! full `Analyzer::analyze` fixed-point pipeline rather than a single rule.

use std::sync::Arc;

use plan_analyzer::catalog::memory::{EqualityOnlyBackend, MemoryCatalog};
use plan_analyzer::catalog::table_capability::PushdownProjectionAndFiltersTable;
use plan_analyzer::catalog::{Catalog, Index, IndexId, IndexLookup, TableCapability};
use plan_analyzer::context::Context;
use plan_analyzer::expr::{BooleanKind, ComparisonKind, Expr, LiteralValue};
use plan_analyzer::plan::{
    CrossJoin, Filter, IndexableTable, InnerJoin, NaturalJoin, PlanNode, Project,
    ProjectionAndFilterPushdownTable, ProjectionPushdownTable, Sort, SortField, SubqueryAlias,
};
use plan_analyzer::schema::{ColumnSchema, DataType, Schema};
use plan_analyzer::{Analyzer, AnalyzerError};

mockall::mock! {
    RecordingBackend {}

    impl std::fmt::Debug for RecordingBackend {
        fn fmt<'a>(&self, f: &mut std::fmt::Formatter<'a>) -> std::fmt::Result;
    }

    impl PushdownProjectionAndFiltersTable for RecordingBackend {
        fn handled_filters(&self, candidates: &[Expr]) -> Vec<Expr>;
    }
}

fn schema(columns: &[(&str, &str)]) -> Schema {
    Schema::new(
        columns
            .iter()
            .map(|(table, name)| ColumnSchema::new(*name, DataType::Int64, *table, false))
            .collect(),
    )
}

fn basic_table(catalog: MemoryCatalog, name: &str, columns: &[&str]) -> MemoryCatalog {
    let cols: Vec<(&str, &str)> = columns.iter().map(|c| (name, *c)).collect();
    catalog.with_table("db", name, schema(&cols), TableCapability::Basic)
}

// S1: SubqueryAlias over a pushdown-capable scan, cross-joined with a plain
// table, projected with `*`. The subquery's inner projection collapses into
// a `ProjectionPushdownTable` and the outer passthrough `Project` is erased.
#[test]
fn s1_subquery_over_pushdown_table_collapses_and_outer_projection_is_erased() {
    let catalog = MemoryCatalog::new()
        .with_database("db")
        .with_table(
            "db",
            "foo",
            schema(&[("foo", "a")]),
            TableCapability::ProjectionPushdown(Arc::new(EqualityOnlyBackend)),
        );
    let catalog = basic_table(catalog, "baz", &["c"]);
    let catalog: Arc<dyn Catalog> = Arc::new(catalog);

    let inner = Arc::new(PlanNode::Project(Project {
        input: Arc::new(PlanNode::UnresolvedTable("foo".into())),
        items: vec![Expr::unresolved_column("a")],
    }));
    let subquery = Arc::new(PlanNode::SubqueryAlias(SubqueryAlias {
        alias: "t1".into(),
        input: inner,
        cached_schema: None,
    }));
    let join = Arc::new(PlanNode::CrossJoin(CrossJoin {
        left: subquery,
        right: Arc::new(PlanNode::UnresolvedTable("baz".into())),
    }));
    let plan = Arc::new(PlanNode::Project(Project {
        input: join,
        items: vec![Expr::Star],
    }));

    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("s1", "db");
    let result = analyzer.analyze(&ctx, plan).unwrap();

    assert!(result.resolved());
    match result.as_ref() {
        PlanNode::CrossJoin(j) => {
            match j.left.as_ref() {
                PlanNode::SubqueryAlias(a) => {
                    assert_eq!(a.alias, "t1");
                    match a.input.as_ref() {
                        PlanNode::ProjectionPushdownTable(ProjectionPushdownTable {
                            table,
                            projected_columns,
                        }) => {
                            assert_eq!(table.name, "foo");
                            assert_eq!(projected_columns, &vec!["a".to_string()]);
                        }
                        other => panic!("expected ProjectionPushdownTable, got {other:?}"),
                    }
                }
                other => panic!("expected SubqueryAlias, got {other:?}"),
            }
            assert!(matches!(j.right.as_ref(), PlanNode::Table(t) if t.name == "baz"));
        }
        other => panic!("expected bare CrossJoin after erasing the outer Project, got {other:?}"),
    }

    // Invariant 1: idempotence.
    let again = analyzer.analyze(&ctx, result.clone()).unwrap();
    assert_eq!(*again, *result);
}

// S2: overlapping-column natural join resolves to an InnerJoin keyed on the
// shared columns, with the shared column projected once.
#[test]
fn s2_natural_join_with_overlap_becomes_inner_join() {
    let catalog = basic_table(MemoryCatalog::new().with_database("db"), "t1", &["id", "a"]);
    let catalog = basic_table(catalog, "t2", &["id", "b"]);
    let catalog: Arc<dyn Catalog> = Arc::new(catalog);

    let join = Arc::new(PlanNode::NaturalJoin(NaturalJoin {
        left: Arc::new(PlanNode::UnresolvedTable("t1".into())),
        right: Arc::new(PlanNode::UnresolvedTable("t2".into())),
    }));
    let plan = Arc::new(PlanNode::Project(Project {
        input: join,
        items: vec![Expr::Star],
    }));

    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("s2", "db");
    let result = analyzer.analyze(&ctx, plan).unwrap();

    assert!(result.resolved());
    let names: Vec<String> = result.schema().iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, vec!["id", "a", "b"]);

    fn find_inner_join(node: &PlanNode) -> Option<&InnerJoin> {
        match node {
            PlanNode::InnerJoin(j) => Some(j),
            PlanNode::Project(p) => find_inner_join(&p.input),
            _ => None,
        }
    }
    let join = find_inner_join(&result).expect("expected an InnerJoin somewhere in the plan");
    match &join.predicate {
        Expr::Comparison { kind, .. } => {
            assert_eq!(*kind, plan_analyzer::expr::ComparisonKind::Eq)
        }
        other => panic!("expected an equality join predicate, got {other:?}"),
    }
}

// S3: disjoint-column natural join becomes a plain CrossJoin; a `*`
// projection over it is a passthrough and erased in full pipeline analysis.
#[test]
fn s3_natural_join_without_overlap_becomes_cross_join() {
    let catalog = basic_table(MemoryCatalog::new().with_database("db"), "t1", &["a"]);
    let catalog = basic_table(catalog, "t2", &["b"]);
    let catalog: Arc<dyn Catalog> = Arc::new(catalog);

    let join = Arc::new(PlanNode::NaturalJoin(NaturalJoin {
        left: Arc::new(PlanNode::UnresolvedTable("t1".into())),
        right: Arc::new(PlanNode::UnresolvedTable("t2".into())),
    }));
    let plan = Arc::new(PlanNode::Project(Project {
        input: join,
        items: vec![Expr::Star],
    }));

    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("s3", "db");
    let result = analyzer.analyze(&ctx, plan).unwrap();

    assert!(result.resolved());
    assert!(matches!(result.as_ref(), PlanNode::CrossJoin(_)));
}

// S4: an integer-literal ORDER BY position rewrites to a positional column
// reference; an out-of-range position is a hard error.
#[test]
fn s4_orderby_literal_position_resolves_to_get_field() {
    let catalog: Arc<dyn Catalog> =
        Arc::new(basic_table(MemoryCatalog::new().with_database("db"), "t", &["a", "b"]));
    let plan = Arc::new(PlanNode::Sort(Sort {
        input: Arc::new(PlanNode::UnresolvedTable("t".into())),
        fields: vec![SortField::asc(Expr::Literal(LiteralValue::Int64(2)))],
    }));

    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("s4", "db");
    let result = analyzer.analyze(&ctx, plan).unwrap();

    match result.as_ref() {
        PlanNode::Sort(s) => match &s.fields[0].expr {
            Expr::GetFieldWithTable { index, name, table, .. } => {
                assert_eq!(*index, 1);
                assert_eq!(name, "b");
                assert_eq!(table, "t");
            }
            other => panic!("expected GetFieldWithTable, got {other:?}"),
        },
        other => panic!("expected Sort, got {other:?}"),
    }
}

#[test]
fn s4_orderby_literal_out_of_range_is_an_error() {
    let catalog: Arc<dyn Catalog> =
        Arc::new(basic_table(MemoryCatalog::new().with_database("db"), "t", &["a", "b"]));
    let plan = Arc::new(PlanNode::Sort(Sort {
        input: Arc::new(PlanNode::UnresolvedTable("t".into())),
        fields: vec![SortField::asc(Expr::Literal(LiteralValue::Int64(5)))],
    }));

    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("s4err", "db");
    let err = analyzer.analyze(&ctx, plan).unwrap_err();
    assert_eq!(
        err,
        AnalyzerError::ErrOrderByColumnIndex { index: 5, len: 2 }
    );
}

// S5: a mixed conjunction splits across two tables with different pushdown
// capabilities; only the equality conjunct on `mytable` is pushed, and every
// upstream reference is re-indexed against the narrowed schemas.
#[test]
fn s5_mixed_pushdown_filter_partitions_by_table_and_reindexes() {
    let catalog = MemoryCatalog::new().with_database("db").with_table(
        "db",
        "mytable",
        schema(&[("mytable", "i"), ("mytable", "f")]),
        TableCapability::ProjectionAndFilterPushdown(Arc::new(EqualityOnlyBackend)),
    );
    let catalog = catalog.with_table(
        "db",
        "mytable2",
        schema(&[("mytable2", "i2")]),
        TableCapability::ProjectionPushdown(Arc::new(EqualityOnlyBackend)),
    );
    let catalog: Arc<dyn Catalog> = Arc::new(catalog);

    let join = Arc::new(PlanNode::CrossJoin(CrossJoin {
        left: Arc::new(PlanNode::UnresolvedTable("mytable".into())),
        right: Arc::new(PlanNode::UnresolvedTable("mytable2".into())),
    }));
    let predicate = Expr::Boolean {
        kind: BooleanKind::And,
        children: vec![
            Expr::Boolean {
                kind: BooleanKind::And,
                children: vec![
                    Expr::unresolved_qualified("mytable", "f")
                        .eq(Expr::Literal(LiteralValue::Float64(3.14))),
                    Expr::unresolved_qualified("mytable", "f")
                        .gt(Expr::Literal(LiteralValue::Float64(3.0))),
                ],
            },
            Expr::unresolved_qualified("mytable2", "i2").is_null(),
        ],
    };
    let filter = Arc::new(PlanNode::Filter(Filter {
        input: join,
        predicate,
    }));
    let plan = Arc::new(PlanNode::Project(Project {
        input: filter,
        items: vec![Expr::unresolved_qualified("mytable", "i")],
    }));

    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("s5", "db");
    let result = analyzer.analyze(&ctx, plan).unwrap();

    match result.as_ref() {
        PlanNode::Project(p) => {
            assert_eq!(p.items.len(), 1);
            match &p.items[0] {
                Expr::GetFieldWithTable { table, name, .. } => {
                    assert_eq!(table, "mytable");
                    assert_eq!(name, "i");
                }
                other => panic!("expected GetFieldWithTable, got {other:?}"),
            }
            match p.input.as_ref() {
                PlanNode::Filter(f) => {
                    let conjuncts = plan_analyzer::expr::combinators::split_conjuncts(&f.predicate);
                    assert_eq!(conjuncts.len(), 2);
                    let has_residual_gt = conjuncts.iter().any(|e| {
                        matches!(
                            e,
                            Expr::Comparison {
                                kind: plan_analyzer::expr::ComparisonKind::Gt,
                                ..
                            }
                        )
                    });
                    let has_residual_is_null = conjuncts.iter().any(|e| {
                        matches!(
                            e,
                            Expr::Comparison {
                                kind: plan_analyzer::expr::ComparisonKind::IsNull,
                                ..
                            }
                        )
                    });
                    assert!(has_residual_gt, "f > 3.0 must remain resident");
                    assert!(has_residual_is_null, "i2 IS NULL must remain resident");

                    match f.input.as_ref() {
                        PlanNode::CrossJoin(j) => {
                            match j.left.as_ref() {
                                PlanNode::ProjectionAndFilterPushdownTable(
                                    ProjectionAndFilterPushdownTable {
                                        table,
                                        projected_exprs,
                                        pushed_filters,
                                    },
                                ) => {
                                    assert_eq!(table.name, "mytable");
                                    let names: Vec<&str> = projected_exprs
                                        .iter()
                                        .map(|e| e.output_name().unwrap_or(""))
                                        .collect();
                                    assert!(names.contains(&"i"));
                                    assert!(names.contains(&"f"));
                                    assert_eq!(pushed_filters.len(), 1);
                                    assert!(matches!(
                                        &pushed_filters[0],
                                        Expr::Comparison {
                                            kind: plan_analyzer::expr::ComparisonKind::Eq,
                                            ..
                                        }
                                    ));
                                }
                                other => panic!(
                                    "expected ProjectionAndFilterPushdownTable on mytable, got {other:?}"
                                ),
                            }
                            match j.right.as_ref() {
                                PlanNode::ProjectionPushdownTable(ProjectionPushdownTable {
                                    table,
                                    projected_columns,
                                }) => {
                                    assert_eq!(table.name, "mytable2");
                                    assert_eq!(projected_columns, &vec!["i2".to_string()]);
                                }
                                other => panic!(
                                    "expected ProjectionPushdownTable on mytable2, got {other:?}"
                                ),
                            }
                        }
                        other => panic!("expected CrossJoin, got {other:?}"),
                    }
                }
                other => panic!("expected Filter, got {other:?}"),
            }
        }
        other => panic!("expected Project, got {other:?}"),
    }
}

// S5 (mocked backend): confirms pushdown offers the mocked backend exactly
// the two single-table conjuncts on `mytable` (and nothing belonging to
// `mytable2`), regardless of which ones it goes on to accept.
#[test]
fn s5_mock_backend_is_offered_exactly_the_single_table_conjuncts() {
    let mut mock = MockRecordingBackend::new();
    mock.expect_handled_filters()
        .times(1)
        .withf(|candidates: &[Expr]| {
            candidates.len() == 2
                && candidates.iter().all(|e| {
                    matches!(
                        e,
                        Expr::Comparison {
                            kind: ComparisonKind::Eq | ComparisonKind::Gt,
                            ..
                        }
                    )
                })
        })
        .returning(|candidates| {
            candidates
                .iter()
                .filter(|e| matches!(e, Expr::Comparison { kind: ComparisonKind::Eq, .. }))
                .cloned()
                .collect()
        });

    let catalog = MemoryCatalog::new().with_database("db").with_table(
        "db",
        "mytable",
        schema(&[("mytable", "i"), ("mytable", "f")]),
        TableCapability::ProjectionAndFilterPushdown(Arc::new(mock)),
    );
    let catalog = catalog.with_table(
        "db",
        "mytable2",
        schema(&[("mytable2", "i2")]),
        TableCapability::Basic,
    );
    let catalog: Arc<dyn Catalog> = Arc::new(catalog);

    let join = Arc::new(PlanNode::CrossJoin(CrossJoin {
        left: Arc::new(PlanNode::UnresolvedTable("mytable".into())),
        right: Arc::new(PlanNode::UnresolvedTable("mytable2".into())),
    }));
    let predicate = Expr::Boolean {
        kind: BooleanKind::And,
        children: vec![
            Expr::unresolved_qualified("mytable", "f").eq(Expr::Literal(LiteralValue::Float64(3.14))),
            Expr::unresolved_qualified("mytable", "f").gt(Expr::Literal(LiteralValue::Float64(3.0))),
        ],
    };
    let plan = Arc::new(PlanNode::Filter(Filter {
        input: join,
        predicate,
    }));

    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("s5-mock", "db");
    let result = analyzer.analyze(&ctx, plan).unwrap();

    match result.as_ref() {
        PlanNode::Filter(f) => {
            assert!(matches!(
                &f.predicate,
                Expr::Comparison { kind: ComparisonKind::Gt, .. }
            ));
        }
        other => panic!("expected a residual Filter with the unaccepted Gt conjunct, got {other:?}"),
    }
}

// S6: an OR predicate spanning two tables yields no usable per-table index
// lookup (spec §4.15's combination rule drops both sides of a cross-table
// OR); the filter and its join tree are left untouched by assign_indexes.
#[test]
fn s6_cross_table_or_leaves_filter_and_scans_unindexed() {
    let catalog = MemoryCatalog::new().with_database("db");
    catalog.add_index(Index {
        id: IndexId("t1_foo_idx".into()),
        database: "db".into(),
        table: "t1".into(),
        expression: Expr::unresolved_column("foo"),
    });
    catalog.add_index(Index {
        id: IndexId("t2_bar_idx".into()),
        database: "db".into(),
        table: "t2".into(),
        expression: Expr::unresolved_column("bar"),
    });
    catalog.index_registry().mark_ready(&IndexId("t1_foo_idx".into()));
    catalog.index_registry().mark_ready(&IndexId("t2_bar_idx".into()));

    let catalog = catalog.with_table(
        "db",
        "t1",
        schema(&[("t1", "id"), ("t1", "foo")]),
        TableCapability::Indexable(Arc::new(EqualityOnlyBackend)),
    );
    let catalog = catalog.with_table(
        "db",
        "t2",
        schema(&[("t2", "id"), ("t2", "bar")]),
        TableCapability::Indexable(Arc::new(EqualityOnlyBackend)),
    );
    let catalog: Arc<dyn Catalog> = Arc::new(catalog);

    let join = Arc::new(PlanNode::InnerJoin(InnerJoin {
        left: Arc::new(PlanNode::UnresolvedTable("t1".into())),
        right: Arc::new(PlanNode::UnresolvedTable("t2".into())),
        predicate: Expr::unresolved_qualified("t1", "id").eq(Expr::unresolved_qualified("t2", "id")),
    }));
    let predicate = Expr::Boolean {
        kind: BooleanKind::Or,
        children: vec![
            Expr::unresolved_qualified("t2", "bar").eq(Expr::Literal(LiteralValue::Int64(1))),
            Expr::unresolved_qualified("t1", "foo").eq(Expr::Literal(LiteralValue::Int64(2))),
        ],
    };
    let plan = Arc::new(PlanNode::Filter(Filter {
        input: join,
        predicate,
    }));

    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("s6", "db");
    let result = analyzer.analyze(&ctx, plan).unwrap();

    match result.as_ref() {
        PlanNode::Filter(f) => {
            assert!(matches!(&f.predicate, Expr::Boolean { kind: BooleanKind::Or, .. }));
            match f.input.as_ref() {
                PlanNode::InnerJoin(j) => {
                    assert!(!matches!(j.left.as_ref(), PlanNode::IndexableTable(_)));
                    assert!(!matches!(j.right.as_ref(), PlanNode::IndexableTable(_)));
                }
                other => panic!("expected InnerJoin, got {other:?}"),
            }
        }
        other => panic!("expected Filter, got {other:?}"),
    }
}

// S7: an `IN` list against an indexed column becomes a union-of-singletons
// key-set lookup, with the table scan wrapped as an `IndexableTable`.
#[test]
fn s7_in_list_becomes_union_of_single_key_lookups() {
    let catalog = MemoryCatalog::new().with_database("db");
    catalog.add_index(Index {
        id: IndexId("t_bar_idx".into()),
        database: "db".into(),
        table: "t".into(),
        expression: Expr::unresolved_column("bar"),
    });
    catalog.index_registry().mark_ready(&IndexId("t_bar_idx".into()));
    let catalog = catalog.with_table(
        "db",
        "t",
        schema(&[("t", "bar")]),
        TableCapability::Indexable(Arc::new(EqualityOnlyBackend)),
    );
    let catalog: Arc<dyn Catalog> = Arc::new(catalog);

    let predicate = Expr::In {
        left: Box::new(Expr::unresolved_qualified("t", "bar")),
        list: Box::new(Expr::Tuple(vec![
            Expr::Literal(LiteralValue::Int64(1)),
            Expr::Literal(LiteralValue::Int64(2)),
            Expr::Literal(LiteralValue::Int64(3)),
            Expr::Literal(LiteralValue::Int64(4)),
        ])),
    };
    let plan = Arc::new(PlanNode::Filter(Filter {
        input: Arc::new(PlanNode::UnresolvedTable("t".into())),
        predicate,
    }));

    let analyzer = Analyzer::new(catalog);
    let ctx = Context::new("s7", "db");
    let result = analyzer.analyze(&ctx, plan).unwrap();

    match result.as_ref() {
        PlanNode::Filter(f) => match f.input.as_ref() {
            PlanNode::IndexableTable(IndexableTable { lookup, index_ids, .. }) => {
                assert_eq!(index_ids.len(), 1);
                assert_eq!(index_ids[0], IndexId("t_bar_idx".into()));
                let key_set = lookup
                    .as_any()
                    .downcast_ref::<plan_analyzer::catalog::index::KeySetLookup>()
                    .expect("EqualityOnlyBackend produces KeySetLookup");
                let mut keys = key_set.keys().to_vec();
                keys.sort();
                assert_eq!(keys, vec!["1", "2", "3", "4"]);
            }
            other => panic!("expected IndexableTable, got {other:?}"),
        },
        other => panic!("expected Filter, got {other:?}"),
    }
}
