//! Splits a `Project` that aliases an expression referenced by a `Sort` or
//! `Filter` beneath it into an outer `Project` (consuming the alias as a
//! plain column) and an inner `Project` injected immediately above the
//! referencing operator's own input (spec §4.11, "reorder_projection").
//!
//! This mirrors how a SQL planner typically builds `ORDER BY`/`HAVING`
//! clauses as children of the enclosing `SELECT`'s projection rather than
//! its parent: the alias they reference by name isn't a column of their own
//! input, so it has to be materialized one level lower before
//! `qualify_columns`/`resolve_columns` can bind it.

use std::sync::Arc;

use crate::expr::visitors::transform_expr_up;
use crate::expr::Expr;
use crate::plan::{expr_output_column, Filter, PlanNode, Project, Sort, SortField};
use crate::schema::ColumnSchema;
use crate::transform::transform_up;

use super::errors::AnalyzerError;
use super::rule::{Rule, RuleContext};
use super::transformed::Transformed;

pub struct ReorderProjection;

impl Rule for ReorderProjection {
    fn name(&self) -> &'static str {
        "reorder_projection"
    }

    fn apply(
        &self,
        _rc: &RuleContext,
        plan: Arc<PlanNode>,
    ) -> Result<Transformed<Arc<PlanNode>>, AnalyzerError> {
        let result = transform_up(&plan, &mut |node| match node.as_ref() {
            PlanNode::Project(p) if p.input.resolved() && has_alias(&p.items) => {
                let aliases = alias_list(&p.items);
                match splice(&p.input, &aliases) {
                    Some((new_input, positions)) => {
                        log::debug!("reordering projection to materialize aliases referenced below");
                        let items = p
                            .items
                            .iter()
                            .map(|item| match item {
                                Expr::Alias { alias, .. } if positions.contains_key(alias) => {
                                    let (index, col) = &positions[alias];
                                    Expr::GetFieldWithTable {
                                        index: *index,
                                        data_type: col.data_type,
                                        name: col.name.clone(),
                                        table: col.table.clone(),
                                        nullable: col.nullable,
                                    }
                                }
                                other => other.clone(),
                            })
                            .collect();
                        Arc::new(PlanNode::Project(Project {
                            input: new_input,
                            items,
                        }))
                    }
                    None => node,
                }
            }
            _ => node,
        });

        Ok(if Arc::ptr_eq(&result, &plan) {
            Transformed::No(result)
        } else {
            Transformed::Yes(result)
        })
    }
}

fn has_alias(items: &[Expr]) -> bool {
    items.iter().any(|e| matches!(e, Expr::Alias { .. }))
}

fn alias_list(items: &[Expr]) -> Vec<(String, Expr)> {
    items
        .iter()
        .filter_map(|e| match e {
            Expr::Alias { expr, alias } => Some((alias.clone(), expr.as_ref().clone())),
            _ => None,
        })
        .collect()
}

/// Walks a chain of `Filter`/`Sort` wrappers looking for the first one that
/// references one of `aliases` by bare name, splicing an inner `Project`
/// immediately beneath it. Returns the rebuilt subtree and the positions the
/// spliced aliases ended up at (in the rebuilt subtree's schema), so the
/// caller can rewrite the outer `Project`'s own alias items into plain
/// column references.
fn splice(
    node: &Arc<PlanNode>,
    aliases: &[(String, Expr)],
) -> Option<(Arc<PlanNode>, std::collections::HashMap<String, (usize, ColumnSchema)>)> {
    match node.as_ref() {
        PlanNode::Filter(f) => {
            let refs = referenced(std::slice::from_ref(&f.predicate), aliases);
            if !refs.is_empty() {
                let (inner_input, positions) = materialize(&f.input, &refs);
                let predicate = reposition(f.predicate.clone(), &positions);
                return Some((
                    Arc::new(PlanNode::Filter(Filter {
                        input: inner_input,
                        predicate,
                    })),
                    positions,
                ));
            }
            splice(&f.input, aliases).map(|(new_input, positions)| {
                (
                    Arc::new(PlanNode::Filter(Filter {
                        input: new_input,
                        predicate: f.predicate.clone(),
                    })),
                    positions,
                )
            })
        }
        PlanNode::Sort(s) => {
            let exprs: Vec<Expr> = s.fields.iter().map(|field| field.expr.clone()).collect();
            let refs = referenced(&exprs, aliases);
            if !refs.is_empty() {
                let (inner_input, positions) = materialize(&s.input, &refs);
                let fields = s
                    .fields
                    .iter()
                    .map(|field| SortField {
                        expr: reposition(field.expr.clone(), &positions),
                        direction: field.direction,
                    })
                    .collect();
                return Some((
                    Arc::new(PlanNode::Sort(Sort {
                        input: inner_input,
                        fields,
                    })),
                    positions,
                ));
            }
            splice(&s.input, aliases).map(|(new_input, positions)| {
                (
                    Arc::new(PlanNode::Sort(Sort {
                        input: new_input,
                        fields: s.fields.clone(),
                    })),
                    positions,
                )
            })
        }
        _ => None,
    }
}

/// Which of `aliases` appear, by bare name, as an `UnresolvedColumn` in any
/// of `exprs` — in `aliases`'s order.
fn referenced(exprs: &[Expr], aliases: &[(String, Expr)]) -> Vec<(String, Expr)> {
    use crate::expr::visitors::{walk_expr, ExpressionVisitor};

    #[derive(Default)]
    struct Collector {
        names: std::collections::HashSet<String>,
    }
    impl ExpressionVisitor for Collector {
        fn visit_unresolved_column(&mut self, name: &str) {
            self.names.insert(name.to_string());
        }
    }

    let mut collector = Collector::default();
    for expr in exprs {
        walk_expr(expr, &mut collector);
    }

    aliases
        .iter()
        .filter(|(name, _)| collector.names.contains(name))
        .cloned()
        .collect()
}

/// Builds the inner `Project`: every column of `input`'s schema passed
/// through positionally, followed by one `Alias` item per entry in `refs`.
fn materialize(
    input: &Arc<PlanNode>,
    refs: &[(String, Expr)],
) -> (
    Arc<PlanNode>,
    std::collections::HashMap<String, (usize, ColumnSchema)>,
) {
    let schema = input.schema();
    let mut items: Vec<Expr> = schema
        .iter()
        .enumerate()
        .map(|(i, col)| Expr::GetFieldWithTable {
            index: i,
            data_type: col.data_type,
            name: col.name.clone(),
            table: col.table.clone(),
            nullable: col.nullable,
        })
        .collect();

    let mut positions = std::collections::HashMap::new();
    for (name, expr) in refs {
        let index = items.len();
        let aliased = Expr::Alias {
            expr: Box::new(expr.clone()),
            alias: name.clone(),
        };
        let col = expr_output_column(&aliased);
        positions.insert(name.clone(), (index, col));
        items.push(aliased);
    }

    (
        Arc::new(PlanNode::Project(Project {
            input: input.clone(),
            items,
        })),
        positions,
    )
}

fn reposition(
    expr: Expr,
    positions: &std::collections::HashMap<String, (usize, ColumnSchema)>,
) -> Expr {
    transform_expr_up(expr, &mut |e| match e {
        Expr::UnresolvedColumn { name } => match positions.get(&name) {
            Some((index, col)) => Expr::GetFieldWithTable {
                index: *index,
                data_type: col.data_type,
                name: col.name.clone(),
                table: col.table.clone(),
                nullable: col.nullable,
            },
            None => Expr::UnresolvedColumn { name },
        },
        other => other,
    })
}
