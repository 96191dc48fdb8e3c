//! Attaches a table qualifier to every bare `UnresolvedColumn` reachable from
//! a node whose input schema is resolved, and validates the qualifier on any
//! column that already carries one (spec §4.8, "qualify_columns").
//!
//! A bare name resolves only if exactly one table in the owning node's input
//! schema defines it; zero matches leaves the column untouched for a later
//! rule (or a later pass, once some other rewrite brings the defining table
//! into scope), and more than one match is ambiguous and fails outright.

use std::sync::Arc;

use crate::expr::visitors::transform_expr_up;
use crate::expr::Expr;
use crate::plan::PlanNode;
use crate::schema::Schema;
use crate::transform::transform_up;

use super::errors::AnalyzerError;
use super::rule::{Rule, RuleContext};
use super::transformed::Transformed;

pub struct QualifyColumns;

impl Rule for QualifyColumns {
    fn name(&self) -> &'static str {
        "qualify_columns"
    }

    fn apply(
        &self,
        _rc: &RuleContext,
        plan: Arc<PlanNode>,
    ) -> Result<Transformed<Arc<PlanNode>>, AnalyzerError> {
        let mut error = None;
        let result = transform_up(&plan, &mut |node| {
            if error.is_some() {
                return node;
            }
            match qualify_node(node.as_ref()) {
                Some(Ok(rewritten)) => Arc::new(rewritten),
                Some(Err(e)) => {
                    error = Some(e);
                    node
                }
                None => node,
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

/// Qualifies every expression a node directly carries against that node's
/// own input schema. Returns `None` for node variants with no expressions of
/// their own, or whose input isn't resolved yet (the defining schema isn't
/// known, so qualification must wait for a later pass).
fn qualify_node(node: &PlanNode) -> Option<Result<PlanNode, AnalyzerError>> {
    use crate::plan::{Filter, GroupBy, InnerJoin, Project, Sort};

    match node {
        PlanNode::Project(p) if p.input.resolved() => {
            let schema = p.input.schema();
            Some(qualify_all(&p.items, &schema).map(|items| {
                PlanNode::Project(Project {
                    input: p.input.clone(),
                    items,
                })
            }))
        }
        PlanNode::Filter(filt) if filt.input.resolved() => {
            let schema = filt.input.schema();
            Some(
                qualify(filt.predicate.clone(), &schema).map(|predicate| {
                    PlanNode::Filter(Filter {
                        input: filt.input.clone(),
                        predicate,
                    })
                }),
            )
        }
        PlanNode::Sort(sort) if sort.input.resolved() => {
            let schema = sort.input.schema();
            Some(
                sort.fields
                    .iter()
                    .cloned()
                    .map(|mut field| {
                        qualify(field.expr, &schema).map(|expr| {
                            field.expr = expr;
                            field
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(|fields| {
                        PlanNode::Sort(Sort {
                            input: sort.input.clone(),
                            fields,
                        })
                    }),
            )
        }
        PlanNode::GroupBy(g) if g.input.resolved() => {
            let schema = g.input.schema();
            Some(
                qualify_all(&g.group_exprs, &schema).and_then(|group_exprs| {
                    qualify_all(&g.agg_exprs, &schema).map(|agg_exprs| {
                        PlanNode::GroupBy(GroupBy {
                            input: g.input.clone(),
                            group_exprs,
                            agg_exprs,
                        })
                    })
                }),
            )
        }
        PlanNode::InnerJoin(j) if j.left.resolved() && j.right.resolved() => {
            let schema = Schema::concat(&j.left.schema(), &j.right.schema());
            Some(
                qualify(j.predicate.clone(), &schema).map(|predicate| {
                    PlanNode::InnerJoin(InnerJoin {
                        left: j.left.clone(),
                        right: j.right.clone(),
                        predicate,
                    })
                }),
            )
        }
        _ => None,
    }
}

fn qualify_all(items: &[Expr], schema: &Schema) -> Result<Vec<Expr>, AnalyzerError> {
    items.iter().cloned().map(|e| qualify(e, schema)).collect()
}

/// Qualifies a single expression tree's unresolved columns against `schema`,
/// the direct input schema of the node that owns the expression.
fn qualify(expr: Expr, schema: &Schema) -> Result<Expr, AnalyzerError> {
    let mut error = None;
    let qualified = transform_expr_up(expr, &mut |e| {
        if error.is_some() {
            return e;
        }
        match e {
            Expr::UnresolvedColumn { name } => {
                let owners = schema.tables_defining(&name);
                match owners.len() {
                    0 => Expr::UnresolvedColumn { name },
                    1 => Expr::UnresolvedQualifiedColumn {
                        table: owners[0].to_string(),
                        name,
                    },
                    _ => {
                        error = Some(AnalyzerError::ErrAmbiguousColumnName {
                            name: name.clone(),
                            tables: owners.into_iter().map(str::to_string).collect(),
                        });
                        Expr::UnresolvedColumn { name }
                    }
                }
            }
            Expr::UnresolvedQualifiedColumn { table, name } => {
                if schema.has_table(&table) {
                    Expr::UnresolvedQualifiedColumn { table, name }
                } else {
                    error = Some(AnalyzerError::ErrTableNotFound(table.clone()));
                    Expr::UnresolvedQualifiedColumn { table, name }
                }
            }
            other => other,
        }
    });

    match error {
        Some(e) => Err(e),
        None => Ok(qualified),
    }
}
