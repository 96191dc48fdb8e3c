//! Binds `UnresolvedQualifiedColumn { table, name }` to a concrete
//! `GetFieldWithTable` by position in the owning node's input schema (spec
//! §4.9, "resolve_columns"). Runs after `qualify_columns` has attached a
//! table to every bare reference it could; any bare `UnresolvedColumn` still
//! standing here means no table in scope defines it.

use std::sync::Arc;

use crate::expr::Expr;
use crate::plan::{Filter, GroupBy, InnerJoin, PlanNode, Project, Sort};
use crate::schema::Schema;
use crate::transform::transform_up;

use super::errors::AnalyzerError;
use super::rule::{Rule, RuleContext};
use super::transformed::Transformed;

pub struct ResolveColumns;

impl Rule for ResolveColumns {
    fn name(&self) -> &'static str {
        "resolve_columns"
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
            match resolve_node(node.as_ref()) {
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

fn resolve_node(node: &PlanNode) -> Option<Result<PlanNode, AnalyzerError>> {
    match node {
        PlanNode::Project(p) if p.input.resolved() => {
            let schema = p.input.schema();
            Some(resolve_all(&p.items, &schema).map(|items| {
                PlanNode::Project(Project {
                    input: p.input.clone(),
                    items,
                })
            }))
        }
        PlanNode::Filter(filt) if filt.input.resolved() => {
            let schema = filt.input.schema();
            Some(resolve(filt.predicate.clone(), &schema).map(|predicate| {
                PlanNode::Filter(Filter {
                    input: filt.input.clone(),
                    predicate,
                })
            }))
        }
        PlanNode::Sort(sort) if sort.input.resolved() => {
            let schema = sort.input.schema();
            Some(
                sort.fields
                    .iter()
                    .cloned()
                    .map(|mut field| {
                        resolve(field.expr, &schema).map(|expr| {
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
                resolve_all(&g.group_exprs, &schema).and_then(|group_exprs| {
                    resolve_all(&g.agg_exprs, &schema).map(|agg_exprs| {
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
            Some(resolve(j.predicate.clone(), &schema).map(|predicate| {
                PlanNode::InnerJoin(InnerJoin {
                    left: j.left.clone(),
                    right: j.right.clone(),
                    predicate,
                })
            }))
        }
        _ => None,
    }
}

fn resolve_all(items: &[Expr], schema: &Schema) -> Result<Vec<Expr>, AnalyzerError> {
    items.iter().cloned().map(|e| resolve(e, schema)).collect()
}

fn resolve(expr: Expr, schema: &Schema) -> Result<Expr, AnalyzerError> {
    use crate::expr::visitors::transform_expr_up;

    let mut error = None;
    let resolved = transform_expr_up(expr, &mut |e| {
        if error.is_some() {
            return e;
        }
        match e {
            Expr::UnresolvedQualifiedColumn { table, name } => match schema.find(&table, &name) {
                Some((index, col)) => Expr::GetFieldWithTable {
                    index,
                    data_type: col.data_type,
                    name: col.name.clone(),
                    table: col.table.clone(),
                    nullable: col.nullable,
                },
                None => {
                    error = Some(AnalyzerError::ErrColumnNotFound {
                        table: table.clone(),
                        name: name.clone(),
                    });
                    Expr::UnresolvedQualifiedColumn { table, name }
                }
            },
            other => other,
        }
    });

    match error {
        Some(e) => Err(e),
        None => Ok(resolved),
    }
}
