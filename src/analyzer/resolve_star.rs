//! Expands `Star`/`QualifiedStar` in projection and group-by lists into the
//! concrete columns of the owning node's input schema (spec §4.x,
//! "resolve_star").

use std::sync::Arc;

use crate::expr::Expr;
use crate::plan::{GroupBy, PlanNode, Project};
use crate::schema::Schema;
use crate::transform::transform_up;

use super::errors::AnalyzerError;
use super::rule::{Rule, RuleContext};
use super::transformed::Transformed;

pub struct ResolveStar;

impl Rule for ResolveStar {
    fn name(&self) -> &'static str {
        "resolve_star"
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
            match node.as_ref() {
                PlanNode::Project(p) if p.input.resolved() && has_star(&p.items) => {
                    let schema = p.input.schema();
                    match expand_list(&p.items, &schema) {
                        Ok(items) => Arc::new(PlanNode::Project(Project {
                            input: p.input.clone(),
                            items,
                        })),
                        Err(e) => {
                            error = Some(e);
                            node
                        }
                    }
                }
                PlanNode::GroupBy(g)
                    if g.input.resolved()
                        && (has_star(&g.group_exprs) || has_star(&g.agg_exprs)) =>
                {
                    let schema = g.input.schema();
                    match (
                        expand_list(&g.group_exprs, &schema),
                        expand_list(&g.agg_exprs, &schema),
                    ) {
                        (Ok(group_exprs), Ok(agg_exprs)) => Arc::new(PlanNode::GroupBy(GroupBy {
                            input: g.input.clone(),
                            group_exprs,
                            agg_exprs,
                        })),
                        (Err(e), _) | (_, Err(e)) => {
                            error = Some(e);
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

fn has_star(items: &[Expr]) -> bool {
    items
        .iter()
        .any(|e| matches!(e, Expr::Star | Expr::QualifiedStar { .. }))
}

fn expand_list(items: &[Expr], schema: &Schema) -> Result<Vec<Expr>, AnalyzerError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Expr::Star => {
                for (i, col) in schema.iter().enumerate() {
                    out.push(Expr::GetFieldWithTable {
                        index: i,
                        data_type: col.data_type,
                        name: col.name.clone(),
                        table: col.table.clone(),
                        nullable: col.nullable,
                    });
                }
            }
            Expr::QualifiedStar { table } => {
                if !schema.has_table(table) {
                    return Err(AnalyzerError::ErrTableNotFound(table.clone()));
                }
                for (i, col) in schema.iter().enumerate() {
                    if &col.table == table {
                        out.push(Expr::GetFieldWithTable {
                            index: i,
                            data_type: col.data_type,
                            name: col.name.clone(),
                            table: col.table.clone(),
                            nullable: col.nullable,
                        });
                    }
                }
            }
            other => out.push(other.clone()),
        }
    }
    Ok(out)
}
