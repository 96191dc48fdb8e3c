//! Expands `NaturalJoin(left, right)` into `Project(cols, InnerJoin(left,
//! right, predicate))` over the columns left and right share by name (spec
//! §4.5). A natural join with no common columns degrades to a `CrossJoin`.

use std::sync::Arc;

use crate::expr::combinators::and;
use crate::expr::Expr;
use crate::plan::{CrossJoin, InnerJoin, NaturalJoin, PlanNode, Project};
use crate::transform::transform_up;

use super::errors::AnalyzerError;
use super::rule::{Rule, RuleContext};
use super::transformed::Transformed;

pub struct ResolveNaturalJoins;

impl Rule for ResolveNaturalJoins {
    fn name(&self) -> &'static str {
        "resolve_natural_joins"
    }

    fn apply(
        &self,
        _rc: &RuleContext,
        plan: Arc<PlanNode>,
    ) -> Result<Transformed<Arc<PlanNode>>, AnalyzerError> {
        let result = transform_up(&plan, &mut |node| match node.as_ref() {
            PlanNode::NaturalJoin(j) if j.left.resolved() && j.right.resolved() => {
                Arc::new(expand(j))
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

fn expand(j: &NaturalJoin) -> PlanNode {
    let left_schema = j.left.schema();
    let right_schema = j.right.schema();

    let common_names: Vec<String> = left_schema
        .iter()
        .filter(|c| right_schema.iter().any(|r| r.name == c.name))
        .map(|c| c.name.clone())
        .collect();

    if common_names.is_empty() {
        log::debug!("natural join has no common columns; degrading to a cross join");
        return PlanNode::CrossJoin(CrossJoin {
            left: j.left.clone(),
            right: j.right.clone(),
        });
    }

    let mut equalities = Vec::with_capacity(common_names.len());
    let mut items = Vec::new();

    for name in &common_names {
        let (li, lcol) = left_schema
            .iter()
            .enumerate()
            .find(|(_, c)| &c.name == name)
            .unwrap();
        let (ri, rcol) = right_schema
            .iter()
            .enumerate()
            .find(|(_, c)| &c.name == name)
            .unwrap();

        equalities.push(
            Expr::GetFieldWithTable {
                index: li,
                data_type: lcol.data_type,
                name: lcol.name.clone(),
                table: lcol.table.clone(),
                nullable: lcol.nullable,
            }
            .eq(Expr::GetFieldWithTable {
                index: left_schema.len() + ri,
                data_type: rcol.data_type,
                name: rcol.name.clone(),
                table: rcol.table.clone(),
                nullable: rcol.nullable,
            }),
        );

        items.push(Expr::GetFieldWithTable {
            index: li,
            data_type: lcol.data_type,
            name: lcol.name.clone(),
            table: lcol.table.clone(),
            nullable: lcol.nullable,
        });
    }

    for (i, col) in left_schema.iter().enumerate() {
        if !common_names.contains(&col.name) {
            items.push(Expr::GetFieldWithTable {
                index: i,
                data_type: col.data_type,
                name: col.name.clone(),
                table: col.table.clone(),
                nullable: col.nullable,
            });
        }
    }

    for (i, col) in right_schema.iter().enumerate() {
        if !common_names.contains(&col.name) {
            items.push(Expr::GetFieldWithTable {
                index: left_schema.len() + i,
                data_type: col.data_type,
                name: col.name.clone(),
                table: col.table.clone(),
                nullable: col.nullable,
            });
        }
    }

    let predicate = and(equalities).expect("at least one common column checked above");

    PlanNode::Project(Project {
        input: Arc::new(PlanNode::InnerJoin(InnerJoin {
            left: j.left.clone(),
            right: j.right.clone(),
            predicate,
        })),
        items,
    })
}
