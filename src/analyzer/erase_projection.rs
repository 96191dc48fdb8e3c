//! Removes a `Project` whose output is identical to its child's schema and
//! whose every item is a positional pass-through reference to that same
//! position (spec §4.12, "erase_projection"). Such a Project contributes
//! nothing; later rules (and an eventual executor) see straight through to
//! the child.

use std::sync::Arc;

use crate::expr::Expr;
use crate::plan::{expr_output_column, PlanNode};
use crate::schema::Schema;
use crate::transform::transform_up;

use super::errors::AnalyzerError;
use super::rule::{Rule, RuleContext};
use super::transformed::Transformed;

pub struct EraseProjection;

impl Rule for EraseProjection {
    fn name(&self) -> &'static str {
        "erase_projection"
    }

    fn apply(
        &self,
        _rc: &RuleContext,
        plan: Arc<PlanNode>,
    ) -> Result<Transformed<Arc<PlanNode>>, AnalyzerError> {
        let result = transform_up(&plan, &mut |node| match node.as_ref() {
            PlanNode::Project(p) if p.input.resolved() && is_identity(&p.items, &p.input.schema()) => {
                log::debug!("erasing pass-through projection");
                p.input.clone()
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

fn is_identity(items: &[Expr], schema: &Schema) -> bool {
    if items.len() != schema.len() {
        return false;
    }
    items.iter().enumerate().all(|(i, item)| {
        let index_matches = match item {
            Expr::GetField { index, .. } => *index == i,
            Expr::GetFieldWithTable { index, .. } => *index == i,
            _ => false,
        };
        index_matches && Some(&expr_output_column(item)) == schema.get(i)
    })
}
