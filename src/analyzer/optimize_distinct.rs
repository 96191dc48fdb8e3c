//! `Distinct(Sort(...))` becomes `OrderedDistinct(Sort(...))` (spec §4.13,
//! "optimize_distinct"): a distinct operator whose input is already sorted
//! on every output column may assume that ordering instead of building its
//! own dedup set. `Distinct` over any other child shape is left alone.

use std::sync::Arc;

use crate::plan::{OrderedDistinct, PlanNode};
use crate::transform::transform_up;

use super::errors::AnalyzerError;
use super::rule::{Rule, RuleContext};
use super::transformed::Transformed;

pub struct OptimizeDistinct;

impl Rule for OptimizeDistinct {
    fn name(&self) -> &'static str {
        "optimize_distinct"
    }

    fn apply(
        &self,
        _rc: &RuleContext,
        plan: Arc<PlanNode>,
    ) -> Result<Transformed<Arc<PlanNode>>, AnalyzerError> {
        let result = transform_up(&plan, &mut |node| match node.as_ref() {
            PlanNode::Distinct(d) if matches!(d.input.as_ref(), PlanNode::Sort(_)) => {
                log::debug!("distinct over a sorted input; assuming its ordering");
                Arc::new(PlanNode::OrderedDistinct(OrderedDistinct {
                    input: d.input.clone(),
                }))
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
