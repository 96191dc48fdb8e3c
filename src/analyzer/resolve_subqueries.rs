//! Resolves derived-table relations: recursively runs the whole analyzer
//! pipeline over a `SubqueryAlias`'s inner plan, then caches its
//! alias-tagged output schema (spec §4.x, "subqueries").

use std::sync::Arc;

use crate::plan::{PlanNode, SubqueryAlias};
use crate::transform::transform_up;

use super::errors::AnalyzerError;
use super::rule::{Rule, RuleContext};
use super::transformed::Transformed;

pub struct ResolveSubqueries;

impl Rule for ResolveSubqueries {
    fn name(&self) -> &'static str {
        "resolve_subqueries"
    }

    fn apply(
        &self,
        rc: &RuleContext,
        plan: Arc<PlanNode>,
    ) -> Result<Transformed<Arc<PlanNode>>, AnalyzerError> {
        let mut error = None;
        let result = transform_up(&plan, &mut |node| {
            if error.is_some() {
                return node;
            }
            match node.as_ref() {
                PlanNode::SubqueryAlias(alias) if !alias.input.resolved() => {
                    log::debug!("resolving subquery aliased as '{}'", alias.alias);
                    match (rc.analyze_subplan)(alias.input.clone()) {
                        Ok(resolved_input) => Arc::new(cache_schema(alias.alias.clone(), resolved_input)),
                        Err(e) => {
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

fn cache_schema(alias: String, input: Arc<PlanNode>) -> PlanNode {
    let uncached = PlanNode::SubqueryAlias(SubqueryAlias {
        alias: alias.clone(),
        input: input.clone(),
        cached_schema: None,
    });
    let schema = uncached.schema();
    PlanNode::SubqueryAlias(SubqueryAlias {
        alias,
        input,
        cached_schema: Some(schema),
    })
}
