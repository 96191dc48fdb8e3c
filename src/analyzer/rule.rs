//! The `Rule` trait every analyzer pass implements, and the context handed
//! to each invocation.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::context::Context;
use crate::plan::PlanNode;

use super::errors::AnalyzerError;
use super::transformed::Transformed;

/// Everything a rule needs besides the plan it's rewriting.
///
/// `analyze_subplan` lets `resolve_subqueries` recursively run the *whole*
/// pipeline over a subquery's inner plan without reconstructing an
/// `Analyzer` from a bare `&dyn Catalog` reference.
pub struct RuleContext<'a> {
    pub ctx: &'a Context,
    /// Owned (not borrowed) so rules that attach release guards to a plan
    /// node (`assign_indexes`) can close over it in a `'static` callback
    /// that outlives this invocation — see `catalog::release::ReleaseGuard`.
    pub catalog: Arc<dyn Catalog>,
    pub current_database: &'a str,
    pub analyze_subplan: &'a dyn Fn(Arc<PlanNode>) -> Result<Arc<PlanNode>, AnalyzerError>,
}

/// One pass of the rule pipeline (spec §4.1). Implementations are expected
/// to use [`crate::transform::transform_up`] (or
/// [`crate::transform::transform_expressions_up`]) rather than hand-rolled
/// recursion, so node-identity sharing stays consistent across rules.
pub trait Rule: Send + Sync {
    /// Short, stable name used in trace logging (`log::debug!("running rule
    /// {}", rule.name())`).
    fn name(&self) -> &'static str;

    fn apply(
        &self,
        rc: &RuleContext,
        plan: Arc<PlanNode>,
    ) -> Result<Transformed<Arc<PlanNode>>, AnalyzerError>;
}
