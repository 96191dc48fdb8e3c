//! The rule pipeline driver (spec §4.1, §6): runs an ordered list of
//! [`Rule`]s over a logical plan to a fixed point.
//!
//! Each full pass runs every rule once, in order, feeding each rule's output
//! to the next. After a pass, the resulting plan is compared (by
//! `PartialEq`) against the plan the pass started from; if they're equal,
//! analysis is done. Cancellation is checked once per pass, never mid-rule,
//! matching the teacher's own "check between, not during, unit work" pattern
//! in its scheduler loop.

pub mod assign_indexes;
pub mod errors;
pub mod erase_projection;
pub mod index_combination;
pub mod join_tree;
pub mod optimize_distinct;
pub mod pushdown;
pub mod qualify_columns;
pub mod reorder_projection;
pub mod resolve_columns;
pub mod resolve_functions;
pub mod resolve_natural_joins;
pub mod resolve_orderby_literals;
pub mod resolve_star;
pub mod resolve_subqueries;
pub mod resolve_tables;
pub mod rule;
pub mod transformed;

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::AnalyzerConfig;
use crate::context::Context;
use crate::plan::PlanNode;

pub use errors::AnalyzerError;
pub use rule::{Rule, RuleContext};
pub use transformed::Transformed;

use assign_indexes::AssignIndexes;
use erase_projection::EraseProjection;
use optimize_distinct::OptimizeDistinct;
use pushdown::Pushdown;
use qualify_columns::QualifyColumns;
use reorder_projection::ReorderProjection;
use resolve_columns::ResolveColumns;
use resolve_functions::ResolveFunctions;
use resolve_natural_joins::ResolveNaturalJoins;
use resolve_orderby_literals::ResolveOrderByLiterals;
use resolve_star::ResolveStar;
use resolve_subqueries::ResolveSubqueries;
use resolve_tables::ResolveTables;

/// The ordered rule pipeline run by every `Analyzer::analyze` pass, matching
/// the dependency order laid out in spec §4: tables and subqueries first (so
/// later rules see real schemas), then name resolution, then the shape
/// rewrites (`reorder_projection`/`erase_projection`/`optimize_distinct`),
/// then the pushdown/index rules that need a fully resolved plan to match
/// against.
fn default_rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(ResolveSubqueries),
        Arc::new(ResolveTables),
        Arc::new(ResolveNaturalJoins),
        Arc::new(ResolveOrderByLiterals),
        Arc::new(ResolveStar),
        Arc::new(QualifyColumns),
        Arc::new(ResolveColumns),
        Arc::new(ResolveFunctions),
        Arc::new(ReorderProjection),
        Arc::new(EraseProjection),
        Arc::new(OptimizeDistinct),
        Arc::new(Pushdown),
        Arc::new(AssignIndexes),
    ]
}

/// Runs the rule pipeline to a fixed point over a single logical plan.
///
/// An `Analyzer` is cheap to build and stateless between calls: all
/// per-query state (cancellation, current database) lives in the
/// [`Context`]/`current_database` arguments to [`Analyzer::analyze`], not on
/// `self`.
pub struct Analyzer {
    rules: Vec<Arc<dyn Rule>>,
    catalog: Arc<dyn Catalog>,
    max_iterations: usize,
}

impl Analyzer {
    /// Builds an `Analyzer` with `max_iterations` taken from
    /// [`AnalyzerConfig::from_env`] (falling back to its default if
    /// `PLANALYZER_MAX_ITERS` is unset or fails to parse, logging a warning
    /// in the latter case). Use [`Analyzer::from_config`] to handle a
    /// malformed environment variable as a hard error instead.
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        let config = AnalyzerConfig::from_env().unwrap_or_else(|e| {
            log::warn!("invalid analyzer config from environment, using defaults: {e}");
            AnalyzerConfig::default()
        });
        Analyzer::from_config(catalog, config)
    }

    /// Builds an `Analyzer` from an explicitly supplied [`AnalyzerConfig`],
    /// for callers that want to load (and validate) configuration themselves
    /// rather than defaulting past a bad environment variable.
    pub fn from_config(catalog: Arc<dyn Catalog>, config: AnalyzerConfig) -> Self {
        Analyzer {
            rules: default_rules(),
            catalog,
            max_iterations: config.max_iterations,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Substitutes the rule pipeline `analyze` runs, overriding
    /// [`default_rules`] — e.g. a test exercising a single rule (or a subset
    /// of the pipeline) in isolation, without the rest of the passes
    /// interfering (spec §6: "ordered list — overrideable for tests").
    pub fn with_rules(mut self, rules: Vec<Arc<dyn Rule>>) -> Self {
        self.rules = rules;
        self
    }

    /// The rule pipeline this `Analyzer` will run, in order.
    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    /// Runs every rule, in order, over `plan` repeatedly until a full pass
    /// leaves the plan unchanged, or `max_iterations` passes is reached
    /// without stabilizing (`ErrMaxAnalysisIters`).
    pub fn analyze(
        &self,
        ctx: &Context,
        plan: Arc<PlanNode>,
    ) -> Result<Arc<PlanNode>, AnalyzerError> {
        let mut current = plan;

        for iteration in 0..self.max_iterations {
            if ctx.is_cancelled() {
                return Err(AnalyzerError::Cancelled);
            }

            let before = current.clone();
            current = self.run_pass(ctx, current)?;

            if *current == *before {
                log::debug!("analysis reached a fixed point after {} pass(es)", iteration + 1);
                return Ok(current);
            }
        }

        Err(AnalyzerError::ErrMaxAnalysisIters)
    }

    fn run_pass(&self, ctx: &Context, plan: Arc<PlanNode>) -> Result<Arc<PlanNode>, AnalyzerError> {
        let analyze_subplan = |p: Arc<PlanNode>| self.analyze(ctx, p);
        let rc = RuleContext {
            ctx,
            catalog: self.catalog.clone(),
            current_database: ctx.current_database(),
            analyze_subplan: &analyze_subplan,
        };

        let mut current = plan;
        for rule in &self.rules {
            let transformed = rule.apply(&rc, current)?;
            if transformed.is_yes() {
                log::debug!("rule '{}' transformed the plan", rule.name());
            }
            current = transformed.get_plan();
        }
        Ok(current)
    }
}
