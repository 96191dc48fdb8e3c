//! Binds `UnresolvedFunctionCall { name, args }` to a catalog-registered
//! `FunctionCall` (spec §4.10, "resolve_functions"). Evaluation semantics are
//! out of scope here; this rule confirms the name exists and its registered
//! arity matches the call site, then carries the call forward with its
//! arguments otherwise untouched. Per-argument type checking is not
//! performed: nothing else in this crate infers an expression's value type,
//! so there's no type system here to check against.

use std::sync::Arc;

use crate::expr::Expr;
use crate::plan::PlanNode;
use crate::transform::transform_expressions_up;

use super::errors::AnalyzerError;
use super::rule::{Rule, RuleContext};
use super::transformed::Transformed;

pub struct ResolveFunctions;

impl Rule for ResolveFunctions {
    fn name(&self) -> &'static str {
        "resolve_functions"
    }

    fn apply(
        &self,
        rc: &RuleContext,
        plan: Arc<PlanNode>,
    ) -> Result<Transformed<Arc<PlanNode>>, AnalyzerError> {
        let mut error = None;
        let result = transform_expressions_up(&plan, &mut |expr| {
            if error.is_some() {
                return expr;
            }
            match expr {
                Expr::UnresolvedFunctionCall { name, args } => {
                    match rc.catalog.function(&name) {
                        Ok(sig) if sig.arity == args.len() => Expr::FunctionCall { name, args },
                        Ok(sig) => {
                            error = Some(AnalyzerError::ErrFunctionArity {
                                name: name.clone(),
                                expected: sig.arity,
                                actual: args.len(),
                            });
                            Expr::UnresolvedFunctionCall { name, args }
                        }
                        Err(_) => {
                            error = Some(AnalyzerError::ErrFunctionNotFound(name.clone()));
                            Expr::UnresolvedFunctionCall { name, args }
                        }
                    }
                }
                other => other,
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
