//! Rewrites `ORDER BY <n>` integer-literal positions into an
//! `UnresolvedColumn` naming the n-th output column of the `Sort`'s input
//! (spec §4.6, "resolve_orderby_literals"); `qualify_columns`/
//! `resolve_columns` bind it to a concrete `GetFieldWithTable` on a later
//! pass, the same two-step path every other bare column reference takes.

use std::sync::Arc;

use crate::expr::{Expr, LiteralValue};
use crate::plan::{PlanNode, Sort, SortField};
use crate::transform::transform_up;

use super::errors::AnalyzerError;
use super::rule::{Rule, RuleContext};
use super::transformed::Transformed;

pub struct ResolveOrderByLiterals;

impl Rule for ResolveOrderByLiterals {
    fn name(&self) -> &'static str {
        "resolve_orderby_literals"
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
            let sort = match node.as_ref() {
                PlanNode::Sort(s) if s.input.resolved() => s,
                _ => return node,
            };

            let schema = sort.input.schema();
            let mut changed = false;
            let mut fields = Vec::with_capacity(sort.fields.len());

            for field in &sort.fields {
                match &field.expr {
                    Expr::Literal(LiteralValue::Int64(n)) => {
                        let n = *n;
                        if n < 1 || n as usize > schema.len() {
                            error = Some(AnalyzerError::ErrOrderByColumnIndex {
                                index: n,
                                len: schema.len(),
                            });
                            fields.push(field.clone());
                            continue;
                        }
                        let idx = (n - 1) as usize;
                        let col = schema.get(idx).expect("index checked above");
                        changed = true;
                        fields.push(SortField {
                            expr: Expr::UnresolvedColumn {
                                name: col.name.clone(),
                            },
                            direction: field.direction,
                        });
                    }
                    _ => fields.push(field.clone()),
                }
            }

            if error.is_some() {
                return node;
            }
            if changed {
                Arc::new(PlanNode::Sort(Sort {
                    input: sort.input.clone(),
                    fields,
                }))
            } else {
                node
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
