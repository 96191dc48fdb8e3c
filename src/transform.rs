//! Generic bottom-up plan and expression rewriting.
//!
//! Every rule is written against these two functions instead of hand-rolling
//! its own recursion, so node-identity sharing (§4.2: "if a rule's closure
//! returns its input unchanged, the original `Arc` is kept, not a clone") is
//! enforced in one place rather than by convention in each rule.

use std::sync::Arc;

use crate::expr::visitors::transform_expr_up;
use crate::expr::Expr;
use crate::plan::PlanNode;

/// Rewrites `plan` bottom-up: children are transformed first, the node is
/// rebuilt from its (possibly rewritten) children via
/// [`PlanNode::with_children`], then `f` is applied to that rebuilt node.
///
/// If neither the children nor `f` changed anything, the original `Arc` is
/// returned rather than a structurally-equal clone, so callers can use
/// `Arc::ptr_eq` as a cheap "did this rule do anything" check in addition to
/// the driver's `PartialEq` fixed-point test.
pub fn transform_up<F>(plan: &Arc<PlanNode>, f: &mut F) -> Arc<PlanNode>
where
    F: FnMut(Arc<PlanNode>) -> Arc<PlanNode>,
{
    let children = plan.children();
    let mut children_changed = false;
    let new_children: Vec<Arc<PlanNode>> = children
        .iter()
        .map(|child| {
            let rewritten = transform_up(child, f);
            if !Arc::ptr_eq(&rewritten, child) {
                children_changed = true;
            }
            rewritten
        })
        .collect();

    let rebuilt = if children_changed {
        Arc::new(plan.with_children(new_children))
    } else {
        plan.clone()
    };

    let transformed = f(rebuilt.clone());
    if Arc::ptr_eq(&transformed, &rebuilt) {
        rebuilt
    } else {
        transformed
    }
}

/// Applies `f` to every expression directly carried by every node in
/// `plan`, bottom-up both across the plan tree and within each expression
/// tree. Used by rules (`qualify_columns`, `resolve_columns`, ...) that
/// rewrite expressions uniformly without caring which plan node variant
/// carries them.
pub fn transform_expressions_up<F>(plan: &Arc<PlanNode>, f: &mut F) -> Arc<PlanNode>
where
    F: FnMut(Expr) -> Expr,
{
    transform_up(plan, &mut |node| {
        let rewritten = match node.as_ref().clone() {
            PlanNode::Project(mut p) => {
                p.items = p
                    .items
                    .into_iter()
                    .map(|e| transform_expr_up(e, f))
                    .collect();
                PlanNode::Project(p)
            }
            PlanNode::Filter(mut filt) => {
                filt.predicate = transform_expr_up(filt.predicate, f);
                PlanNode::Filter(filt)
            }
            PlanNode::Sort(mut sort) => {
                sort.fields = sort
                    .fields
                    .into_iter()
                    .map(|mut field| {
                        field.expr = transform_expr_up(field.expr, f);
                        field
                    })
                    .collect();
                PlanNode::Sort(sort)
            }
            PlanNode::GroupBy(mut group_by) => {
                group_by.group_exprs = group_by
                    .group_exprs
                    .into_iter()
                    .map(|e| transform_expr_up(e, f))
                    .collect();
                group_by.agg_exprs = group_by
                    .agg_exprs
                    .into_iter()
                    .map(|e| transform_expr_up(e, f))
                    .collect();
                PlanNode::GroupBy(group_by)
            }
            PlanNode::InnerJoin(mut join) => {
                join.predicate = transform_expr_up(join.predicate, f);
                PlanNode::InnerJoin(join)
            }
            other => other,
        };

        if rewritten == *node {
            node
        } else {
            Arc::new(rewritten)
        }
    })
}
