//! Predicate combinators.
//!
//! Small helpers for combining filter conjuncts with AND/OR, and for
//! splitting a predicate back into its top-level AND conjuncts. Used by
//! `pushdown` (conjunct splitting) and `assign_indexes` (AND/OR recursion).

use super::{BooleanKind, Expr};

/// Combines predicates with AND.
///
/// - Empty → `None`
/// - One → that predicate, unwrapped
/// - Many → left-deep `AND` chain
pub fn and(predicates: Vec<Expr>) -> Option<Expr> {
    combine(predicates, BooleanKind::And)
}

/// Combines predicates with OR. Same shape as [`and`].
pub fn or(predicates: Vec<Expr>) -> Option<Expr> {
    combine(predicates, BooleanKind::Or)
}

fn combine(mut predicates: Vec<Expr>, kind: BooleanKind) -> Option<Expr> {
    match predicates.len() {
        0 => None,
        1 => predicates.pop(),
        _ => Some(Expr::Boolean {
            kind,
            children: predicates,
        }),
    }
}

/// Splits a predicate into its top-level AND conjuncts. `a AND (b AND c)`
/// and `(a AND b) AND c` both split into `[a, b, c]`; an `OR` or any other
/// operator is returned as a single conjunct.
pub fn split_conjuncts(expr: &Expr) -> Vec<Expr> {
    let mut conjuncts = Vec::new();
    split_conjuncts_into(expr, &mut conjuncts);
    conjuncts
}

fn split_conjuncts_into(expr: &Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::Boolean {
            kind: BooleanKind::And,
            children,
        } => {
            for child in children {
                split_conjuncts_into(child, out);
            }
        }
        other => out.push(other.clone()),
    }
}
