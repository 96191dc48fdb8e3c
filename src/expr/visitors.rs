//! Visitor pattern for [`Expr`] traversal.
//!
//! Centralizes the recursion so every rule that needs to walk an expression
//! tree (collecting column references, rewriting a sub-node, ...) shares one
//! traversal implementation instead of re-deriving it.

use super::Expr;

/// Implementors override only the `visit_*` methods they care about;
/// defaults do nothing. `walk_expr` performs the recursive descent.
pub trait ExpressionVisitor {
    fn visit_unresolved_column(&mut self, _name: &str) {}
    fn visit_unresolved_qualified_column(&mut self, _table: &str, _name: &str) {}
    fn visit_get_field(&mut self, _index: usize, _name: &str) {}
    fn visit_get_field_with_table(&mut self, _index: usize, _table: &str, _name: &str) {}
    fn visit_function_call(&mut self, _name: &str) {}
    fn visit_leaf(&mut self, _expr: &Expr) {}
}

/// Walks `expr` depth-first, calling the matching visitor method on each
/// node before descending into its children.
pub fn walk_expr<V: ExpressionVisitor>(expr: &Expr, visitor: &mut V) {
    match expr {
        Expr::UnresolvedColumn { name } => visitor.visit_unresolved_column(name),
        Expr::UnresolvedQualifiedColumn { table, name } => {
            visitor.visit_unresolved_qualified_column(table, name)
        }
        Expr::GetField { index, name, .. } => visitor.visit_get_field(*index, name),
        Expr::GetFieldWithTable {
            index, table, name, ..
        } => visitor.visit_get_field_with_table(*index, table, name),
        Expr::UnresolvedFunctionCall { name, args } | Expr::FunctionCall { name, args } => {
            visitor.visit_function_call(name);
            for arg in args {
                walk_expr(arg, visitor);
            }
        }
        other => {
            visitor.visit_leaf(other);
            for child in other.children() {
                walk_expr(child, visitor);
            }
        }
    }
}

/// Rewrites `expr` bottom-up: children are rewritten first, then `f` is
/// applied to the node with its rewritten children. `f` returning its input
/// unchanged (by value equality) is the caller's responsibility to detect if
/// identity-sharing matters; at the expression level we always rebuild,
/// since expression trees are small and cheap to reallocate compared to
/// plan trees (which `transform::transform_up` shares structurally instead).
pub fn transform_expr_up<F>(expr: Expr, f: &mut F) -> Expr
where
    F: FnMut(Expr) -> Expr,
{
    let rewritten = match expr {
        Expr::Alias { expr, alias } => Expr::Alias {
            expr: Box::new(transform_expr_up(*expr, f)),
            alias,
        },
        Expr::Comparison { kind, left, right } => Expr::Comparison {
            kind,
            left: Box::new(transform_expr_up(*left, f)),
            right: right.map(|r| Box::new(transform_expr_up(*r, f))),
        },
        Expr::Boolean { kind, children } => Expr::Boolean {
            kind,
            children: children
                .into_iter()
                .map(|c| transform_expr_up(c, f))
                .collect(),
        },
        Expr::In { left, list } => Expr::In {
            left: Box::new(transform_expr_up(*left, f)),
            list: Box::new(transform_expr_up(*list, f)),
        },
        Expr::Tuple(items) => {
            Expr::Tuple(items.into_iter().map(|i| transform_expr_up(i, f)).collect())
        }
        Expr::Arithmetic { kind, left, right } => Expr::Arithmetic {
            kind,
            left: Box::new(transform_expr_up(*left, f)),
            right: Box::new(transform_expr_up(*right, f)),
        },
        Expr::UnresolvedFunctionCall { name, args } => Expr::UnresolvedFunctionCall {
            name,
            args: args.into_iter().map(|a| transform_expr_up(a, f)).collect(),
        },
        Expr::FunctionCall { name, args } => Expr::FunctionCall {
            name,
            args: args.into_iter().map(|a| transform_expr_up(a, f)).collect(),
        },
        leaf => leaf,
    };
    f(rewritten)
}
