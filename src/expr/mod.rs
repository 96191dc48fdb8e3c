//! Scalar expression algebra.
//!
//! Expressions are the value-producing trees carried by plan nodes
//! (projection lists, filter predicates, sort keys, join conditions, ...).
//! Two forms of column reference coexist during analysis: unresolved ones
//! (`UnresolvedColumn`, `UnresolvedQualifiedColumn`), produced by the parser,
//! and resolved, positional ones (`GetField`), produced by `resolve_columns`.
//! A resolved plan must contain none of the unresolved variants.
//!
//! # Module organization
//!
//! - **mod.rs** (this file): type definitions and small helpers
//! - **combinators**: AND/OR predicate combinators used across rules
//! - **visitors**: visitor pattern for expression traversal

use serde::{Deserialize, Serialize};

use crate::schema::DataType;

pub mod combinators;
pub mod visitors;

/// Value carried by a [`Expr::Literal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Bool(bool),
    Null,
}

impl LiteralValue {
    pub fn data_type(&self) -> DataType {
        match self {
            LiteralValue::Int64(_) => DataType::Int64,
            LiteralValue::Float64(_) => DataType::Float64,
            LiteralValue::Utf8(_) => DataType::Utf8,
            LiteralValue::Bool(_) => DataType::Bool,
            LiteralValue::Null => DataType::Null,
        }
    }

    pub fn int(value: i64) -> Self {
        LiteralValue::Int64(value)
    }

    pub fn string(value: impl Into<String>) -> Self {
        LiteralValue::Utf8(value.into())
    }

    /// If this literal is an integer, its value. Used by
    /// `resolve_orderby_literals` to turn `ORDER BY 2` into a column ref.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            LiteralValue::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonKind {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    IsNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanKind {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticKind {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(LiteralValue),

    /// A bare, unqualified column reference as produced by the parser
    /// (e.g. `name` in `SELECT name FROM t`). Replaced by
    /// `UnresolvedQualifiedColumn` (if exactly one table defines it) or left
    /// alone by `qualify_columns`, then replaced by `GetField` by
    /// `resolve_columns`.
    UnresolvedColumn { name: String },

    /// A table-qualified column reference (e.g. `t.name`) not yet resolved
    /// to a positional index.
    UnresolvedQualifiedColumn { table: String, name: String },

    /// A resolved, positional reference into the schema of the owning plan
    /// node's direct child. `index` must stay consistent with that schema
    /// across every rewrite.
    GetField {
        index: usize,
        data_type: DataType,
        name: String,
        nullable: bool,
    },

    /// Same as `GetField` plus the originating table tag, used wherever a
    /// reference must still identify which side of a join it came from
    /// (e.g. natural-join expansion).
    GetFieldWithTable {
        index: usize,
        data_type: DataType,
        name: String,
        table: String,
        nullable: bool,
    },

    /// Unqualified `*`.
    Star,

    /// Qualified `t.*`.
    QualifiedStar { table: String },

    Alias {
        expr: Box<Expr>,
        alias: String,
    },

    Comparison {
        kind: ComparisonKind,
        left: Box<Expr>,
        /// `None` for unary comparisons such as `IS NULL`.
        right: Option<Box<Expr>>,
    },

    Boolean {
        kind: BooleanKind,
        children: Vec<Expr>,
    },

    /// `left IN (tuple of literals)`.
    In {
        left: Box<Expr>,
        list: Box<Expr>, // always an Expr::Tuple of Expr::Literal
    },

    Tuple(Vec<Expr>),

    Arithmetic {
        kind: ArithmeticKind,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// An unresolved function call as produced by the parser.
    UnresolvedFunctionCall {
        name: String,
        args: Vec<Expr>,
    },

    /// A function call bound to a catalog-registered function.
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn alias(self, name: impl Into<String>) -> Expr {
        Expr::Alias {
            expr: Box::new(self),
            alias: name.into(),
        }
    }

    pub fn unresolved_column(name: impl Into<String>) -> Expr {
        Expr::UnresolvedColumn { name: name.into() }
    }

    pub fn unresolved_qualified(table: impl Into<String>, name: impl Into<String>) -> Expr {
        Expr::UnresolvedQualifiedColumn {
            table: table.into(),
            name: name.into(),
        }
    }

    pub fn eq(self, other: Expr) -> Expr {
        Expr::Comparison {
            kind: ComparisonKind::Eq,
            left: Box::new(self),
            right: Some(Box::new(other)),
        }
    }

    pub fn gt(self, other: Expr) -> Expr {
        Expr::Comparison {
            kind: ComparisonKind::Gt,
            left: Box::new(self),
            right: Some(Box::new(other)),
        }
    }

    pub fn is_null(self) -> Expr {
        Expr::Comparison {
            kind: ComparisonKind::IsNull,
            left: Box::new(self),
            right: None,
        }
    }

    /// Whether this expression tree contains no unresolved node (column,
    /// qualified column, star, qualified star, or function call).
    pub fn is_resolved(&self) -> bool {
        match self {
            Expr::UnresolvedColumn { .. }
            | Expr::UnresolvedQualifiedColumn { .. }
            | Expr::Star
            | Expr::QualifiedStar { .. }
            | Expr::UnresolvedFunctionCall { .. } => false,
            Expr::Literal(_) | Expr::GetField { .. } | Expr::GetFieldWithTable { .. } => true,
            Expr::Alias { expr, .. } => expr.is_resolved(),
            Expr::Comparison { left, right, .. } => {
                left.is_resolved() && right.as_ref().is_none_or(|r| r.is_resolved())
            }
            Expr::Boolean { children, .. } => children.iter().all(Expr::is_resolved),
            Expr::In { left, list } => left.is_resolved() && list.is_resolved(),
            Expr::Tuple(items) => items.iter().all(Expr::is_resolved),
            Expr::Arithmetic { left, right, .. } => left.is_resolved() && right.is_resolved(),
            Expr::FunctionCall { args, .. } => args.iter().all(Expr::is_resolved),
        }
    }

    /// Direct children of this expression node, in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal(_)
            | Expr::UnresolvedColumn { .. }
            | Expr::UnresolvedQualifiedColumn { .. }
            | Expr::GetField { .. }
            | Expr::GetFieldWithTable { .. }
            | Expr::Star
            | Expr::QualifiedStar { .. } => vec![],
            Expr::Alias { expr, .. } => vec![expr],
            Expr::Comparison { left, right, .. } => {
                let mut children = vec![left.as_ref()];
                if let Some(r) = right {
                    children.push(r.as_ref());
                }
                children
            }
            Expr::Boolean { children, .. } => children.iter().collect(),
            Expr::In { left, list } => vec![left.as_ref(), list.as_ref()],
            Expr::Tuple(items) => items.iter().collect(),
            Expr::Arithmetic { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::UnresolvedFunctionCall { args, .. } | Expr::FunctionCall { args, .. } => {
                args.iter().collect()
            }
        }
    }

    /// Name this expression would project as, if used bare in a projection
    /// list without an explicit alias (teacher convention: aliases take the
    /// inner expression's natural name when none is supplied).
    pub fn output_name(&self) -> Option<&str> {
        match self {
            Expr::UnresolvedColumn { name } => Some(name),
            Expr::UnresolvedQualifiedColumn { name, .. } => Some(name),
            Expr::GetField { name, .. } => Some(name),
            Expr::GetFieldWithTable { name, .. } => Some(name),
            Expr::Alias { alias, .. } => Some(alias),
            _ => None,
        }
    }
}
