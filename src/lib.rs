//! Query plan analyzer.
//!
//! This crate turns a parsed but unresolved logical plan tree into a fully
//! resolved, rewritten logical plan ready for execution. It does not parse
//! SQL and it does not execute plans — both are external collaborators.
//!
//! # Architecture overview
//!
//! ```text
//! unresolved LogicalPlan ──▶ [Analyzer::analyze] ──▶ resolved LogicalPlan
//!                                  │
//!                                  ├─ rule pipeline (fixed point, bounded iterations)
//!                                  ├─ tree traversal utilities (transform_up)
//!                                  └─ catalog (tables, functions, indexes)
//! ```
//!
//! ## Module organization
//!
//! - [`expr`] — the scalar expression algebra (literals, columns, comparisons, ...)
//! - [`schema`] — ordered, typed, table-tagged column descriptors
//! - [`plan`] — the relational plan algebra (Project, Filter, Join, table scans, ...)
//! - [`transform`] — bottom-up tree rewriting utilities shared by every rule
//! - [`catalog`] — name resolution surface: databases, tables, functions, indexes
//! - [`analyzer`] — the rule pipeline driver and every individual rule
//! - [`context`] — per-query `Context` (session, current database, cancellation)
//! - [`config`] — environment-driven configuration for the analyzer

pub mod analyzer;
pub mod catalog;
pub mod config;
pub mod context;
pub mod expr;
pub mod plan;
pub mod schema;
pub mod transform;

pub use analyzer::{errors::AnalyzerError, Analyzer};
pub use context::Context;
