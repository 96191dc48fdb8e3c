//! Relational plan algebra.
//!
//! A [`PlanNode`] is an immutable relational operator; trees of them are
//! always held behind `Arc` so that rewrites can share unchanged subtrees
//! (see [`crate::transform`]). Every node exposes its children, its output
//! [`Schema`], and a recursively-derived resolved/unresolved flag.
//!
//! The four table-scan variants model one storage-capability ladder: a bare
//! `Table` may be wrapped into a `ProjectionPushdownTable`, further into a
//! `ProjectionAndFilterPushdownTable`, and finally into an `IndexableTable`,
//! as the `pushdown`/`assign_indexes` rules discover work the backend can
//! do itself. See spec §3 and §9.

pub mod errors;
pub use errors::PlanError;

use std::fmt;
use std::sync::Arc;

use crate::catalog::{IndexId, IndexLookup, ReleaseGuard, TableDef};
use crate::expr::Expr;
use crate::schema::{ColumnSchema, DataType, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub expr: Expr,
    pub direction: SortDirection,
}

impl SortField {
    pub fn asc(expr: Expr) -> Self {
        SortField {
            expr,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        SortField {
            expr,
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionPushdownTable {
    pub table: Arc<TableDef>,
    /// Column names required from this table, in the order the upstream
    /// plan needs them.
    pub projected_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionAndFilterPushdownTable {
    pub table: Arc<TableDef>,
    /// Always `GetFieldWithTable` expressions into `table.schema`.
    pub projected_exprs: Vec<Expr>,
    /// Filter conjuncts the backend accepted via `handled_filters`.
    pub pushed_filters: Vec<Expr>,
}

#[derive(Clone)]
pub struct IndexableTable {
    pub inner: ProjectionAndFilterPushdownTable,
    pub lookup: Arc<dyn IndexLookup>,
    pub index_ids: Vec<IndexId>,
    /// Fires the catalog's release callback (if any) for `index_ids` at
    /// most once, when the last reference to this node is dropped (§5).
    /// Not part of structural equality: it carries no plan-shape
    /// information, only a cleanup obligation.
    pub release: Option<Arc<ReleaseGuard>>,
}

impl fmt::Debug for IndexableTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexableTable")
            .field("inner", &self.inner)
            .field("lookup", &self.lookup)
            .field("index_ids", &self.index_ids)
            .finish()
    }
}

impl PartialEq for IndexableTable {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
            && self.index_ids == other.index_ids
            && format!("{:?}", self.lookup) == format!("{:?}", other.lookup)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableAlias {
    pub alias: String,
    pub input: Arc<PlanNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryAlias {
    pub alias: String,
    pub input: Arc<PlanNode>,
    /// Populated by `resolve_subqueries` once the inner plan is resolved:
    /// the inner plan's schema with every column's table tag rewritten to
    /// `alias`.
    pub cached_schema: Option<Schema>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub input: Arc<PlanNode>,
    pub items: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub input: Arc<PlanNode>,
    pub predicate: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub input: Arc<PlanNode>,
    pub fields: Vec<SortField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub input: Arc<PlanNode>,
    pub group_exprs: Vec<Expr>,
    pub agg_exprs: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Distinct {
    pub input: Arc<PlanNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderedDistinct {
    pub input: Arc<PlanNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InnerJoin {
    pub left: Arc<PlanNode>,
    pub right: Arc<PlanNode>,
    pub predicate: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossJoin {
    pub left: Arc<PlanNode>,
    pub right: Arc<PlanNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NaturalJoin {
    pub left: Arc<PlanNode>,
    pub right: Arc<PlanNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    UnresolvedTable(String),
    Table(Arc<TableDef>),
    ProjectionPushdownTable(ProjectionPushdownTable),
    ProjectionAndFilterPushdownTable(ProjectionAndFilterPushdownTable),
    IndexableTable(IndexableTable),
    TableAlias(TableAlias),
    SubqueryAlias(SubqueryAlias),
    Project(Project),
    Filter(Filter),
    Sort(Sort),
    GroupBy(GroupBy),
    Distinct(Distinct),
    OrderedDistinct(OrderedDistinct),
    InnerJoin(InnerJoin),
    CrossJoin(CrossJoin),
    NaturalJoin(NaturalJoin),
}

/// Best-effort column descriptor for a projected expression. `GetField`/
/// `GetFieldWithTable` carry exact type/nullability; everything else falls
/// back to `DataType::Null`/nullable, since type inference over arbitrary
/// arithmetic/function expressions is out of scope (spec §1) — only enough
/// information to keep `Schema` positions and names consistent is needed.
pub fn expr_output_column(expr: &Expr) -> ColumnSchema {
    match expr {
        Expr::GetField {
            name,
            data_type,
            nullable,
            ..
        } => ColumnSchema::new(name.clone(), *data_type, "", *nullable),
        Expr::GetFieldWithTable {
            name,
            data_type,
            nullable,
            table,
            ..
        } => ColumnSchema::new(name.clone(), *data_type, table.clone(), *nullable),
        Expr::Literal(value) => {
            let nullable = matches!(value, crate::expr::LiteralValue::Null);
            ColumnSchema::new("?column?", value.data_type(), "", nullable)
        }
        Expr::Alias { expr, alias } => {
            let inner = expr_output_column(expr);
            ColumnSchema::new(alias.clone(), inner.data_type, "", inner.nullable)
        }
        other => {
            let name = other.output_name().unwrap_or("?column?").to_string();
            ColumnSchema::new(name, DataType::Null, "", true)
        }
    }
}

fn rename_table_tag(schema: &Schema, new_tag: &str) -> Schema {
    Schema::new(
        schema
            .iter()
            .map(|col| ColumnSchema::new(col.name.clone(), col.data_type, new_tag, col.nullable))
            .collect(),
    )
}

impl PlanNode {
    /// The output schema of this node, computed from its children's
    /// schemas and its own attributes — never cached except where the node
    /// explicitly carries a cache (`SubqueryAlias::cached_schema`).
    pub fn schema(&self) -> Schema {
        match self {
            PlanNode::UnresolvedTable(_) => Schema::empty(),
            PlanNode::Table(table) => table.schema.clone(),
            PlanNode::ProjectionPushdownTable(t) => {
                let mut columns = Vec::with_capacity(t.projected_columns.len());
                for name in &t.projected_columns {
                    if let Some((_, col)) = t.table.schema.find(&t.table.name, name) {
                        columns.push(col.clone());
                    }
                }
                Schema::new(columns)
            }
            PlanNode::ProjectionAndFilterPushdownTable(t) => {
                Schema::new(t.projected_exprs.iter().map(expr_output_column).collect())
            }
            PlanNode::IndexableTable(t) => {
                Schema::new(t.inner.projected_exprs.iter().map(expr_output_column).collect())
            }
            PlanNode::TableAlias(alias) => rename_table_tag(&alias.input.schema(), &alias.alias),
            PlanNode::SubqueryAlias(alias) => alias
                .cached_schema
                .clone()
                .unwrap_or_else(|| rename_table_tag(&alias.input.schema(), &alias.alias)),
            PlanNode::Project(project) => {
                Schema::new(project.items.iter().map(expr_output_column).collect())
            }
            PlanNode::Filter(filter) => filter.input.schema(),
            PlanNode::Sort(sort) => sort.input.schema(),
            PlanNode::GroupBy(group_by) => Schema::new(
                group_by
                    .group_exprs
                    .iter()
                    .chain(group_by.agg_exprs.iter())
                    .map(expr_output_column)
                    .collect(),
            ),
            PlanNode::Distinct(d) => d.input.schema(),
            PlanNode::OrderedDistinct(d) => d.input.schema(),
            PlanNode::InnerJoin(join) => Schema::concat(&join.left.schema(), &join.right.schema()),
            PlanNode::CrossJoin(join) => Schema::concat(&join.left.schema(), &join.right.schema()),
            PlanNode::NaturalJoin(join) => Schema::concat(&join.left.schema(), &join.right.schema()),
        }
    }

    /// Whether this node and every node/expression in its subtree is
    /// resolved. Derived, never stored (spec §3).
    pub fn resolved(&self) -> bool {
        match self {
            PlanNode::UnresolvedTable(_) => false,
            PlanNode::NaturalJoin(_) => false,
            PlanNode::Table(_) => true,
            PlanNode::ProjectionPushdownTable(_) => true,
            PlanNode::ProjectionAndFilterPushdownTable(_) => true,
            PlanNode::IndexableTable(_) => true,
            PlanNode::TableAlias(alias) => alias.input.resolved(),
            PlanNode::SubqueryAlias(alias) => alias.input.resolved(),
            PlanNode::Project(p) => p.input.resolved() && p.items.iter().all(Expr::is_resolved),
            PlanNode::Filter(f) => f.input.resolved() && f.predicate.is_resolved(),
            PlanNode::Sort(s) => {
                s.input.resolved() && s.fields.iter().all(|field| field.expr.is_resolved())
            }
            PlanNode::GroupBy(g) => {
                g.input.resolved()
                    && g.group_exprs.iter().all(Expr::is_resolved)
                    && g.agg_exprs.iter().all(Expr::is_resolved)
            }
            PlanNode::Distinct(d) => d.input.resolved(),
            PlanNode::OrderedDistinct(d) => d.input.resolved(),
            PlanNode::InnerJoin(j) => {
                j.left.resolved() && j.right.resolved() && j.predicate.is_resolved()
            }
            PlanNode::CrossJoin(j) => j.left.resolved() && j.right.resolved(),
        }
    }

    /// Direct plan-node children, in evaluation order. Table-scan variants
    /// have none: the `TableDef` they wrap is catalog data, not a
    /// recursable plan node.
    pub fn children(&self) -> Vec<Arc<PlanNode>> {
        match self {
            PlanNode::UnresolvedTable(_)
            | PlanNode::Table(_)
            | PlanNode::ProjectionPushdownTable(_)
            | PlanNode::ProjectionAndFilterPushdownTable(_)
            | PlanNode::IndexableTable(_) => vec![],
            PlanNode::TableAlias(a) => vec![a.input.clone()],
            PlanNode::SubqueryAlias(a) => vec![a.input.clone()],
            PlanNode::Project(p) => vec![p.input.clone()],
            PlanNode::Filter(f) => vec![f.input.clone()],
            PlanNode::Sort(s) => vec![s.input.clone()],
            PlanNode::GroupBy(g) => vec![g.input.clone()],
            PlanNode::Distinct(d) => vec![d.input.clone()],
            PlanNode::OrderedDistinct(d) => vec![d.input.clone()],
            PlanNode::InnerJoin(j) => vec![j.left.clone(), j.right.clone()],
            PlanNode::CrossJoin(j) => vec![j.left.clone(), j.right.clone()],
            PlanNode::NaturalJoin(j) => vec![j.left.clone(), j.right.clone()],
        }
    }

    /// Rebuilds this node with `children` substituted in, preserving every
    /// other attribute. `children.len()` must match `self.children().len()`
    /// — used by [`crate::transform::transform_up`] so each rule can stay
    /// generic over node shape instead of matching every variant.
    pub fn with_children(&self, mut children: Vec<Arc<PlanNode>>) -> PlanNode {
        match self {
            PlanNode::UnresolvedTable(_)
            | PlanNode::Table(_)
            | PlanNode::ProjectionPushdownTable(_)
            | PlanNode::ProjectionAndFilterPushdownTable(_)
            | PlanNode::IndexableTable(_) => self.clone(),
            PlanNode::TableAlias(a) => PlanNode::TableAlias(TableAlias {
                alias: a.alias.clone(),
                input: children.pop().expect("TableAlias needs one child"),
            }),
            PlanNode::SubqueryAlias(a) => PlanNode::SubqueryAlias(SubqueryAlias {
                alias: a.alias.clone(),
                input: children.pop().expect("SubqueryAlias needs one child"),
                cached_schema: a.cached_schema.clone(),
            }),
            PlanNode::Project(p) => PlanNode::Project(Project {
                input: children.pop().expect("Project needs one child"),
                items: p.items.clone(),
            }),
            PlanNode::Filter(f) => PlanNode::Filter(Filter {
                input: children.pop().expect("Filter needs one child"),
                predicate: f.predicate.clone(),
            }),
            PlanNode::Sort(s) => PlanNode::Sort(Sort {
                input: children.pop().expect("Sort needs one child"),
                fields: s.fields.clone(),
            }),
            PlanNode::GroupBy(g) => PlanNode::GroupBy(GroupBy {
                input: children.pop().expect("GroupBy needs one child"),
                group_exprs: g.group_exprs.clone(),
                agg_exprs: g.agg_exprs.clone(),
            }),
            PlanNode::Distinct(_) => PlanNode::Distinct(Distinct {
                input: children.pop().expect("Distinct needs one child"),
            }),
            PlanNode::OrderedDistinct(_) => PlanNode::OrderedDistinct(OrderedDistinct {
                input: children.pop().expect("OrderedDistinct needs one child"),
            }),
            PlanNode::InnerJoin(j) => {
                let right = children.pop().expect("InnerJoin needs two children");
                let left = children.pop().expect("InnerJoin needs two children");
                PlanNode::InnerJoin(InnerJoin {
                    left,
                    right,
                    predicate: j.predicate.clone(),
                })
            }
            PlanNode::CrossJoin(_) => {
                let right = children.pop().expect("CrossJoin needs two children");
                let left = children.pop().expect("CrossJoin needs two children");
                PlanNode::CrossJoin(CrossJoin { left, right })
            }
            PlanNode::NaturalJoin(_) => {
                let right = children.pop().expect("NaturalJoin needs two children");
                let left = children.pop().expect("NaturalJoin needs two children");
                PlanNode::NaturalJoin(NaturalJoin { left, right })
            }
        }
    }
}
