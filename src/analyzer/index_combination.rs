//! `getIndexes`: matches a (resolved) filter predicate against the indexes a
//! catalog advertises for the tables it references, producing one combined
//! [`IndexLookup`] per table whose predicates reduced to something an index
//! can serve (spec §4.15). `assign_indexes` calls this once per candidate
//! `Filter` and wraps each matched table's scan accordingly; this module only
//! computes the per-table lookup map, with no plan-rewriting of its own.
//!
//! Matching rules:
//! - `col = literal` against a catalog index on `col` → a single-key lookup.
//! - `col IN (l1, ..., ln)` → the n-way union of the single-key lookups for
//!   each `li`, if all `li` matched (an unmatched member drops the whole IN).
//! - `AND`: per table, combine every child's lookup for that table with
//!   `Intersection` if they're mergeable; a table appearing under only one
//!   child keeps that child's lookup unchanged; a table whose children
//!   disagree on backend (not mergeable) is dropped entirely.
//! - `OR`: a table survives only if every child produced a lookup for it,
//!   combined pairwise with `Union`; otherwise it's dropped (a predicate like
//!   `t1.a = 1 OR t2.b = 2` can't be served by an index on either side alone).
//! - Anything else contributes nothing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::catalog::{Catalog, IndexLookup, SetOp, TableDef};
use crate::expr::{BooleanKind, ComparisonKind, Expr, LiteralValue};

/// For every table `expr` constrains via an index-servable comparison,
/// the combined lookup selecting the matching rows. `table_def_of` resolves a
/// table name (as carried by a `GetFieldWithTable`) to its catalog
/// definition, from which the `Indexable` backend (if any) is read.
pub fn get_indexes(
    expr: &Expr,
    database: &str,
    catalog: &dyn Catalog,
    table_def_of: &dyn Fn(&str) -> Option<Arc<TableDef>>,
) -> HashMap<String, Arc<dyn IndexLookup>> {
    match expr {
        Expr::Comparison {
            kind: ComparisonKind::Eq,
            left,
            right: Some(right),
        } => equality_lookup(left, right, database, catalog, table_def_of)
            .or_else(|| equality_lookup(right, left, database, catalog, table_def_of))
            .map(|(table, lookup)| HashMap::from([(table, lookup)]))
            .unwrap_or_default(),

        Expr::In { left, list } => in_lookup(left, list, database, catalog, table_def_of)
            .map(|(table, lookup)| HashMap::from([(table, lookup)]))
            .unwrap_or_default(),

        Expr::Boolean {
            kind: BooleanKind::And,
            children,
        } => combine_and(children, database, catalog, table_def_of),

        Expr::Boolean {
            kind: BooleanKind::Or,
            children,
        } => combine_or(children, database, catalog, table_def_of),

        _ => HashMap::new(),
    }
}

fn column_ref(expr: &Expr) -> Option<(&str, &str)> {
    match expr {
        Expr::GetFieldWithTable { table, name, .. } => Some((table.as_str(), name.as_str())),
        _ => None,
    }
}

fn literal_value(expr: &Expr) -> Option<&LiteralValue> {
    match expr {
        Expr::Literal(v) => Some(v),
        _ => None,
    }
}

/// Looks up a single index entry for `table.name` and builds the lookup
/// selecting rows equal to `value`. Scopes through `indexes_by_table` rather
/// than the catalog's `index_by_expression` (which matches by expression
/// alone, with no table filter) so a bare `col` index registered under one
/// table is never mistakenly matched against a same-named column elsewhere.
fn single_key_lookup(
    table: &str,
    name: &str,
    value: &LiteralValue,
    database: &str,
    catalog: &dyn Catalog,
    table_def_of: &dyn Fn(&str) -> Option<Arc<TableDef>>,
) -> Option<Arc<dyn IndexLookup>> {
    let index = catalog
        .indexes_by_table(database, table)
        .into_iter()
        .find(|idx| idx.expression == Expr::unresolved_column(name))?;

    let def = table_def_of(table)?;
    match &def.capability {
        crate::catalog::TableCapability::Indexable(backend) => backend.lookup_for(&index, value),
        _ => None,
    }
}

fn equality_lookup(
    column_side: &Expr,
    value_side: &Expr,
    database: &str,
    catalog: &dyn Catalog,
    table_def_of: &dyn Fn(&str) -> Option<Arc<TableDef>>,
) -> Option<(String, Arc<dyn IndexLookup>)> {
    let (table, name) = column_ref(column_side)?;
    let value = literal_value(value_side)?;
    let lookup = single_key_lookup(table, name, value, database, catalog, table_def_of)?;
    Some((table.to_string(), lookup))
}

fn in_lookup(
    left: &Expr,
    list: &Expr,
    database: &str,
    catalog: &dyn Catalog,
    table_def_of: &dyn Fn(&str) -> Option<Arc<TableDef>>,
) -> Option<(String, Arc<dyn IndexLookup>)> {
    let (table, name) = column_ref(left)?;
    let Expr::Tuple(items) = list else {
        return None;
    };
    let mut lookups = Vec::with_capacity(items.len());
    for item in items {
        let value = literal_value(item)?;
        lookups.push(single_key_lookup(
            table, name, value, database, catalog, table_def_of,
        )?);
    }
    let combined = crate::catalog::index::union_of(lookups)?;
    Some((table.to_string(), combined))
}

fn combine_and(
    children: &[Expr],
    database: &str,
    catalog: &dyn Catalog,
    table_def_of: &dyn Fn(&str) -> Option<Arc<TableDef>>,
) -> HashMap<String, Arc<dyn IndexLookup>> {
    let maps: Vec<_> = children
        .iter()
        .map(|c| get_indexes(c, database, catalog, table_def_of))
        .collect();

    let all_tables: HashSet<String> = maps.iter().flat_map(|m| m.keys().cloned()).collect();

    let mut result = HashMap::new();
    for table in all_tables {
        let mut acc: Option<Arc<dyn IndexLookup>> = None;
        let mut dropped = false;
        for m in &maps {
            let Some(lookup) = m.get(&table) else {
                continue;
            };
            acc = match acc {
                None => Some(lookup.clone()),
                Some(prev) => {
                    if prev.is_mergeable(lookup.as_ref()) {
                        Some(prev.combine(SetOp::Intersection, lookup.as_ref()))
                    } else {
                        dropped = true;
                        break;
                    }
                }
            };
        }
        if !dropped {
            if let Some(lookup) = acc {
                result.insert(table, lookup);
            }
        }
    }
    result
}

fn combine_or(
    children: &[Expr],
    database: &str,
    catalog: &dyn Catalog,
    table_def_of: &dyn Fn(&str) -> Option<Arc<TableDef>>,
) -> HashMap<String, Arc<dyn IndexLookup>> {
    let maps: Vec<_> = children
        .iter()
        .map(|c| get_indexes(c, database, catalog, table_def_of))
        .collect();

    let Some(first) = maps.first() else {
        return HashMap::new();
    };
    let mut common: HashSet<String> = first.keys().cloned().collect();
    for m in &maps[1..] {
        common.retain(|t| m.contains_key(t));
    }

    let mut result = HashMap::new();
    for table in common {
        let mut acc: Option<Arc<dyn IndexLookup>> = None;
        let mut dropped = false;
        for m in &maps {
            let lookup = m.get(&table).expect("table retained only if present in every map");
            acc = match acc {
                None => Some(lookup.clone()),
                Some(prev) => {
                    if prev.is_mergeable(lookup.as_ref()) {
                        Some(prev.combine(SetOp::Union, lookup.as_ref()))
                    } else {
                        dropped = true;
                        break;
                    }
                }
            };
        }
        if !dropped {
            if let Some(lookup) = acc {
                result.insert(table, lookup);
            }
        }
    }
    result
}
