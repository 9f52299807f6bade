//! Overpass QL query construction.
//!
//! Queries are a pure function of their inputs: the same bounding box,
//! predicates, and timeout always produce byte-identical text.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use coverage_map_overpass_models::{BoundingBox, ElementKind, TagPredicate};

/// Builds a query returning full geometry for every element matching any
/// of `predicates` inside `bbox`.
///
/// Predicates are unioned in the order of first appearance. A `key=value`
/// pair configured more than once is emitted once, with its element kinds
/// merged. Bounding box validity is the caller's responsibility.
#[must_use]
pub fn build_query(bbox: &BoundingBox, predicates: &[TagPredicate], timeout_secs: u32) -> String {
    let bounds = format_bbox(bbox);

    let mut query = format!("[out:json][timeout:{timeout_secs}];\n(\n");
    for (key, value, elements) in merge_predicates(predicates) {
        let _ = writeln!(
            query,
            "  {}[\"{}\"=\"{}\"]({bounds});",
            elements.as_overpass(),
            escape(key),
            escape(value),
        );
    }
    query.push_str(");\nout body geom;\n");
    query
}

/// Collapses predicates sharing a `key=value` pair, keeping first-seen order.
fn merge_predicates(predicates: &[TagPredicate]) -> Vec<(&str, &str, ElementKind)> {
    let mut index: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    let mut merged: Vec<(&str, &str, ElementKind)> = Vec::with_capacity(predicates.len());

    for predicate in predicates {
        let pair = (predicate.key.as_str(), predicate.value.as_str());
        match index.get(&pair) {
            Some(&i) => merged[i].2 = merged[i].2.union(predicate.elements),
            None => {
                index.insert(pair, merged.len());
                merged.push((pair.0, pair.1, predicate.elements));
            }
        }
    }

    merged
}

/// Formats a bounding box in Overpass `(south,west,north,east)` order.
#[must_use]
pub fn format_bbox(bbox: &BoundingBox) -> String {
    format!("{},{},{},{}", bbox.south, bbox.west, bbox.north, bbox.east)
}

/// Escapes a tag key or value for use inside a double-quoted QL string.
fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
