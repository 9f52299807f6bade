#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Overpass query input types.
//!
//! Defines the bounding box and tag predicate types that study area TOML
//! files deserialize into and that the query builder consumes.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in degrees, in Overpass order
/// (south, west, north, east).
///
/// Callers are expected to keep `south < north` and `west < east`; see
/// [`BoundingBox::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum latitude.
    pub south: f64,
    /// Minimum longitude.
    pub west: f64,
    /// Maximum latitude.
    pub north: f64,
    /// Maximum longitude.
    pub east: f64,
}

impl BoundingBox {
    /// Creates a bounding box from its four bounds.
    #[must_use]
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Returns `true` if the bounds are finite and correctly ordered.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.south, self.west, self.north, self.east]
            .iter()
            .all(|v| v.is_finite())
            && self.south < self.north
            && self.west < self.east
    }
}

/// Which OSM element types a tag predicate applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Ways only.
    Way,
    /// Relations only.
    Relation,
    /// Ways and relations (Overpass `wr`).
    #[default]
    WayOrRelation,
}

impl ElementKind {
    /// Returns the Overpass QL statement type for this kind.
    #[must_use]
    pub const fn as_overpass(self) -> &'static str {
        match self {
            Self::Way => "way",
            Self::Relation => "relation",
            Self::WayOrRelation => "wr",
        }
    }

    /// Returns the narrowest kind covering both `self` and `other`.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        if self == other {
            self
        } else {
            Self::WayOrRelation
        }
    }
}

/// A single `key=value` tag match, e.g. `amenity=parking`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagPredicate {
    /// OSM tag key.
    pub key: String,
    /// OSM tag value.
    pub value: String,
    /// Element types to match.
    #[serde(default)]
    pub elements: ElementKind,
}

impl TagPredicate {
    /// Creates a predicate matching both ways and relations.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            elements: ElementKind::default(),
        }
    }

    /// Restricts the predicate to the given element kind.
    #[must_use]
    pub const fn with_elements(mut self, elements: ElementKind) -> Self {
        self.elements = elements;
        self
    }
}

impl std::fmt::Display for TagPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn element_kind_union_widens_on_mismatch() {
        use super::ElementKind::{Relation, Way, WayOrRelation};
        assert_eq!(Way.union(Way), Way);
        assert_eq!(Relation.union(Relation), Relation);
        assert_eq!(Way.union(Relation), WayOrRelation);
        assert_eq!(WayOrRelation.union(Way), WayOrRelation);
    }

    use super::*;

    #[test]
    fn valid_bbox() {
        assert!(BoundingBox::new(39.71, -75.59, 39.785, -75.5).is_valid());
    }

    #[test]
    fn inverted_bbox_is_invalid() {
        assert!(!BoundingBox::new(39.785, -75.59, 39.71, -75.5).is_valid());
        assert!(!BoundingBox::new(39.71, -75.5, 39.785, -75.59).is_valid());
        assert!(!BoundingBox::new(f64::NAN, -75.59, 39.785, -75.5).is_valid());
    }

    #[test]
    fn predicate_elements_default_to_way_or_relation() {
        let predicate: TagPredicate = toml::from_str("key = \"amenity\"\nvalue = \"parking\"")
            .unwrap();
        assert_eq!(predicate.elements, ElementKind::WayOrRelation);
        assert_eq!(predicate.to_string(), "amenity=parking");
    }
}
