#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary membership filtering and area coverage aggregation.
//!
//! Both operations work on `GeoJSON` feature collections whose geometries
//! are `Polygon` or `MultiPolygon`. Area and intersection are delegated to
//! a [`GeometryEngine`](geometry::GeometryEngine); production code uses
//! [`SphericalGeometry`](geometry::SphericalGeometry).

pub mod filter;
pub mod geometry;
pub mod stats;

use thiserror::Error;

pub use filter::filter_intersecting;
pub use geometry::{GeometryEngine, SphericalGeometry};
pub use stats::CoverageAggregator;

/// Errors that can occur during filtering or aggregation.
#[derive(Debug, Error)]
pub enum CoverageError {
    /// Region area is zero, negative, or not finite; a percentage over it
    /// would be meaningless.
    #[error("Invalid region: area is {area_sq_m} m²")]
    InvalidRegion {
        /// Computed region area.
        area_sq_m: f64,
    },

    /// A feature without `Polygon`/`MultiPolygon` geometry reached the
    /// filter or aggregator. Normalization should have removed it.
    #[error("Malformed geometry on {feature}: {message}")]
    MalformedGeometry {
        /// Which feature (e.g. `"target #3 (way/42)"`).
        feature: String,
        /// What was wrong with it.
        message: String,
    },
}
