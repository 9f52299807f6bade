#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Area coverage statistics types.
//!
//! [`CoverageStats`] is always derived from a region/target feature pair
//! and never stored on its own.

use serde::{Deserialize, Serialize};

/// How much of a region's area is taken up by target features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageStats {
    /// Region area in square meters.
    pub region_area_sq_m: f64,
    /// Region area in square miles.
    pub region_area_sq_mi: f64,
    /// Summed target feature area in square meters.
    pub target_area_sq_m: f64,
    /// Summed target feature area in square miles.
    pub target_area_sq_mi: f64,
    /// Summed target feature area in acres.
    pub target_area_acres: f64,
    /// Number of target features.
    pub target_count: u64,
    /// `100 × target area / region area`.
    pub coverage_percent: f64,
    /// Mean target feature size in acres, if there are any targets.
    pub average_target_acres: Option<f64>,
}
