//! Coverage statistics aggregation.
//!
//! Areas are plain sums of per-feature areas, so the totals do not depend
//! on feature order or on how the collection is partitioned. Overlapping
//! target features are counted twice, matching a per-feature sum.

use coverage_map_config::AreaUnits;
use coverage_map_coverage_models::CoverageStats;
use geojson::FeatureCollection;

use crate::CoverageError;
use crate::geometry::{GeometryEngine, to_multipolygon};

/// Reduces region and target feature collections to [`CoverageStats`].
///
/// Holds no state beyond its geometry engine and unit factors; every call
/// recomputes from the collections given.
pub struct CoverageAggregator<G> {
    engine: G,
    units: AreaUnits,
}

impl<G: GeometryEngine> CoverageAggregator<G> {
    /// Creates an aggregator.
    #[must_use]
    pub const fn new(engine: G, units: AreaUnits) -> Self {
        Self { engine, units }
    }

    /// Sums the area of every feature in square meters.
    ///
    /// `role` labels features in errors.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::MalformedGeometry`] for non-polygonal
    /// features.
    pub fn total_area_sq_m(
        &self,
        features: &FeatureCollection,
        role: &str,
    ) -> Result<f64, CoverageError> {
        features
            .features
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                to_multipolygon(feature, role, index).map(|mp| self.engine.area_sq_m(&mp))
            })
            .sum()
    }

    /// Computes coverage of `targets` over `region`.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError::MalformedGeometry`] for non-polygonal
    /// features and [`CoverageError::InvalidRegion`] if the region has no
    /// positive area.
    pub fn aggregate(
        &self,
        region: &FeatureCollection,
        targets: &FeatureCollection,
    ) -> Result<CoverageStats, CoverageError> {
        let region_area = self.total_area_sq_m(region, "region")?;
        let target_area = self.total_area_sq_m(targets, "target")?;

        log::debug!(
            "Region {region_area:.1} m² over {} feature(s); targets {target_area:.1} m² over {}",
            region.features.len(),
            targets.features.len()
        );

        compute_stats(region_area, target_area, targets.features.len(), &self.units)
    }
}

/// Derives [`CoverageStats`] from summed areas in square meters.
///
/// # Errors
///
/// Returns [`CoverageError::InvalidRegion`] if `region_area_sq_m` is not a
/// positive finite number.
pub fn compute_stats(
    region_area_sq_m: f64,
    target_area_sq_m: f64,
    target_count: usize,
    units: &AreaUnits,
) -> Result<CoverageStats, CoverageError> {
    if !region_area_sq_m.is_finite() || region_area_sq_m <= 0.0 {
        return Err(CoverageError::InvalidRegion {
            area_sq_m: region_area_sq_m,
        });
    }

    let region_area_sq_mi = units.sq_miles(region_area_sq_m);
    let target_area_sq_mi = units.sq_miles(target_area_sq_m);
    let target_area_acres = units.acres(target_area_sq_mi);

    #[allow(clippy::cast_precision_loss)]
    let average_target_acres =
        (target_count > 0).then(|| target_area_acres / target_count as f64);

    Ok(CoverageStats {
        region_area_sq_m,
        region_area_sq_mi,
        target_area_sq_m,
        target_area_sq_mi,
        target_area_acres,
        target_count: target_count as u64,
        coverage_percent: 100.0 * target_area_sq_m / region_area_sq_m,
        average_target_acres,
    })
}
