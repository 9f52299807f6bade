//! Boundary membership filter.

use geojson::{Feature, FeatureCollection};

use crate::CoverageError;
use crate::geometry::{GeometryEngine, to_multipolygon};

/// Keeps every feature whose geometry intersects `boundary`.
///
/// Touching counts as intersecting. Kept features are cloned into a new
/// collection in their original order; `features` is left untouched.
///
/// # Errors
///
/// Returns [`CoverageError::MalformedGeometry`] if the boundary or any
/// feature is not a `Polygon`/`MultiPolygon`.
pub fn filter_intersecting(
    features: &FeatureCollection,
    boundary: &Feature,
    engine: &dyn GeometryEngine,
) -> Result<FeatureCollection, CoverageError> {
    let boundary_geometry = to_multipolygon(boundary, "boundary", 0)?;

    let mut kept = Vec::new();
    for (index, feature) in features.features.iter().enumerate() {
        let geometry = to_multipolygon(feature, "target", index)?;
        if engine.intersects(&geometry, &boundary_geometry) {
            kept.push(feature.clone());
        }
    }

    log::info!(
        "Kept {} of {} features intersecting the boundary",
        kept.len(),
        features.features.len()
    );

    Ok(FeatureCollection {
        bbox: None,
        features: kept,
        foreign_members: features.foreign_members.clone(),
    })
}
