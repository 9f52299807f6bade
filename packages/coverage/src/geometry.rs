//! Geometry primitives used by the filter and aggregator.
//!
//! [`GeometryEngine`] is the seam between coverage logic and the geometry
//! library: area in square meters and a symmetric intersection test, both
//! over multipolygons. [`to_multipolygon`] is the single place where
//! `GeoJSON` features are converted, and where non-polygonal geometry is
//! rejected.

use geo::{ChamberlainDuquetteArea, Intersects, MultiPolygon};
use geojson::{Feature, feature::Id};

use crate::CoverageError;

/// Area and intersection primitives over polygonal geometry.
pub trait GeometryEngine: Send + Sync {
    /// Unsigned area of `geometry` in square meters.
    fn area_sq_m(&self, geometry: &MultiPolygon<f64>) -> f64;

    /// Whether `a` and `b` share any point (overlap or touch).
    fn intersects(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> bool;
}

/// Geometry on a spherical earth for `[lon, lat]` degree coordinates.
///
/// Area uses the Chamberlain–Duquette spherical polygon formula with the
/// WGS84 equatorial radius. Intersection is planar in degree space, which
/// is exact for the membership question at city scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct SphericalGeometry;

impl GeometryEngine for SphericalGeometry {
    fn area_sq_m(&self, geometry: &MultiPolygon<f64>) -> f64 {
        geometry.chamberlain_duquette_unsigned_area()
    }

    fn intersects(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> bool {
        a.intersects(b)
    }
}

/// Converts a feature's geometry into a [`MultiPolygon`].
///
/// `role` and `index` only label the feature in errors.
///
/// # Errors
///
/// Returns [`CoverageError::MalformedGeometry`] if the feature has no
/// geometry, or geometry other than `Polygon`/`MultiPolygon`.
pub fn to_multipolygon(
    feature: &Feature,
    role: &str,
    index: usize,
) -> Result<MultiPolygon<f64>, CoverageError> {
    let malformed = |message: String| CoverageError::MalformedGeometry {
        feature: describe_feature(feature, role, index),
        message,
    };

    let Some(geometry) = feature.geometry.clone() else {
        return Err(malformed("feature has no geometry".to_string()));
    };

    let geo_geom: geo::Geometry<f64> = geometry
        .try_into()
        .map_err(|e| malformed(format!("geometry could not be converted: {e}")))?;

    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        geo::Geometry::Polygon(p) => Ok(MultiPolygon(vec![p])),
        other => Err(malformed(format!(
            "unsupported geometry type {}",
            geometry_name(&other)
        ))),
    }
}

/// Labels a feature for log and error messages, e.g. `"target #3 (way/42)"`.
#[must_use]
pub fn describe_feature(feature: &Feature, role: &str, index: usize) -> String {
    match &feature.id {
        Some(Id::String(id)) => format!("{role} #{index} ({id})"),
        Some(Id::Number(id)) => format!("{role} #{index} ({id})"),
        None => format!("{role} #{index}"),
    }
}

const fn geometry_name(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}
