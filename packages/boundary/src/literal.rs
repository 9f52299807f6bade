//! Hand-authored boundary polygons.

use geo::{Coord, LineString, Polygon};
use geojson::{Feature, Geometry, JsonObject};

use crate::Boundary;

/// A boundary defined by a single closed `[lon, lat]` ring.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralBoundary {
    name: String,
    ring: Vec<[f64; 2]>,
}

impl LiteralBoundary {
    /// Creates a literal boundary. Ring closure is validated with the
    /// study area configuration.
    #[must_use]
    pub const fn new(name: String, ring: Vec<[f64; 2]>) -> Self {
        Self { name, ring }
    }

    /// Builds the boundary feature. No I/O, cannot fail.
    #[must_use]
    pub fn boundary(&self) -> Boundary {
        let exterior: LineString<f64> = self
            .ring
            .iter()
            .map(|&[lon, lat]| Coord { x: lon, y: lat })
            .collect::<Vec<_>>()
            .into();
        let polygon = Polygon::new(exterior, Vec::new());

        let mut properties = JsonObject::new();
        properties.insert("name".to_string(), self.name.clone().into());
        properties.insert("source".to_string(), "literal".into());

        Boundary::new(Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::from(&polygon))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        })
    }
}
