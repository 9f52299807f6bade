//! Converts Overpass `out body geom` responses into `GeoJSON` features.
//!
//! - Closed ways become `Polygon`s (unless tagged `area=no`), open ways
//!   become `LineString`s, and tagged nodes become `Point`s.
//! - `multipolygon` and `boundary` relations are assembled from their
//!   member way geometries: member segments are joined end to end into
//!   closed rings, `outer` rings become shells and `inner` rings become
//!   holes of the shell that contains them.
//!
//! Every feature carries the OSM tags as properties plus `@id`
//! (`"way/123"`), which is also the feature id.
//!
//! The coverage pipeline only measures areas, so callers follow up with
//! [`retain_polygons`].

use std::collections::BTreeMap;

use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, feature::Id};
use serde::Deserialize;

use crate::OverpassError;

#[derive(Debug, Deserialize)]
struct OsmResponse {
    #[serde(default)]
    elements: Vec<OsmElement>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OsmElement {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Way {
        id: i64,
        #[serde(default)]
        geometry: Vec<Option<LatLon>>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Relation {
        id: i64,
        #[serde(default)]
        members: Vec<RelationMember>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RelationMember {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    geometry: Vec<Option<LatLon>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

impl From<LatLon> for Coord<f64> {
    fn from(p: LatLon) -> Self {
        Self { x: p.lon, y: p.lat }
    }
}

/// Converts a raw Overpass JSON payload into a feature collection.
///
/// Feature order follows element order in the response.
///
/// # Errors
///
/// Returns [`OverpassError::Normalization`] if the payload does not have
/// the Overpass JSON shape.
pub fn to_feature_collection(payload: &serde_json::Value) -> Result<FeatureCollection, OverpassError> {
    let response =
        OsmResponse::deserialize(payload).map_err(|e| OverpassError::Normalization {
            message: format!("Unexpected Overpass response shape: {e}"),
        })?;

    let features: Vec<Feature> = response
        .elements
        .into_iter()
        .filter_map(element_to_feature)
        .collect();

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Drops every feature whose geometry is not a `Polygon` or
/// `MultiPolygon`, preserving order.
#[must_use]
pub fn retain_polygons(mut collection: FeatureCollection) -> FeatureCollection {
    let before = collection.features.len();
    collection.features.retain(is_polygonal);
    log::debug!(
        "Kept {} polygon features out of {before}",
        collection.features.len()
    );
    collection
}

/// Returns `true` for `Polygon` and `MultiPolygon` features.
#[must_use]
pub fn is_polygonal(feature: &Feature) -> bool {
    matches!(
        feature.geometry.as_ref().map(|g| &g.value),
        Some(geojson::Value::Polygon(_) | geojson::Value::MultiPolygon(_))
    )
}

fn element_to_feature(element: OsmElement) -> Option<Feature> {
    match element {
        OsmElement::Node { id, lat, lon, tags } => {
            if tags.is_empty() {
                return None;
            }
            let point = Point::new(lon, lat);
            Some(make_feature("node", id, tags, geojson::Value::from(&point)))
        }
        OsmElement::Way { id, geometry, tags } => {
            let coords = to_coords(&geometry);
            if coords.len() < 2 {
                log::debug!("Skipping way/{id}: fewer than 2 positions");
                return None;
            }
            let value = if is_closed(&coords) && coords.len() >= 4 && !tag_is(&tags, "area", "no") {
                geojson::Value::from(&Polygon::new(LineString::from(coords), Vec::new()))
            } else {
                geojson::Value::from(&LineString::from(coords))
            };
            Some(make_feature("way", id, tags, value))
        }
        OsmElement::Relation { id, members, tags } => {
            if !(tag_is(&tags, "type", "multipolygon") || tag_is(&tags, "type", "boundary")) {
                log::debug!("Skipping relation/{id}: not an area relation");
                return None;
            }
            let multi = assemble_multipolygon(id, &members)?;
            let value = if multi.0.len() == 1 {
                geojson::Value::from(&multi.0[0])
            } else {
                geojson::Value::from(&multi)
            };
            Some(make_feature("relation", id, tags, value))
        }
        OsmElement::Other => None,
    }
}

fn make_feature(
    kind: &str,
    id: i64,
    tags: BTreeMap<String, String>,
    value: geojson::Value,
) -> Feature {
    let osm_id = format!("{kind}/{id}");

    let mut properties: JsonObject = tags
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect();
    properties.insert("@id".to_string(), serde_json::Value::String(osm_id.clone()));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: Some(Id::String(osm_id)),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn tag_is(tags: &BTreeMap<String, String>, key: &str, value: &str) -> bool {
    tags.get(key).is_some_and(|v| v == value)
}

fn to_coords(geometry: &[Option<LatLon>]) -> Vec<Coord<f64>> {
    geometry.iter().flatten().copied().map(Coord::from).collect()
}

fn is_closed(coords: &[Coord<f64>]) -> bool {
    coords.len() >= 2 && coords.first() == coords.last()
}

/// Builds a multipolygon from relation member ways.
///
/// Returns `None` if no outer ring could be closed.
fn assemble_multipolygon(id: i64, members: &[RelationMember]) -> Option<MultiPolygon<f64>> {
    let mut outer_segments = Vec::new();
    let mut inner_segments = Vec::new();

    for member in members.iter().filter(|m| m.kind == "way") {
        let coords = to_coords(&member.geometry);
        match member.role.as_str() {
            "outer" | "" => outer_segments.push(coords),
            "inner" => inner_segments.push(coords),
            _ => {}
        }
    }

    let outers = assemble_rings(id, outer_segments);
    if outers.is_empty() {
        log::debug!("Skipping relation/{id}: no closed outer ring");
        return None;
    }

    let mut holes: Vec<Vec<LineString<f64>>> = vec![Vec::new(); outers.len()];
    let shells: Vec<Polygon<f64>> = outers
        .iter()
        .map(|ring| Polygon::new(ring.clone(), Vec::new()))
        .collect();

    for inner in assemble_rings(id, inner_segments) {
        let Some(sample) = inner.0.first().copied() else {
            continue;
        };
        match shells.iter().position(|s| s.contains(&Point::from(sample))) {
            Some(idx) => holes[idx].push(inner),
            None => log::debug!("relation/{id}: inner ring outside every shell, dropped"),
        }
    }

    Some(MultiPolygon(
        outers
            .into_iter()
            .zip(holes)
            .map(|(outer, inners)| Polygon::new(outer, inners))
            .collect(),
    ))
}

/// Joins way segments that share endpoints into closed rings.
///
/// Segments are consumed in order; each ring grows from its tail,
/// reversing the next segment when it is stored backwards. Rings that
/// cannot be closed are dropped.
fn assemble_rings(id: i64, mut segments: Vec<Vec<Coord<f64>>>) -> Vec<LineString<f64>> {
    segments.retain(|s| s.len() >= 2);
    let mut rings = Vec::new();

    while !segments.is_empty() {
        let mut ring = segments.remove(0);

        while !is_closed(&ring) {
            let Some(tail) = ring.last().copied() else {
                break;
            };
            let Some(idx) = segments
                .iter()
                .position(|s| s.first() == Some(&tail) || s.last() == Some(&tail))
            else {
                break;
            };
            let mut next = segments.remove(idx);
            if next.first() != Some(&tail) {
                next.reverse();
            }
            ring.extend(next.into_iter().skip(1));
        }

        if is_closed(&ring) && ring.len() >= 4 {
            rings.push(LineString::from(ring));
        } else {
            log::debug!("relation/{id}: dropping unclosed ring of {} positions", ring.len());
        }
    }

    rings
}
