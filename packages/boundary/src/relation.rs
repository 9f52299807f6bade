//! Administrative boundary lookup by OSM relation id.

use coverage_map_overpass::progress::ProgressCallback;
use coverage_map_overpass::{OverpassClient, OverpassTransport, normalize};
use geojson::{FeatureCollection, feature::Id};

use crate::{Boundary, BoundaryError};

/// Fetches a relation's polygon through Overpass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationBoundary {
    relation_id: u64,
    timeout_secs: u32,
}

impl RelationBoundary {
    /// Creates a provider for `relation_id`.
    #[must_use]
    pub const fn new(relation_id: u64, timeout_secs: u32) -> Self {
        Self {
            relation_id,
            timeout_secs,
        }
    }

    /// Returns the raw Overpass query for this relation.
    #[must_use]
    pub fn query(&self) -> String {
        format!(
            "[out:json][timeout:{}];\nrelation({});\nout body geom;\n",
            self.timeout_secs, self.relation_id
        )
    }

    /// Fetches and normalizes the relation.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::Overpass`] if the query fails or the payload
    /// cannot be normalized, and [`BoundaryError::NoBoundaryFound`] if no
    /// polygon survives normalization.
    pub async fn fetch<T: OverpassTransport>(
        &self,
        client: &OverpassClient<T>,
        progress: &dyn ProgressCallback,
    ) -> Result<Boundary, BoundaryError> {
        let label = format!("boundary relation {}", self.relation_id);
        let payload = client.execute(&self.query(), &label, progress).await?;
        let polygons = normalize::retain_polygons(normalize::to_feature_collection(&payload)?);

        log::info!("Found {} boundary feature(s)", polygons.features.len());

        self.select(polygons)
    }

    /// Picks the relation's own feature, falling back to the first polygon
    /// when the relation itself did not assemble.
    fn select(&self, polygons: FeatureCollection) -> Result<Boundary, BoundaryError> {
        let own_id = Id::String(format!("relation/{}", self.relation_id));
        let count = polygons.features.len();

        let mut features = polygons.features.into_iter();
        let mut fallback = None;
        for feature in features.by_ref() {
            if feature.id.as_ref() == Some(&own_id) {
                if count > 1 {
                    log::warn!(
                        "relation {}: ignoring {} additional polygon feature(s)",
                        self.relation_id,
                        count - 1
                    );
                }
                return Ok(Boundary::new(feature));
            }
            if fallback.is_none() {
                fallback = Some(feature);
            }
        }

        fallback
            .map(|feature| {
                log::warn!(
                    "relation {}: relation polygon missing, using first polygon feature",
                    self.relation_id
                );
                Boundary::new(feature)
            })
            .ok_or(BoundaryError::NoBoundaryFound {
                relation_id: self.relation_id,
            })
    }
}
