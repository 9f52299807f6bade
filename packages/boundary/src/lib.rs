#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reference boundary providers.
//!
//! A study area's boundary comes from exactly one [`BoundaryProvider`],
//! chosen once from its [`BoundarySource`] configuration: either an OSM
//! administrative relation fetched through Overpass ([`relation`]) or a
//! hand-authored polygon ([`literal`]). Both yield a single polygonal
//! [`Boundary`] feature.

pub mod literal;
pub mod relation;

use coverage_map_config::{BoundarySource, OverpassSettings};
use coverage_map_overpass::progress::ProgressCallback;
use coverage_map_overpass::{OverpassClient, OverpassError, OverpassTransport};
use geojson::{Feature, FeatureCollection};
use thiserror::Error;

/// Errors that can occur while producing a boundary.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The relation lookup returned no polygon features.
    #[error("No boundary polygon found for OSM relation {relation_id}")]
    NoBoundaryFound {
        /// Requested relation id.
        relation_id: u64,
    },

    /// The remote query failed.
    #[error(transparent)]
    Overpass(#[from] OverpassError),
}

/// A single polygonal reference feature.
#[derive(Debug, Clone)]
pub struct Boundary {
    feature: Feature,
}

impl Boundary {
    /// Wraps a feature already known to be a `Polygon` or `MultiPolygon`.
    #[must_use]
    pub const fn new(feature: Feature) -> Self {
        Self { feature }
    }

    /// Returns the boundary feature.
    #[must_use]
    pub const fn feature(&self) -> &Feature {
        &self.feature
    }

    /// Returns a one-feature collection for persistence.
    #[must_use]
    pub fn to_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: vec![self.feature.clone()],
            foreign_members: None,
        }
    }
}

/// Produces the reference boundary for a study area.
#[derive(Debug, Clone)]
pub enum BoundaryProvider {
    /// Fetch an OSM relation through Overpass.
    Relation(relation::RelationBoundary),
    /// Return a statically defined polygon.
    Literal(literal::LiteralBoundary),
}

impl BoundaryProvider {
    /// Selects the provider for a configured boundary source.
    #[must_use]
    pub fn from_source(source: &BoundarySource, settings: &OverpassSettings) -> Self {
        match source {
            BoundarySource::Relation { relation_id } => Self::Relation(
                relation::RelationBoundary::new(*relation_id, settings.query_timeout_secs),
            ),
            BoundarySource::Literal { name, ring } => {
                Self::Literal(literal::LiteralBoundary::new(name.clone(), ring.clone()))
            }
        }
    }

    /// Produces the boundary.
    ///
    /// The literal provider never touches `client`.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError`] if the relation fetch fails or yields no
    /// polygon.
    pub async fn provide<T: OverpassTransport>(
        &self,
        client: &OverpassClient<T>,
        progress: &dyn ProgressCallback,
    ) -> Result<Boundary, BoundaryError> {
        match self {
            Self::Relation(provider) => provider.fetch(client, progress).await,
            Self::Literal(provider) => Ok(provider.boundary()),
        }
    }
}
