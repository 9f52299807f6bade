#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Study area definitions and pipeline settings.
//!
//! A study area names the bounding box to query, the tag predicates that
//! identify target features, and how the reference boundary is obtained.
//! Areas are TOML files embedded at compile time (see [`registry`]).
//!
//! [`PipelineSettings`] carries the process-wide constants (endpoint,
//! attempt budget, retry delay, unit conversion). It is built once at
//! startup and passed by reference; nothing mutates it afterwards.

pub mod registry;

use std::time::Duration;

use coverage_map_overpass_models::{BoundingBox, TagPredicate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable selecting the study area id.
pub const AREA_ENV_VAR: &str = "COVERAGE_MAP_AREA";

/// Environment variable overriding the Overpass endpoint.
pub const OVERPASS_URL_ENV_VAR: &str = "COVERAGE_MAP_OVERPASS_URL";

/// Study area used when [`AREA_ENV_VAR`] is unset.
pub const DEFAULT_AREA_ID: &str = "wilmington";

/// Public Overpass API interpreter endpoint.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Total attempts (first call included) before giving up on a query.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Fixed cool-down between failed attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Server-side execution budget embedded in every query.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u32 = 60;

/// Square meters in one square mile. Must not be rounded further.
pub const SQ_METERS_PER_SQ_MILE: f64 = 2_589_988.11;

/// Acres in one square mile.
pub const ACRES_PER_SQ_MILE: f64 = 640.0;

/// Errors that can occur while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No study area with the requested id is registered.
    #[error("Unknown study area '{id}' (available: {available})")]
    UnknownStudyArea {
        /// Requested id.
        id: String,
        /// Comma-separated list of registered ids.
        available: String,
    },

    /// An embedded study area definition failed to parse.
    #[error("Failed to parse study area '{name}': {source}")]
    Parse {
        /// Registry entry name.
        name: String,
        /// Underlying TOML error.
        source: Box<toml::de::Error>,
    },

    /// A study area parsed but violates a structural requirement.
    #[error("Invalid study area '{id}': {message}")]
    Invalid {
        /// Study area id.
        id: String,
        /// Description of the problem.
        message: String,
    },
}

/// A region of interest and the features to measure within it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyArea {
    /// Unique identifier (e.g. `"wilmington"`); also the snapshot directory.
    pub id: String,
    /// Human-readable name (e.g. "Wilmington, DE").
    pub name: String,
    /// Short label for the target feature class (e.g. "parking").
    pub feature_label: String,
    /// Area to query for target features.
    pub bbox: BoundingBox,
    /// Tag predicates, unioned.
    pub tags: Vec<TagPredicate>,
    /// Whether target features are clipped to those intersecting the
    /// boundary before being written.
    #[serde(default = "default_true")]
    pub filter_to_boundary: bool,
    /// How the reference boundary polygon is produced.
    pub boundary: BoundarySource,
}

const fn default_true() -> bool {
    true
}

impl StudyArea {
    /// Checks the structural requirements the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the bounding box is not
    /// correctly ordered, no tag predicates are configured, or a literal
    /// boundary ring is not closed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::Invalid {
            id: self.id.clone(),
            message: message.to_string(),
        };

        if !self.bbox.is_valid() {
            return Err(invalid("bounding box must satisfy south < north and west < east"));
        }
        if self.tags.is_empty() {
            return Err(invalid("at least one tag predicate is required"));
        }
        if let BoundarySource::Literal { ring, .. } = &self.boundary {
            if ring.len() < 4 {
                return Err(invalid("literal boundary ring needs at least 4 positions"));
            }
            if ring.first() != ring.last() {
                return Err(invalid("literal boundary ring must be closed"));
            }
        }

        Ok(())
    }
}

/// How to obtain the reference boundary polygon.
///
/// Selected once per study area; the pipeline never branches on the
/// strategy itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundarySource {
    /// An OSM administrative boundary relation fetched from Overpass.
    Relation {
        /// OSM relation id (e.g. `369472` for Wilmington, DE).
        relation_id: u64,
    },
    /// A hand-authored polygon, no remote call.
    Literal {
        /// Name stored on the boundary feature.
        name: String,
        /// Closed exterior ring of `[lon, lat]` positions.
        ring: Vec<[f64; 2]>,
    },
}

/// Remote query settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverpassSettings {
    /// Interpreter endpoint URL.
    pub url: String,
    /// Total attempts per query, including the first.
    pub max_attempts: u32,
    /// Fixed wait between failed attempts.
    pub retry_delay: Duration,
    /// Server-side timeout embedded in each query, in seconds.
    pub query_timeout_secs: u32,
}

impl Default for OverpassSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_OVERPASS_URL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

/// Area unit conversion factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaUnits {
    /// Square meters per square mile.
    pub sq_meters_per_sq_mile: f64,
    /// Acres per square mile.
    pub acres_per_sq_mile: f64,
}

impl Default for AreaUnits {
    fn default() -> Self {
        Self {
            sq_meters_per_sq_mile: SQ_METERS_PER_SQ_MILE,
            acres_per_sq_mile: ACRES_PER_SQ_MILE,
        }
    }
}

impl AreaUnits {
    /// Converts square meters to square miles.
    #[must_use]
    pub fn sq_miles(&self, sq_meters: f64) -> f64 {
        sq_meters / self.sq_meters_per_sq_mile
    }

    /// Converts square miles to acres.
    #[must_use]
    pub fn acres(&self, sq_miles: f64) -> f64 {
        sq_miles * self.acres_per_sq_mile
    }
}

/// Immutable process-wide settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSettings {
    /// Remote query settings.
    pub overpass: OverpassSettings,
    /// Unit conversion factors.
    pub units: AreaUnits,
}

impl PipelineSettings {
    /// Builds settings from defaults plus the [`OVERPASS_URL_ENV_VAR`]
    /// override.
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(url) = std::env::var(OVERPASS_URL_ENV_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            log::info!("Using Overpass endpoint from {OVERPASS_URL_ENV_VAR}: {url}");
            settings.overpass.url = url;
        }
        settings
    }
}

/// Returns the study area id requested via [`AREA_ENV_VAR`], or
/// [`DEFAULT_AREA_ID`].
#[must_use]
pub fn selected_area_id() -> String {
    std::env::var(AREA_ENV_VAR)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_AREA_ID.to_string())
}
