#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Overpass API access for the coverage map pipeline.
//!
//! Builds Overpass QL queries for a bounding box and a set of tag
//! predicates ([`query`]), executes them against the public interpreter
//! with a bounded fixed-delay retry ([`client`]), and converts the raw
//! `out body geom` response into `GeoJSON` features ([`normalize`]).

pub mod client;
pub mod normalize;
pub mod progress;
pub mod query;

use thiserror::Error;

pub use client::{HttpTransport, OverpassClient, OverpassTransport};

/// A single failed attempt against the Overpass endpoint.
///
/// Always retried by [`OverpassClient`] while attempts remain.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// Transport-level failure (connection, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response.
    #[error("HTTP {status} {reason}")]
    Status {
        /// Numeric status code.
        status: u16,
        /// Canonical reason phrase.
        reason: String,
    },

    /// The response body was not valid JSON.
    #[error("Undecodable response body: {message}")]
    Decode {
        /// Parse error plus a short body preview.
        message: String,
    },

    /// Overpass answered 200 but reported a runtime error (usually a
    /// server-side timeout or memory exhaustion) in its `remark`.
    #[error("Overpass runtime error: {remark}")]
    Remark {
        /// The `remark` text.
        remark: String,
    },
}

/// Errors surfaced to callers of this crate.
#[derive(Debug, Error)]
pub enum OverpassError {
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Every attempt in the budget failed. Terminal.
    #[error("Overpass request failed after {attempts} attempt(s); last error: {last}")]
    RemoteService {
        /// Attempts performed.
        attempts: u32,
        /// The last observed failure (already part of the message).
        last: AttemptError,
    },

    /// The payload could not be converted into features.
    #[error("Normalization error: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },
}
