//! Fetch, filter, snapshot, summarize.
//!
//! The target and boundary fetches are independent and run concurrently;
//! the filter waits on both. Snapshots are only written once every stage
//! has succeeded, and the summary is computed from what was written.

use std::sync::Arc;

use coverage_map_boundary::{BoundaryError, BoundaryProvider};
use coverage_map_cli_utils::{IndicatifProgress, MultiProgress};
use coverage_map_config::{AreaUnits, ConfigError, PipelineSettings, StudyArea};
use coverage_map_coverage::{CoverageAggregator, CoverageError, SphericalGeometry, filter_intersecting};
use coverage_map_overpass::progress::ProgressCallback;
use coverage_map_overpass::query::build_query;
use coverage_map_overpass::{OverpassClient, OverpassError, OverpassTransport, normalize};
use coverage_map_snapshot::{SnapshotError, SnapshotStore};
use thiserror::Error;

use crate::report::CoverageReport;

/// Any failure that aborts a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Overpass(#[from] OverpassError),

    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    #[error(transparent)]
    Coverage(#[from] CoverageError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Runs the whole pipeline for the area selected in the environment.
///
/// # Errors
///
/// Returns the first [`PipelineError`] raised by any stage. Nothing is
/// written to disk unless both fetches succeed.
pub async fn run(
    multi: &MultiProgress,
    settings: &PipelineSettings,
) -> Result<CoverageReport, PipelineError> {
    let area = coverage_map_config::registry::find(&coverage_map_config::selected_area_id())?;
    log::info!("Study area: {} ({})", area.name, area.id);

    let client = OverpassClient::from_settings(&settings.overpass)?;
    let store = SnapshotStore::for_area(&area.id);

    let targets_progress = IndicatifProgress::spinner(multi, "Fetching target features...");
    let boundary_progress = IndicatifProgress::spinner(multi, "Fetching boundary...");

    let result = acquire(
        &client,
        &area,
        settings,
        &store,
        targets_progress.clone(),
        boundary_progress.clone(),
    )
    .await;

    if let Err(e) = &result {
        log::error!("Acquisition failed: {e}");
        targets_progress.finish_and_clear();
        boundary_progress.finish_and_clear();
    }
    result?;

    summarize(&store, &area, settings.units)
}

/// Fetches targets and boundary, filters, and writes the snapshot.
async fn acquire<T: OverpassTransport>(
    client: &OverpassClient<T>,
    area: &StudyArea,
    settings: &PipelineSettings,
    store: &SnapshotStore,
    targets_progress: Arc<dyn ProgressCallback>,
    boundary_progress: Arc<dyn ProgressCallback>,
) -> Result<(), PipelineError> {
    let provider = BoundaryProvider::from_source(&area.boundary, &settings.overpass);
    let query = build_query(&area.bbox, &area.tags, settings.overpass.query_timeout_secs);
    log::debug!("Target query:\n{query}");

    let targets_label = format!("{} features", area.feature_label);
    let fetch_targets = async {
        let payload = client
            .execute(&query, &targets_label, targets_progress.as_ref())
            .await?;
        let targets = normalize::retain_polygons(normalize::to_feature_collection(&payload)?);
        targets_progress.finish(format!(
            "Fetched {} {} polygon(s)",
            targets.features.len(),
            area.feature_label
        ));
        Ok::<_, PipelineError>(targets)
    };
    let fetch_boundary = async {
        let boundary = provider.provide(client, boundary_progress.as_ref()).await?;
        boundary_progress.finish("Boundary ready".to_string());
        Ok::<_, PipelineError>(boundary)
    };

    let (targets, boundary) = tokio::try_join!(fetch_targets, fetch_boundary)?;
    log::info!(
        "Fetched {} {} polygon(s)",
        targets.features.len(),
        area.feature_label
    );

    let targets = if area.filter_to_boundary {
        filter_intersecting(&targets, boundary.feature(), &SphericalGeometry)?
    } else {
        targets
    };

    store.write(&targets, &boundary.to_collection())?;
    Ok(())
}

/// Reloads the snapshot and computes the report.
fn summarize(
    store: &SnapshotStore,
    area: &StudyArea,
    units: AreaUnits,
) -> Result<CoverageReport, PipelineError> {
    let snapshot = store.read()?;
    let stats = CoverageAggregator::new(SphericalGeometry, units)
        .aggregate(&snapshot.boundary, &snapshot.targets)?;
    log::info!(
        "{}: {:.1}% covered by {} {} feature(s)",
        area.name,
        stats.coverage_percent,
        stats.target_count,
        area.feature_label
    );
    Ok(CoverageReport::new(area, stats))
}
