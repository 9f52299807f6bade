#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the coverage map toolchain.
//!
//! Provides `indicatif` spinners behind the [`ProgressCallback`] trait,
//! plus [`init_logger`] which sets up `indicatif-log-bridge` so that
//! `log::info!` and friends are suspended while spinners redraw.

use std::sync::Arc;
use std::time::Duration;

use coverage_map_overpass::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// An `indicatif` spinner that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    /// Creates a spinner for a fetch whose duration is unknown up front.
    #[must_use]
    pub fn spinner(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        Arc::new(Self { bar })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// Defaults to `info` when `RUST_LOG` is unset. Returns the
/// [`MultiProgress`] that all spinners must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    // Build the pretty-env-logger logger manually so we can wrap it.
    let logger = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // Ignore error if logger was already set (e.g., in tests)

    log::set_max_level(level);

    multi
}
