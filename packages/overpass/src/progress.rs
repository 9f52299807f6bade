//! Progress reporting trait for remote fetches.
//!
//! Decouples attempt/wait notices from any rendering backend (e.g.
//! `indicatif` spinners, or silence). Implementations are provided
//! upstream in crates that choose a rendering strategy.

use std::sync::Arc;

/// Trait for reporting progress from long-running fetches.
///
/// Implementations must be `Send + Sync` so a callback can be shared
/// across concurrently running fetch tasks.
pub trait ProgressCallback: Send + Sync {
    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);

    /// Mark progress as complete and remove the progress indicator.
    fn finish_and_clear(&self);
}

/// A no-op implementation of [`ProgressCallback`].
///
/// Useful for tests and callers that only want log output.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
