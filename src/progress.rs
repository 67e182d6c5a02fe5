//! Progress-callback trait for render stage events.
//!
//! Inject an [`Arc<dyn RenderProgressCallback>`] via
//! [`crate::config::RenderConfigBuilder::progress_callback`] to receive
//! events as a render moves through its stages. The CLI uses it to drive a
//! spinner; a server could forward the events to a WebSocket instead.
//!
//! # Example
//!
//! ```rust
//! use mdstory::{RenderConfig, RenderProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct StageLogger;
//!
//! impl RenderProgressCallback for StageLogger {
//!     fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
//!         eprintln!("{stage} finished in {elapsed_ms}ms");
//!     }
//! }
//!
//! let config = RenderConfig::builder()
//!     .progress_callback(Arc::new(StageLogger) as Arc<dyn RenderProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use std::sync::Arc;

/// Called by the renderer as it moves through its stages.
///
/// Implementations must be `Send + Sync`: one callback may be shared by
/// renders running concurrently on different tasks. All methods default to
/// no-ops so callers only override what they care about.
pub trait RenderProgressCallback: Send + Sync {
    /// Called once per render, before the workspace is acquired.
    fn on_render_start(&self) {}

    /// Called just before a stage starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    ///
    /// # Arguments
    /// * `stage`      — the stage that completed
    /// * `elapsed_ms` — wall-clock duration of the stage
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called when a stage fails; the render is aborted afterwards.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once after every page has been collected.
    ///
    /// # Arguments
    /// * `page_count` — number of images produced
    fn on_render_complete(&self, page_count: usize) {
        let _ = page_count;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RenderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RenderConfig`].
pub type ProgressCallback = Arc<dyn RenderProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCallback {
        events: Mutex<Vec<String>>,
    }

    impl RenderProgressCallback for RecordingCallback {
        fn on_render_start(&self) {
            self.events.lock().unwrap().push("start".into());
        }

        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("begin {stage}"));
        }

        fn on_stage_complete(&self, stage: Stage, _elapsed_ms: u64) {
            self.events.lock().unwrap().push(format!("end {stage}"));
        }

        fn on_render_complete(&self, page_count: usize) {
            self.events.lock().unwrap().push(format!("done {page_count}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_render_start();
        cb.on_stage_start(Stage::Layout);
        cb.on_stage_complete(Stage::Layout, 12);
        cb.on_stage_error(Stage::Raster, "boom");
        cb.on_render_complete(2);
    }

    #[test]
    fn recording_callback_sees_events_in_order() {
        let cb = RecordingCallback::default();
        cb.on_render_start();
        cb.on_stage_start(Stage::Layout);
        cb.on_stage_complete(Stage::Layout, 5);
        cb.on_stage_start(Stage::Raster);
        cb.on_stage_complete(Stage::Raster, 7);
        cb.on_render_complete(3);

        let events = cb.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start",
                "begin layout",
                "end layout",
                "begin raster",
                "end raster",
                "done 3"
            ]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(Stage::Collect);
        cb.on_render_complete(1);
    }
}
