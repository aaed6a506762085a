//! Progress-callback trait for per-guide batch events.
//!
//! Inject an [`Arc<dyn GuideProgressCallback>`] via
//! [`crate::config::GuideConfigBuilder::progress_callback`] to receive events
//! as the batch driver assembles and renders each certification (or page).
//!
//! The CLI forwards these events to an `indicatif` progress bar; library
//! callers can forward them anywhere. The trait is `Send + Sync` because with
//! `jobs > 1` several guides render concurrently.
//!
//! # Example
//!
//! ```rust
//! use certbook::{GuideConfig, GuideProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl GuideProgressCallback for CountingCallback {
//!     fn on_guide_complete(&self, index: usize, total: usize, name: &str, _engine: &str) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("[{}/{}] {} ({} done)", index, total, name, n);
//!     }
//! }
//!
//! let config = GuideConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch driver as it processes each unit.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based.
pub trait GuideProgressCallback: Send + Sync {
    /// Called once before any unit is processed.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when a unit starts assembling.
    fn on_guide_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a unit was rendered; `engine` names the winning strategy.
    fn on_guide_complete(&self, index: usize, total: usize, name: &str, engine: &str) {
        let _ = (index, total, name, engine);
    }

    /// Called when every strategy failed for a unit.
    fn on_guide_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once after every unit has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// The default when no callback is configured.
pub struct NoopProgressCallback;

impl GuideProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GuideConfig`].
pub type ProgressCallback = Arc<dyn GuideProgressCallback>;
