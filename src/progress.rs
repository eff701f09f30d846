//! Progress-callback trait for per-page extraction events.
//!
//! Pass an [`Arc<dyn ExtractionProgressCallback>`] to
//! [`crate::extract_with_progress`] (or any `*_with_progress` entry point)
//! to receive events as the extraction pass walks the document.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a terminal progress bar, a log, or a
//! channel without the library knowing how the host application
//! communicates. The trait is `Send + Sync` because extraction runs on a
//! blocking worker thread, not on the caller's task.
//!
//! # Example
//!
//! ```rust
//! use pdf_highlights::ExtractionProgressCallback;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     annotations: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, annotations: usize) {
//!         self.annotations.fetch_add(annotations, Ordering::SeqCst);
//!         eprintln!("Page {}/{}: {} annotations", page_num, total_pages, annotations);
//!     }
//! }
//!
//! let cb: Arc<dyn ExtractionProgressCallback> = Arc::new(CountingCallback {
//!     annotations: AtomicUsize::new(0),
//! });
//! cb.on_page_complete(1, 3, 2);
//! ```

use crate::output::ExtractionStats;
use std::sync::Arc;

/// Called by the extraction pass as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are processed strictly in order, so events
/// never arrive concurrently.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after the document is opened.
    ///
    /// # Arguments
    /// * `total_pages`: number of pages that will be visited
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when every annotation on a page has been processed.
    ///
    /// # Arguments
    /// * `page_num`   : 1-indexed page number
    /// * `total_pages`: total pages
    /// * `annotations`: physical annotation entries found on the page
    fn on_page_complete(&self, page_num: usize, total_pages: usize, annotations: usize) {
        let _ = (page_num, total_pages, annotations);
    }

    /// Called when a page's annotation list cannot be read. The page is
    /// skipped and the pass continues.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the pass (and image export) finished.
    fn on_extraction_complete(&self, stats: &ExtractionStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Shared handle to a progress callback.
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

/// The callback used when none is supplied.
pub fn noop() -> ProgressCallback {
    Arc::new(NoopProgressCallback)
}
