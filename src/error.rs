//! Error types for the pdf-highlights library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`HighlightsError`] is **fatal**: the run cannot proceed at all (bad
//!   configuration, unreadable PDF, output file cannot be written). Returned
//!   as `Err(HighlightsError)` from the top-level entry points in
//!   [`crate::convert`].
//!
//! * [`SourceError`] is **non-fatal**: one annotation entry is corrupt, one
//!   page cannot be read or one image region fails to render. The extraction
//!   pass logs it, counts it in [`crate::output::ExtractionStats`] and moves
//!   on to the next annotation.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-highlights library.
#[derive(Debug, Error)]
pub enum HighlightsError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The JSON configuration could not be parsed.
    #[error("Invalid configuration JSON: {0}")]
    ConfigParse(#[source] serde_json::Error),

    /// A required parameter was not supplied.
    #[error("Missing required parameter '{name}'")]
    MissingParameter { name: &'static str },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Target PDF does not exist: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF source could not open or parse the document.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH to the directory containing libpdfium, or install\n\
pdfium system-wide so it can be found by the dynamic loader.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The previously exported Markdown file exists but could not be read.
    #[error("Failed to read existing notes '{path}': {source}")]
    OutputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error raised by a [`crate::source::PdfSource`].
///
/// The extraction pass never aborts on these; the offending entry is skipped.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SourceError {
    /// The page could not be loaded.
    #[error("Page {page}: unavailable: {detail}")]
    PageUnavailable { page: usize, detail: String },

    /// The annotation entry is stale, corrupt or otherwise unreadable.
    #[error("Page {page}, annotation {index}: invalid: {detail}")]
    InvalidAnnotation {
        page: usize,
        index: usize,
        detail: String,
    },

    /// Region rendering or PNG encoding failed.
    #[error("Page {page}: image export to '{path}' failed: {detail}")]
    RenderFailed {
        page: usize,
        path: PathBuf,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_not_found_display() {
        let e = HighlightsError::FileNotFound {
            path: PathBuf::from("/tmp/missing.pdf"),
        };
        assert!(e.to_string().contains("missing.pdf"), "got: {e}");
    }

    #[test]
    fn missing_parameter_display() {
        let e = HighlightsError::MissingParameter {
            name: "pdfInputPath",
        };
        assert!(e.to_string().contains("pdfInputPath"));
    }

    #[test]
    fn invalid_annotation_display() {
        let e = SourceError::InvalidAnnotation {
            page: 3,
            index: 7,
            detail: "bad dictionary".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 3"), "got: {msg}");
        assert!(msg.contains("annotation 7"), "got: {msg}");
    }

    #[test]
    fn render_failed_display() {
        let e = SourceError::RenderFailed {
            page: 2,
            path: PathBuf::from("book-p2-a0.png"),
            detail: "bitmap".into(),
        };
        assert!(e.to_string().contains("book-p2-a0.png"));
    }
}
