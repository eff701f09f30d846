//! # pdf-highlights
//!
//! Turn PDF reader annotations (highlights, underlines, strikeouts, notes and
//! image-region marks) into structured records and into Markdown notes that
//! can be re-exported incrementally.
//!
//! ## Why incremental?
//!
//! Notes get edited. Re-running the export on a document must never
//! duplicate an annotation that is already in the note, and must never
//! clobber what the user wrote below it. The exported part of a note is
//! therefore kept verbatim and only annotations made since the last export
//! are appended, under a new `### Exported:` section.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate path and %PDF magic bytes
//!  ├─ 2. Extract   sequential pass via pdfium (spawn_blocking)
//!  │               normalise → classify → fold continuations
//!  ├─ 3. Images    render square annotations to PNG (unless noWrite)
//!  ├─ 4. Group     sort, group by tag/date/color, collect callouts
//!  └─ 5. Output    JSON on stdout, or merge into <outputPath>/<baseName>.md
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_highlights::{run, InputParams, RunOutput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let params = InputParams::from_json(r#"{
//!         "pdfInputPath": "papers/attention.pdf",
//!         "assetOutputPath": "vault/assets",
//!         "outputPath": "vault/literature",
//!         "taskPrefix": "todo:",
//!         "concatenationPrefix": "+",
//!         "calloutPrefixes": [{"type": "question", "prefix": "q:"}]
//!     }"#)?;
//!     let report = run(&params).await?;
//!     if let RunOutput::Markdown { path, export } = report.output {
//!         eprintln!("{}: {} new annotations", path.display(), export.new_annotations);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `highlights` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-highlights = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! Reading PDFs needs a pdfium shared library. It is looked up in
//! `PDFIUM_LIB_PATH`, then the current directory, then the system library
//! path. [`source::MemorySource`] runs the whole pipeline without it.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod source;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CalloutRule, ColorMode, GroupBy, InputParams, InputParamsBuilder, SortBy};
pub use convert::{
    export_json, export_markdown, extract, extract_from_bytes, extract_from_source,
    extract_with_progress, run, run_sync, run_with_progress,
};
pub use error::{HighlightsError, SourceError};
pub use output::{
    Annotation, AnnotationData, AnnotationKind, ExtractionOutput, ExtractionStats,
    MarkdownExport, RunOutput, RunReport,
};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use source::{MemoryAnnotation, MemorySource, PdfSource, PdfiumSource};
