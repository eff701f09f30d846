//! Top-level entry points: extract, export as JSON, export as Markdown.
//!
//! ## Why split extraction from export?
//!
//! Extraction needs pdfium and runs on a blocking thread; both exports are
//! pure functions of the extracted records (plus, for Markdown, the prior
//! note on disk). Keeping them apart lets callers extract once and export
//! several ways, and lets tests drive exports without a PDF at all.
//!
//! [`run`] is the whole invocation contract in one call: it extracts, then
//! prints-ready JSON when no `outputPath` is configured, else merges into
//! `<outputPath>/<baseName>.md`.

use crate::config::InputParams;
use crate::error::HighlightsError;
use crate::output::{
    Annotation, AnnotationData, ExtractionOutput, MarkdownExport, RunOutput, RunReport,
};
use crate::pipeline::{extract, group, images, input, markdown};
use crate::progress::{self, ExtractionProgressCallback, ProgressCallback};
use crate::source::{pdfium::bind_pdfium, PdfSource, PdfiumSource};
use chrono::{DateTime, Local, SubsecRound, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extract every annotation from `params.pdf_input_path`.
///
/// Image regions are exported as a side effect unless `noWrite` is set.
///
/// # Errors
/// Returns `Err(HighlightsError)` only for fatal errors:
/// - Invalid configuration
/// - File not found / permission denied / not a PDF
/// - pdfium cannot be bound or cannot open the document
pub async fn extract(params: &InputParams) -> Result<ExtractionOutput, HighlightsError> {
    extract_with_progress(params, progress::noop()).await
}

/// [`extract`] with page-level progress events.
pub async fn extract_with_progress(
    params: &InputParams,
    progress: ProgressCallback,
) -> Result<ExtractionOutput, HighlightsError> {
    params.validate()?;
    let path = input::resolve_input(&params.pdf_input_path)?;
    extract_path(path, params, progress).await
}

/// Extract annotations from PDF bytes held in memory.
///
/// The bytes are written to a managed [`tempfile`] that is removed on
/// return. Names (image files, links) still derive from
/// `params.pdf_input_path`, which need not exist.
pub async fn extract_from_bytes(
    bytes: &[u8],
    params: &InputParams,
) -> Result<ExtractionOutput, HighlightsError> {
    params.validate()?;
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| HighlightsError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| HighlightsError::Internal(format!("tempfile write: {e}")))?;
    let path = input::resolve_input(tmp.path())?;
    // `tmp` is dropped (and the file deleted) when extraction returns
    extract_path(path, params, progress::noop()).await
}

/// Run the extraction pass and image export against any [`PdfSource`].
///
/// This is the synchronous core used by [`extract`]; call it directly with
/// a [`crate::source::MemorySource`] or a custom reader.
pub fn extract_from_source<S: PdfSource + ?Sized>(
    source: &S,
    params: &InputParams,
    export_date: DateTime<Utc>,
    progress: &dyn ExtractionProgressCallback,
) -> ExtractionOutput {
    let extraction = extract::extract_annotations(source, params, export_date, progress);
    let report = images::export_images(source, params, &extraction.image_requests);

    let mut stats = extraction.stats;
    stats.images_written = report.written;
    stats.images_failed = report.failed;
    progress.on_extraction_complete(&stats);

    ExtractionOutput {
        annotations: extraction.annotations,
        stats,
        export_date,
    }
}

/// The JSON view: `lastExportDate` filter, sort, group, callouts.
pub fn export_json(params: &InputParams, annotations: Vec<Annotation>) -> AnnotationData {
    group::prepare_annotation_data(params, annotations)
}

/// Merge `annotations` into `<outputPath>/<baseName>.md` and write it.
///
/// An existing note is read first; its exported block is preserved and only
/// annotations dated at or after its last export marker are added. The new
/// file is written atomically (temp file + rename).
pub async fn export_markdown(
    params: &InputParams,
    annotations: Vec<Annotation>,
    export_date: DateTime<Utc>,
) -> Result<(PathBuf, MarkdownExport), HighlightsError> {
    let path = params
        .markdown_path()
        .ok_or(HighlightsError::MissingParameter { name: "outputPath" })?;

    let prior = read_prior(&path).await?;
    let export = markdown::build_markdown(params, annotations, prior.as_deref(), export_date);
    write_atomic(&path, &export.markdown).await?;

    info!(
        "Wrote {} ({} new annotations)",
        path.display(),
        export.new_annotations
    );
    Ok((path, export))
}

/// Extract, then export in the mode `params` selects.
pub async fn run(params: &InputParams) -> Result<RunReport, HighlightsError> {
    run_with_progress(params, progress::noop()).await
}

/// [`run`] with page-level progress events.
pub async fn run_with_progress(
    params: &InputParams,
    progress: ProgressCallback,
) -> Result<RunReport, HighlightsError> {
    let extracted = extract_with_progress(params, progress).await?;

    let output = if params.output_path.is_some() {
        let (path, export) =
            export_markdown(params, extracted.annotations, extracted.export_date).await?;
        RunOutput::Markdown { path, export }
    } else {
        RunOutput::Json(export_json(params, extracted.annotations))
    };

    Ok(RunReport {
        output,
        stats: extracted.stats,
    })
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(params: &InputParams) -> Result<RunReport, HighlightsError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| HighlightsError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(params))
}

/// The run's export instant: local wall-clock time, whole seconds.
pub fn export_instant() -> DateTime<Utc> {
    Local::now().naive_local().and_utc().trunc_subsecs(0)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn extract_path(
    path: PathBuf,
    params: &InputParams,
    progress: ProgressCallback,
) -> Result<ExtractionOutput, HighlightsError> {
    let export_date = export_instant();
    let params = params.clone();
    info!("Extracting annotations: {}", path.display());

    // pdfium bindings, document and pages live and die on this thread.
    tokio::task::spawn_blocking(move || -> Result<ExtractionOutput, HighlightsError> {
        let pdfium = bind_pdfium()?;
        let source = PdfiumSource::open(&pdfium, &path)?;
        Ok(extract_from_source(
            &source,
            &params,
            export_date,
            progress.as_ref(),
        ))
    })
    .await
    .map_err(|e| HighlightsError::Internal(format!("Extraction task panicked: {}", e)))?
}

async fn read_prior(path: &Path) -> Result<Option<String>, HighlightsError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            debug!("Merging into existing note {}", path.display());
            Ok(Some(text))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(HighlightsError::OutputReadFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), HighlightsError> {
    let write_failed = |e: std::io::Error| HighlightsError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;
    Ok(())
}
