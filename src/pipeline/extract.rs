//! The extraction pass: PDF source → ordered annotation records.
//!
//! Pages are visited in order and annotations in index order. Each entry is
//! read, normalised, classified and handed to the [`ContinuationMerger`].
//! The pass is strictly sequential; the merger depends on it.
//!
//! Per-annotation problems (unreadable entries, unsupported native types)
//! are counted and skipped. A page whose annotation list cannot be read is
//! reported to the progress callback and skipped as well. Nothing in this
//! stage is fatal.

use super::classify::Classifier;
use super::continuation::{ContinuationMerger, MergeOutcome};
use super::normalize::{display_kind, ImageRequest, Normalizer};
use crate::config::InputParams;
use crate::output::{Annotation, ExtractionStats};
use crate::progress::ExtractionProgressCallback;
use crate::source::PdfSource;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything one extraction pass produced.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Records in page/visual order.
    pub annotations: Vec<Annotation>,
    /// Image regions to export, including those of merged annotations.
    pub image_requests: Vec<ImageRequest>,
    pub stats: ExtractionStats,
}

/// Run the extraction pass over every page of `source`.
///
/// `export_date` stamps every record and replaces missing annotation dates.
pub fn extract_annotations<S: PdfSource + ?Sized>(
    source: &S,
    params: &InputParams,
    export_date: DateTime<Utc>,
    progress: &dyn ExtractionProgressCallback,
) -> Extraction {
    let start = Instant::now();
    let total_pages = source.page_count();
    progress.on_extraction_start(total_pages);

    let normalizer = Normalizer::new(params.base_name(), params.color_mode, export_date);
    let classifier = Classifier::new(params);
    let mut merger = ContinuationMerger::new(params.concatenation_prefix.as_deref());
    let mut image_requests = Vec::new();
    let mut stats = ExtractionStats {
        pages: total_pages,
        ..Default::default()
    };

    for page in 1..=total_pages {
        let count = match source.annotation_count(page) {
            Ok(n) => n,
            Err(e) => {
                warn!("Skipping page {}: {}", page, e);
                progress.on_page_error(page, total_pages, &e.to_string());
                continue;
            }
        };

        for index in 0..count {
            stats.annotations_seen += 1;

            let raw = match source.annotation(page, index) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!("{}", e);
                    stats.skipped_invalid += 1;
                    continue;
                }
            };

            let wants_text = display_kind(raw.kind).is_some_and(|k| k.is_markup());
            let text = if wants_text {
                source.text_under_annotation(page, index)
            } else {
                None
            };

            let Some(normalized) = normalizer.normalize(&raw, page, index, text) else {
                debug!("Page {} annotation {}: unsupported type {:?}", page, index, raw.kind);
                stats.skipped_unsupported += 1;
                continue;
            };

            if let Some(request) = normalized.image {
                image_requests.push(request);
            }

            let classification = classifier.classify(&normalized.comment);
            match merger.push(normalized.annotation, &normalized.comment, classification) {
                MergeOutcome::Emitted => stats.emitted += 1,
                MergeOutcome::Merged => stats.merged += 1,
            }
        }

        progress.on_page_complete(page, total_pages, count);
    }

    stats.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} annotations from {} pages ({} merged, {} skipped)",
        stats.emitted,
        total_pages,
        stats.merged,
        stats.skipped_invalid + stats.skipped_unsupported
    );

    Extraction {
        annotations: merger.into_records(),
        image_requests,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalloutRule;
    use crate::output::AnnotationKind;
    use crate::progress::NoopProgressCallback;
    use crate::source::{
        MemoryAnnotation, MemorySource, RawAnnotation, SourceAnnotationKind, SourceRect,
    };
    use chrono::TimeZone;

    fn raw(kind: SourceAnnotationKind, comment: &str) -> RawAnnotation {
        RawAnnotation::new(kind, SourceRect::new(10.0, 20.0, 200.0, 40.0)).with_contents(comment)
    }

    fn params() -> InputParams {
        InputParams::builder()
            .pdf_input_path("/library/book.pdf")
            .task_prefix("todo:")
            .concatenation_prefix("+")
            .callout(CalloutRule::new("question", "q:"))
            .build()
            .unwrap()
    }

    fn export_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn pass_folds_continuations_and_classifies() {
        let source = MemorySource::new()
            .page(vec![
                MemoryAnnotation::new(raw(SourceAnnotationKind::Highlight, "note"))
                    .with_text("the first part"),
                MemoryAnnotation::new(raw(SourceAnnotationKind::Highlight, "+more"))
                    .with_text("the second part"),
            ])
            .page(vec![MemoryAnnotation::new(raw(
                SourceAnnotationKind::Text,
                "q: is this right? #check",
            ))]);

        let out = extract_annotations(&source, &params(), export_date(), &NoopProgressCallback);

        assert_eq!(out.annotations.len(), 2);
        assert_eq!(
            out.annotations[0].comment,
            Some(vec!["note".to_string(), "more".to_string()])
        );
        assert_eq!(out.annotations[0].annotated_text.as_ref().map(Vec::len), Some(2));

        let note = &out.annotations[1];
        assert_eq!(note.kind, AnnotationKind::Note);
        assert_eq!(note.page, 2);
        assert_eq!(note.callout_type.as_deref(), Some("question"));
        assert_eq!(note.tags, vec!["check"]);

        assert_eq!(out.stats.emitted, 2);
        assert_eq!(out.stats.merged, 1);
        assert_eq!(out.stats.annotations_seen, 3);
    }

    #[test]
    fn invalid_and_unsupported_entries_are_skipped() {
        let source = MemorySource::new().page(vec![
            MemoryAnnotation::corrupt("dangling reference"),
            MemoryAnnotation::new(raw(SourceAnnotationKind::Other, "link")),
            MemoryAnnotation::new(raw(SourceAnnotationKind::Underline, "kept")).with_text("x"),
        ]);

        let out = extract_annotations(&source, &params(), export_date(), &NoopProgressCallback);

        assert_eq!(out.annotations.len(), 1);
        assert_eq!(out.stats.skipped_invalid, 1);
        assert_eq!(out.stats.skipped_unsupported, 1);
    }

    #[test]
    fn squares_produce_image_requests() {
        let source = MemorySource::new().page(vec![
            MemoryAnnotation::new(raw(SourceAnnotationKind::Square, "figure 1")),
            MemoryAnnotation::new(raw(SourceAnnotationKind::Square, "+")),
        ]);

        let out = extract_annotations(&source, &params(), export_date(), &NoopProgressCallback);

        assert_eq!(out.image_requests.len(), 2);
        assert_eq!(out.annotations.len(), 1);
        assert_eq!(
            out.annotations[0].image_path,
            Some(vec!["book-p1-a0.png".to_string(), "book-p1-a1.png".to_string()])
        );
    }

    #[test]
    fn every_record_shares_the_export_date() {
        let source = MemorySource::new()
            .page(vec![MemoryAnnotation::new(raw(SourceAnnotationKind::Highlight, "a"))])
            .page(vec![MemoryAnnotation::new(raw(SourceAnnotationKind::StrikeOut, "b"))]);

        let out = extract_annotations(&source, &params(), export_date(), &NoopProgressCallback);

        assert_eq!(out.annotations.len(), 2);
        assert!(out.annotations.iter().all(|a| a.export_date == export_date()));
        assert_eq!(out.annotations[1].kind, AnnotationKind::Strikethrough);
    }
}
