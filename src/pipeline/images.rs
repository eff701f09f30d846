//! Image export: the effect step for [`ImageRequest`]s.
//!
//! Rendering runs through the same [`PdfSource`] as extraction, on the same
//! thread, after the pass has finished. Failures are counted and logged; a
//! missing image never aborts the run.

use super::normalize::ImageRequest;
use crate::config::InputParams;
use crate::source::PdfSource;
use tracing::{debug, info, warn};

/// Counts from one export step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageExportReport {
    pub written: usize,
    pub failed: usize,
}

/// Render every request into `params.asset_dir()`.
///
/// Does nothing when `noWrite` is set or there is nothing to render.
pub fn export_images<S: PdfSource + ?Sized>(
    source: &S,
    params: &InputParams,
    requests: &[ImageRequest],
) -> ImageExportReport {
    let mut report = ImageExportReport::default();
    if requests.is_empty() {
        return report;
    }
    if params.no_write {
        debug!("noWrite set, skipping {} image regions", requests.len());
        return report;
    }

    let dir = params.asset_dir();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!("Cannot create asset directory {}: {}", dir.display(), e);
        report.failed = requests.len();
        return report;
    }

    for request in requests {
        let target = dir.join(&request.file_name);
        match source.render_region(request.page, &request.rect, params.image_dpi, &target) {
            Ok(()) => report.written += 1,
            Err(e) => {
                warn!("{}", e);
                report.failed += 1;
            }
        }
    }

    info!(
        "Exported {} image regions to {} ({} failed)",
        report.written,
        dir.display(),
        report.failed
    );
    report
}
