//! [`PdfSource`] over `pdfium-render`.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! Callers in [`crate::convert`] bind pdfium, open the document and run the
//! whole extraction pass inside one `tokio::task::spawn_blocking` closure;
//! the bindings, document and every page handle are dropped when that
//! closure returns, on success and on failure alike.

use super::{PdfSource, RawAnnotation, Rgb, SourceAnnotationKind, SourceDate, SourceRect};
use crate::error::{HighlightsError, SourceError};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Bind to a pdfium library.
///
/// Resolution order: `PDFIUM_LIB_PATH` (a directory holding the platform
/// library), the current directory, then the system library search path.
pub fn bind_pdfium() -> Result<Pdfium, HighlightsError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(dir) if !dir.is_empty() => {
            debug!("Binding pdfium from PDFIUM_LIB_PATH={}", dir);
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| HighlightsError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// An open PDF document read through pdfium.
pub struct PdfiumSource<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumSource<'a> {
    /// Open `path` with already-bound pdfium.
    pub fn open(pdfium: &'a Pdfium, path: &Path) -> Result<Self, HighlightsError> {
        let document =
            pdfium
                .load_pdf_from_file(path, None)
                .map_err(|e| HighlightsError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: format!("{:?}", e),
                })?;

        info!("PDF loaded: {} pages", document.pages().len());

        Ok(Self { document })
    }

    fn page(&self, page: usize) -> Result<PdfPage<'a>, SourceError> {
        let index = page
            .checked_sub(1)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or_else(|| SourceError::PageUnavailable {
                page,
                detail: "page number out of range".to_string(),
            })?;

        self.document
            .pages()
            .get(index)
            .map_err(|e| SourceError::PageUnavailable {
                page,
                detail: format!("{:?}", e),
            })
    }
}

impl PdfSource for PdfiumSource<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn annotation_count(&self, page: usize) -> Result<usize, SourceError> {
        Ok(self.page(page)?.annotations().len())
    }

    fn annotation(&self, page: usize, index: usize) -> Result<RawAnnotation, SourceError> {
        let invalid = |detail: String| SourceError::InvalidAnnotation {
            page,
            index,
            detail,
        };

        let pdf_page = self.page(page)?;
        let annotation = pdf_page
            .annotations()
            .get(index)
            .map_err(|e| invalid(format!("{:?}", e)))?;

        let bounds = annotation
            .bounds()
            .map_err(|e| invalid(format!("no bounds: {:?}", e)))?;

        // The markup color lives in /C, which pdfium exposes as the stroke color.
        let color = annotation
            .stroke_color()
            .or_else(|_| annotation.fill_color())
            .ok()
            .map(|c| Rgb::new(c.red(), c.green(), c.blue()));

        let date = annotation
            .modification_date()
            .or_else(|| annotation.creation_date())
            .and_then(|raw| SourceDate::parse_pdf_date(&raw));

        Ok(RawAnnotation {
            kind: native_kind(annotation.annotation_type()),
            contents: annotation.contents(),
            color,
            date,
            rect: SourceRect::new(
                bounds.left().value,
                bounds.bottom().value,
                bounds.right().value,
                bounds.top().value,
            ),
        })
    }

    fn text_under_annotation(&self, page: usize, index: usize) -> Option<String> {
        let pdf_page = self.page(page).ok()?;
        let annotation = pdf_page.annotations().get(index).ok()?;
        let text = pdf_page.text().ok()?;

        match text.for_annotation(&annotation) {
            Ok(s) if !s.trim().is_empty() => Some(s),
            Ok(_) => None,
            Err(e) => {
                debug!("No text under page {} annotation {}: {:?}", page, index, e);
                None
            }
        }
    }

    fn render_region(
        &self,
        page: usize,
        rect: &SourceRect,
        dpi: u32,
        target: &Path,
    ) -> Result<(), SourceError> {
        let render_failed = |detail: String| SourceError::RenderFailed {
            page,
            path: target.to_path_buf(),
            detail,
        };

        let pdf_page = self.page(page)?;
        let scale = dpi as f32 / 72.0;
        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

        let bitmap = pdf_page
            .render_with_config(&render_config)
            .map_err(|e| render_failed(format!("{:?}", e)))?;
        let rendered = bitmap.as_image();

        // PDF space has its origin bottom-left; bitmaps top-left.
        let page_height = pdf_page.height().value;
        let x = ((rect.left() * scale).max(0.0) as u32).min(rendered.width());
        let y = (((page_height - rect.top()) * scale).max(0.0) as u32).min(rendered.height());
        let w = ((rect.width() * scale).round() as u32).min(rendered.width() - x);
        let h = ((rect.height() * scale).round() as u32).min(rendered.height() - y);

        if w == 0 || h == 0 {
            return Err(render_failed("empty clip region".to_string()));
        }

        rendered
            .crop_imm(x, y, w, h)
            .save_with_format(target, image::ImageFormat::Png)
            .map_err(|e| render_failed(e.to_string()))?;

        debug!("Rendered page {} region {}x{} px → {}", page, w, h, target.display());
        Ok(())
    }
}

fn native_kind(kind: PdfPageAnnotationType) -> SourceAnnotationKind {
    match kind {
        PdfPageAnnotationType::Text => SourceAnnotationKind::Text,
        PdfPageAnnotationType::Underline => SourceAnnotationKind::Underline,
        PdfPageAnnotationType::Highlight => SourceAnnotationKind::Highlight,
        PdfPageAnnotationType::Strikeout => SourceAnnotationKind::StrikeOut,
        PdfPageAnnotationType::Square => SourceAnnotationKind::Square,
        _ => SourceAnnotationKind::Other,
    }
}
