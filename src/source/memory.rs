//! [`PdfSource`] backed by annotations held in memory.
//!
//! Each page is a list of [`MemoryAnnotation`] entries. An entry may be
//! marked corrupt to exercise the pipeline's skip path. `render_region`
//! writes a blank PNG of the clip size so image export has a real file to
//! produce.

use super::{PdfSource, RawAnnotation, SourceRect};
use crate::error::SourceError;
use image::{Rgb, RgbImage};
use std::path::Path;

/// One annotation slot on an in-memory page.
#[derive(Debug, Clone)]
pub struct MemoryAnnotation {
    entry: Result<RawAnnotation, String>,
    text: Option<String>,
}

impl MemoryAnnotation {
    pub fn new(raw: RawAnnotation) -> Self {
        Self {
            entry: Ok(raw),
            text: None,
        }
    }

    /// A slot whose dictionary cannot be read.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self {
            entry: Err(detail.into()),
            text: None,
        }
    }

    /// Text lying under the annotation's region.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

impl From<RawAnnotation> for MemoryAnnotation {
    fn from(raw: RawAnnotation) -> Self {
        Self::new(raw)
    }
}

/// A whole document held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pages: Vec<Vec<MemoryAnnotation>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page holding `annotations`.
    pub fn page(mut self, annotations: Vec<MemoryAnnotation>) -> Self {
        self.pages.push(annotations);
        self
    }

    fn slot(&self, page: usize, index: usize) -> Option<&MemoryAnnotation> {
        self.pages.get(page.checked_sub(1)?)?.get(index)
    }
}

impl PdfSource for MemorySource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn annotation_count(&self, page: usize) -> Result<usize, SourceError> {
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .map(Vec::len)
            .ok_or_else(|| SourceError::PageUnavailable {
                page,
                detail: "no such page".to_string(),
            })
    }

    fn annotation(&self, page: usize, index: usize) -> Result<RawAnnotation, SourceError> {
        let invalid = |detail: String| SourceError::InvalidAnnotation {
            page,
            index,
            detail,
        };
        match self.slot(page, index) {
            Some(slot) => slot.entry.clone().map_err(invalid),
            None => Err(invalid("no such annotation".to_string())),
        }
    }

    fn text_under_annotation(&self, page: usize, index: usize) -> Option<String> {
        self.slot(page, index)?.text.clone()
    }

    fn render_region(
        &self,
        page: usize,
        rect: &SourceRect,
        dpi: u32,
        target: &Path,
    ) -> Result<(), SourceError> {
        let scale = dpi as f32 / 72.0;
        let w = ((rect.width() * scale).round() as u32).max(1);
        let h = ((rect.height() * scale).round() as u32).max(1);

        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
            .save_with_format(target, image::ImageFormat::Png)
            .map_err(|e| SourceError::RenderFailed {
                page,
                path: target.to_path_buf(),
                detail: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceAnnotationKind;

    fn highlight() -> RawAnnotation {
        RawAnnotation::new(
            SourceAnnotationKind::Highlight,
            SourceRect::new(0.0, 0.0, 10.0, 10.0),
        )
    }

    #[test]
    fn pages_are_one_based() {
        let src = MemorySource::new().page(vec![highlight().into()]);
        assert_eq!(src.page_count(), 1);
        assert_eq!(src.annotation_count(1).unwrap(), 1);
        assert!(src.annotation_count(0).is_err());
        assert!(src.annotation(1, 0).is_ok());
    }

    #[test]
    fn corrupt_slot_reports_invalid() {
        let src = MemorySource::new().page(vec![MemoryAnnotation::corrupt("stale /Annots entry")]);
        let err = src.annotation(1, 0).unwrap_err();
        assert!(matches!(err, SourceError::InvalidAnnotation { page: 1, index: 0, .. }));
    }

    #[test]
    fn render_region_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("clip.png");
        let src = MemorySource::new().page(vec![]);
        src.render_region(1, &SourceRect::new(0.0, 0.0, 72.0, 36.0), 72, &target)
            .unwrap();
        let img = image::open(&target).unwrap();
        assert_eq!((img.width(), img.height()), (72, 36));
    }
}
