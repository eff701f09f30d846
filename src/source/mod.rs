//! The PDF source capability: everything the pipeline needs from a PDF.
//!
//! Opening documents, reading annotation dictionaries, extracting text under
//! a region and rasterising a region are all delegated to an implementation
//! of [`PdfSource`]. The pipeline only sees plain values ([`RawAnnotation`],
//! [`SourceRect`], …), which keeps normalisation, classification and merging
//! testable without a PDF engine.
//!
//! Two implementations ship with the crate:
//!
//! * [`pdfium::PdfiumSource`]: production adapter over `pdfium-render`.
//! * [`memory::MemorySource`]: annotations held in memory; used by tests and
//!   by callers that already have annotation data from another reader.
//!
//! Pages are addressed by **1-based page number** (`1..=page_count()`);
//! annotations by their 0-based index on the page.

pub mod memory;
pub mod pdfium;

use crate::error::SourceError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

pub use memory::{MemoryAnnotation, MemorySource};
pub use pdfium::PdfiumSource;

/// Read access to one open PDF document.
///
/// Calls are made strictly sequentially from a single thread; an
/// implementation may hold non-thread-safe native handles. Handles are
/// released when the source is dropped.
pub trait PdfSource {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Number of annotation entries on `page`.
    fn annotation_count(&self, page: usize) -> Result<usize, SourceError>;

    /// Read one annotation entry. An `Err` marks the entry as invalid; the
    /// caller skips it.
    fn annotation(&self, page: usize, index: usize) -> Result<RawAnnotation, SourceError>;

    /// Text lying spatially under the annotation's region, if any.
    fn text_under_annotation(&self, page: usize, index: usize) -> Option<String>;

    /// Render `rect` of `page` at `dpi` and write it as a PNG to `target`.
    fn render_region(
        &self,
        page: usize,
        rect: &SourceRect,
        dpi: u32,
        target: &Path,
    ) -> Result<(), SourceError>;
}

/// Native annotation type as reported by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAnnotationKind {
    Text,
    Underline,
    Highlight,
    StrikeOut,
    Square,
    Other,
}

/// Annotation rectangle in PDF user-space points (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SourceRect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl SourceRect {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn left(&self) -> f32 {
        self.x1.min(self.x2)
    }

    pub fn top(&self) -> f32 {
        self.y1.max(self.y2)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).abs()
    }
}

/// 8-bit RGB color of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert unit-interval components, as some readers report them.
    pub fn from_unit(r: f32, g: f32, b: f32) -> Self {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(c(r), c(g), c(b))
    }
}

/// Calendar fields of an annotation timestamp. `month` is 1-based.
///
/// The fields are the reader's local wall-clock time; any UTC offset the
/// PDF records is deliberately not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

static RE_PDF_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:D:)?(\d{4})(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\d{2})?").unwrap()
});

impl SourceDate {
    /// Parse a PDF date string (`D:YYYYMMDDHHmmSSOHH'mm'`). Every field
    /// after the year is optional; the offset suffix is ignored.
    pub fn parse_pdf_date(raw: &str) -> Option<Self> {
        let caps = RE_PDF_DATE.captures(raw.trim())?;
        let field = |i: usize, default: u32| -> u32 {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(default)
        };
        Some(Self {
            year: caps[1].parse().ok()?,
            month: field(2, 1),
            day: field(3, 1),
            hour: field(4, 0),
            minute: field(5, 0),
            second: field(6, 0),
        })
    }
}

/// One annotation entry as read from the source, before normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAnnotation {
    pub kind: SourceAnnotationKind,
    /// The comment string attached to the annotation.
    pub contents: Option<String>,
    pub color: Option<Rgb>,
    pub date: Option<SourceDate>,
    pub rect: SourceRect,
}

impl RawAnnotation {
    pub fn new(kind: SourceAnnotationKind, rect: SourceRect) -> Self {
        Self {
            kind,
            contents: None,
            color: None,
            date: None,
            rect,
        }
    }

    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(contents.into());
        self
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_date(mut self, date: SourceDate) -> Self {
        self.date = Some(date);
        self
    }
}
