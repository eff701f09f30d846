//! Annotation normalisation: one [`RawAnnotation`] → one typed record shell.
//!
//! This stage performs no I/O. For square (image) annotations it returns an
//! [`ImageRequest`] describing the region to export; the effect itself is
//! carried out later by [`crate::pipeline::images`], gated by `noWrite`.

use crate::config::ColorMode;
use crate::output::{Annotation, AnnotationKind};
use crate::source::{RawAnnotation, Rgb, SourceAnnotationKind, SourceDate, SourceRect};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

/// Reader highlight palette used by [`ColorMode::Named`].
const PALETTE: [((u8, u8, u8), &str); 8] = [
    ((255, 128, 128), "red"),
    ((255, 191, 128), "orange"),
    ((255, 255, 128), "yellow"),
    ((128, 255, 128), "green"),
    ((128, 255, 255), "blue"),
    ((255, 128, 255), "pink"),
    ((191, 128, 191), "purple"),
    ((192, 192, 192), "gray"),
];

/// Per-channel slack when matching the palette, for rounding in readers.
const PALETTE_TOLERANCE: i16 = 2;

const FALLBACK_COLOR: Rgb = Rgb {
    r: 255,
    g: 255,
    b: 128,
};

/// Date given to annotations with no usable date. Fixed, so an undated
/// annotation always sorts before any export marker.
pub const UNDATED: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// A region of a page to export as a PNG.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub page: usize,
    pub index: usize,
    pub rect: SourceRect,
    pub file_name: String,
}

/// Output of [`Normalizer::normalize`].
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Record shell with id, type, color, dates, page, text and image path.
    pub annotation: Annotation,
    /// The raw comment, input to classification and continuation detection.
    pub comment: String,
    pub image: Option<ImageRequest>,
}

/// Run-wide context for normalisation.
#[derive(Debug, Clone)]
pub struct Normalizer {
    base_name: String,
    color_mode: ColorMode,
    export_date: DateTime<Utc>,
}

impl Normalizer {
    pub fn new(base_name: impl Into<String>, color_mode: ColorMode, export_date: DateTime<Utc>) -> Self {
        Self {
            base_name: base_name.into(),
            color_mode,
            export_date,
        }
    }

    /// Normalise one entry; `None` for native types with no display type.
    ///
    /// `text` is the text under the region; it is ignored for notes and
    /// images.
    pub fn normalize(
        &self,
        raw: &RawAnnotation,
        page: usize,
        index: usize,
        text: Option<String>,
    ) -> Option<Normalized> {
        let kind = display_kind(raw.kind)?;
        let color = resolve_color(raw.color, self.color_mode);
        let date = raw
            .date
            .and_then(wall_clock)
            .unwrap_or_else(|| {
                debug!("Page {} annotation {}: no usable date, using the epoch", page, index);
                UNDATED
            });

        let image = (kind == AnnotationKind::Image).then(|| ImageRequest {
            page,
            index,
            rect: raw.rect,
            file_name: image_file_name(&self.base_name, page, index),
        });

        let mut annotation = Annotation {
            id: fingerprint(kind, &color, page, &raw.rect),
            kind,
            color,
            annotated_text: None,
            comment: None,
            image_path: None,
            tags: Vec::new(),
            is_task: false,
            is_callout: false,
            callout_type: None,
            page,
            date,
            export_date: self.export_date,
        };

        if kind.is_markup() {
            if let Some(text) = text {
                annotation.push_annotated_text(text);
            }
        }
        if let Some(ref request) = image {
            annotation.push_image_path(request.file_name.clone());
        }

        let comment = raw.contents.clone().unwrap_or_default();
        annotation.push_comment(comment.clone());

        Some(Normalized {
            annotation,
            comment,
            image,
        })
    }
}

/// Map a native annotation type to its display type.
pub fn display_kind(kind: SourceAnnotationKind) -> Option<AnnotationKind> {
    match kind {
        SourceAnnotationKind::Text => Some(AnnotationKind::Note),
        SourceAnnotationKind::Underline => Some(AnnotationKind::Underline),
        SourceAnnotationKind::Highlight => Some(AnnotationKind::Highlight),
        SourceAnnotationKind::StrikeOut => Some(AnnotationKind::Strikethrough),
        SourceAnnotationKind::Square => Some(AnnotationKind::Image),
        SourceAnnotationKind::Other => None,
    }
}

/// `<base>-p<page>-a<index>.png`
pub fn image_file_name(base_name: &str, page: usize, index: usize) -> String {
    format!("{base_name}-p{page}-a{index}.png")
}

/// `<type>-<color without #>-<page>-<x1><y1><x2><y2>` with rounded corners.
pub fn fingerprint(kind: AnnotationKind, color: &str, page: usize, rect: &SourceRect) -> String {
    format!(
        "{}-{}-{}-{}{}{}{}",
        kind,
        color.trim_start_matches('#'),
        page,
        rect.x1.round() as i64,
        rect.y1.round() as i64,
        rect.x2.round() as i64,
        rect.y2.round() as i64,
    )
}

/// Resolve a source color to its output representation.
pub fn resolve_color(color: Option<Rgb>, mode: ColorMode) -> String {
    let rgb = color.unwrap_or(FALLBACK_COLOR);
    match mode {
        ColorMode::Hex => format!("#{:02x}{:02x}{:02x}", rgb.r, rgb.g, rgb.b),
        ColorMode::Named => palette_name(rgb).to_string(),
    }
}

fn palette_name(rgb: Rgb) -> &'static str {
    let close = |a: u8, b: u8| (a as i16 - b as i16).abs() <= PALETTE_TOLERANCE;
    PALETTE
        .iter()
        .find(|((r, g, b), _)| close(rgb.r, *r) && close(rgb.g, *g) && close(rgb.b, *b))
        .map(|(_, name)| *name)
        .unwrap_or("yellow")
}

/// Calendar fields (1-based month) → wall-clock instant.
pub fn wall_clock(date: SourceDate) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(date.year, date.month, date.day)?
        .and_hms_opt(date.hour, date.minute, date.second)
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn normalizer() -> Normalizer {
        Normalizer::new(
            "Deep Work",
            ColorMode::Hex,
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        )
    }

    fn date() -> SourceDate {
        SourceDate {
            year: 2024,
            month: 4,
            day: 30,
            hour: 21,
            minute: 15,
            second: 9,
        }
    }

    #[test]
    fn highlight_gets_text_color_and_fingerprint() {
        let raw = RawAnnotation::new(
            SourceAnnotationKind::Highlight,
            SourceRect::new(72.4, 700.6, 300.0, 712.2),
        )
        .with_color(Rgb::new(255, 255, 128))
        .with_contents("key idea")
        .with_date(date());

        let n = normalizer()
            .normalize(&raw, 3, 0, Some("focus is a skill".into()))
            .unwrap();

        assert_eq!(n.annotation.id, "highlight-ffff80-3-72701300712");
        assert_eq!(n.annotation.color, "#ffff80");
        assert_eq!(n.annotation.annotated_text, Some(vec!["focus is a skill".into()]));
        assert_eq!(n.annotation.comment, Some(vec!["key idea".into()]));
        assert_eq!(
            n.annotation.date,
            Utc.with_ymd_and_hms(2024, 4, 30, 21, 15, 9).unwrap()
        );
        assert!(n.image.is_none());
    }

    #[test]
    fn unsupported_kind_yields_nothing() {
        let raw = RawAnnotation::new(SourceAnnotationKind::Other, SourceRect::default());
        assert!(normalizer().normalize(&raw, 1, 0, None).is_none());
    }

    #[test]
    fn square_becomes_image_request_without_text() {
        let raw = RawAnnotation::new(
            SourceAnnotationKind::Square,
            SourceRect::new(10.0, 10.0, 110.0, 60.0),
        );
        let n = normalizer()
            .normalize(&raw, 2, 4, Some("ignored".into()))
            .unwrap();

        assert_eq!(n.annotation.kind, AnnotationKind::Image);
        assert!(n.annotation.annotated_text.is_none());
        assert!(n.annotation.comment.is_none());
        assert_eq!(
            n.annotation.image_path,
            Some(vec!["Deep Work-p2-a4.png".to_string()])
        );
        assert_eq!(n.image.unwrap().file_name, "Deep Work-p2-a4.png");
    }

    #[test]
    fn note_ignores_text_under_region() {
        let raw = RawAnnotation::new(SourceAnnotationKind::Text, SourceRect::default())
            .with_contents("margin note");
        let n = normalizer().normalize(&raw, 1, 0, Some("body".into())).unwrap();
        assert!(n.annotation.annotated_text.is_none());
        assert_eq!(n.comment, "margin note");
    }

    #[test]
    fn missing_or_invalid_date_falls_back_to_the_epoch() {
        let bad = SourceDate {
            month: 13,
            ..date()
        };
        let invalid = RawAnnotation::new(SourceAnnotationKind::Underline, SourceRect::default())
            .with_date(bad);
        let missing = RawAnnotation::new(SourceAnnotationKind::Underline, SourceRect::default());

        for raw in [invalid, missing] {
            let n = normalizer().normalize(&raw, 1, 0, None).unwrap();
            assert_eq!(n.annotation.date, UNDATED);
            assert_ne!(n.annotation.date, n.annotation.export_date);
        }
    }

    #[test]
    fn named_colors_use_the_palette() {
        assert_eq!(
            resolve_color(Some(Rgb::new(128, 255, 129)), ColorMode::Named),
            "green"
        );
        assert_eq!(
            resolve_color(Some(Rgb::new(10, 20, 30)), ColorMode::Named),
            "yellow"
        );
        assert_eq!(resolve_color(None, ColorMode::Hex), "#ffff80");
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let rect = SourceRect::new(1.4, 2.5, 3.6, 4.0);
        assert_eq!(
            fingerprint(AnnotationKind::Note, "#aabbcc", 7, &rect),
            fingerprint(AnnotationKind::Note, "#aabbcc", 7, &rect)
        );
        assert_eq!(fingerprint(AnnotationKind::Note, "red", 7, &rect), "note-red-7-1344");
    }
}
