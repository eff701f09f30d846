//! Output types: the annotation record and the views built from it.
//!
//! [`Annotation`] is the unit of extracted meaning. Its list fields
//! (`annotatedText`, `comment`, `imagePath`) are `None` rather than empty so
//! formatting code can test presence directly; the `push_*` helpers keep
//! that invariant when continuation merges grow a record.
//!
//! Dates are wall-clock instants: the calendar fields the reader recorded
//! are stored as if they were UTC. Every date in a run (annotation dates,
//! export date, export markers parsed back from Markdown) uses the same
//! representation, so comparisons and `strftime` formatting need no time
//! zone at all. JSON carries them as epoch milliseconds.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display type of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Note,
    Underline,
    Highlight,
    Strikethrough,
    Image,
}

impl AnnotationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationKind::Note => "note",
            AnnotationKind::Underline => "underline",
            AnnotationKind::Highlight => "highlight",
            AnnotationKind::Strikethrough => "strikethrough",
            AnnotationKind::Image => "image",
        }
    }

    /// Text-markup kinds carry the text lying under their region.
    pub fn is_markup(self) -> bool {
        matches!(
            self,
            AnnotationKind::Underline | AnnotationKind::Highlight | AnnotationKind::Strikethrough
        )
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One semantic annotation, possibly merged from several physical marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Stable fingerprint: type, color, page and rounded rectangle corners.
    pub id: String,

    #[serde(rename = "type")]
    pub kind: AnnotationKind,

    pub color: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_text: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<Vec<String>>,

    #[serde(default)]
    pub tags: Vec<String>,

    pub is_task: bool,

    pub is_callout: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callout_type: Option<String>,

    pub page: usize,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub export_date: DateTime<Utc>,
}

impl Annotation {
    /// Append a text fragment, creating the list on first use. Blank
    /// fragments are ignored.
    pub fn push_annotated_text(&mut self, text: impl Into<String>) {
        push_non_empty(&mut self.annotated_text, text.into());
    }

    /// Append a comment entry, creating the list on first use. Blank
    /// comments are ignored.
    pub fn push_comment(&mut self, comment: impl Into<String>) {
        push_non_empty(&mut self.comment, comment.into());
    }

    /// Append an exported image file name.
    pub fn push_image_path(&mut self, file_name: impl Into<String>) {
        push_non_empty(&mut self.image_path, file_name.into());
    }

    /// Set or clear the callout label, keeping `is_callout` in step.
    pub fn set_callout(&mut self, callout_type: Option<String>) {
        self.is_callout = callout_type.is_some();
        self.callout_type = callout_type;
    }

    /// Bucket key for tag grouping.
    pub fn first_tag(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    /// First comment entry, the one classification ran against.
    pub fn primary_comment(&self) -> Option<&str> {
        self.comment
            .as_ref()
            .and_then(|c| c.first())
            .map(String::as_str)
    }

    /// All text fragments joined with newlines.
    pub fn joined_text(&self) -> Option<String> {
        self.annotated_text.as_ref().map(|t| t.join("\n"))
    }

    /// All comment entries joined with newlines.
    pub fn joined_comment(&self) -> Option<String> {
        self.comment.as_ref().map(|c| c.join("\n"))
    }
}

fn push_non_empty(list: &mut Option<Vec<String>>, value: String) {
    if value.trim().is_empty() {
        return;
    }
    list.get_or_insert_with(Vec::new).push(value);
}

/// The machine-consumption view of a run, printed as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationData {
    pub annotations: Vec<Annotation>,
    pub grouped_annotations: IndexMap<String, Vec<Annotation>>,
    pub callouts: IndexMap<String, Vec<Annotation>>,
}

/// Counters collected during one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages visited.
    pub pages: usize,
    /// Physical annotation entries visited.
    pub annotations_seen: usize,
    /// Records emitted.
    pub emitted: usize,
    /// Physical annotations folded into their predecessor.
    pub merged: usize,
    /// Entries the source reported as unreadable.
    pub skipped_invalid: usize,
    /// Entries of a native type with no display type (links, ink, …).
    pub skipped_unsupported: usize,
    /// Image regions written to disk.
    pub images_written: usize,
    /// Image regions that failed to render or write.
    pub images_failed: usize,
    /// Wall-clock duration of the extraction pass.
    pub duration_ms: u64,
}

/// Records and counters from one extraction pass.
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    /// Records in page/visual order.
    pub annotations: Vec<Annotation>,
    pub stats: ExtractionStats,
    /// Wall-clock instant the run started; shared by every record.
    pub export_date: DateTime<Utc>,
}

/// Result of a Markdown export run.
#[derive(Debug, Clone)]
pub struct MarkdownExport {
    /// The complete new document.
    pub markdown: String,
    /// Annotations rendered in the new export batch.
    pub new_annotations: usize,
    /// Last export marker found in the prior document, if usable.
    pub last_export: Option<DateTime<Utc>>,
}

/// What a full run produced, by output mode.
#[derive(Debug, Clone)]
pub enum RunOutput {
    /// No `outputPath`: the JSON view, for the caller to print.
    Json(AnnotationData),
    /// Markdown written to `path`.
    Markdown {
        path: std::path::PathBuf,
        export: MarkdownExport,
    },
}

/// Output and statistics of a full run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub output: RunOutput,
    pub stats: ExtractionStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Annotation {
        Annotation {
            id: "highlight-ffff80-1-10203040".into(),
            kind: AnnotationKind::Highlight,
            color: "#ffff80".into(),
            annotated_text: None,
            comment: None,
            image_path: None,
            tags: vec![],
            is_task: false,
            is_callout: false,
            callout_type: None,
            page: 1,
            date: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            export_date: Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn absent_lists_are_not_serialised() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("annotatedText").is_none());
        assert!(json.get("comment").is_none());
        assert!(json.get("calloutType").is_none());
        assert_eq!(json["type"], "highlight");
        assert_eq!(json["isTask"], false);
        assert_eq!(json["date"], 1_709_285_400_000i64);
    }

    #[test]
    fn blank_entries_never_create_a_list() {
        let mut a = sample();
        a.push_comment("   ");
        a.push_annotated_text("");
        assert!(a.comment.is_none());
        assert!(a.annotated_text.is_none());

        a.push_comment("first");
        a.push_comment("second");
        assert_eq!(a.comment, Some(vec!["first".into(), "second".into()]));
        assert_eq!(a.joined_comment().as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn set_callout_keeps_flag_in_step() {
        let mut a = sample();
        a.set_callout(Some("question".into()));
        assert!(a.is_callout);
        a.set_callout(None);
        assert!(!a.is_callout);
        assert!(a.callout_type.is_none());
    }
}
