//! Run configuration for annotation extraction and Markdown export.
//!
//! All behaviour is controlled through [`InputParams`]. It arrives whole as
//! one JSON object (the invocation contract of the `highlights` binary) or
//! is assembled in code via [`InputParamsBuilder`]. Either way it is
//! validated once and never mutated during a run.
//!
//! Date patterns (`dateFormat`, `dateTimeFormat`) are chrono `strftime`
//! patterns, validated up front so formatting can never fail mid-run.

use crate::error::HighlightsError;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lowest accepted image export DPI.
pub const MIN_IMAGE_DPI: u32 = 36;
/// Highest accepted image export DPI.
pub const MAX_IMAGE_DPI: u32 = 600;

/// Configuration for one extraction/export run.
///
/// # Example
/// ```rust
/// use pdf_highlights::{GroupBy, InputParams, SortBy};
///
/// let params = InputParams::builder()
///     .pdf_input_path("paper.pdf")
///     .task_prefix("todo:")
///     .concatenation_prefix("+")
///     .sort_by(SortBy::Location)
///     .group_by(GroupBy::Tag)
///     .build()
///     .unwrap();
/// assert_eq!(params.base_name(), "paper");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputParams {
    /// PDF to read. Required.
    pub pdf_input_path: PathBuf,

    /// Root directory for exported images. Images land in
    /// `<assetOutputPath>/<baseName>/`. Default: current directory.
    pub asset_output_path: PathBuf,

    /// Directory receiving `<baseName>.md`. When unset the run prints JSON.
    pub output_path: Option<PathBuf>,

    /// Citation key shown in the Markdown preamble. Default: the base name.
    pub cite_key: Option<String>,

    /// Comment prefix marking an annotation as a task (`isTask`).
    pub task_prefix: Option<String>,

    /// Ordered callout rules; the first matching prefix wins.
    pub callout_prefixes: Vec<CalloutRule>,

    /// Comment prefix folding an annotation into the preceding one.
    pub concatenation_prefix: Option<String>,

    /// Comment prefix contributing to the keyword summary. Default: `keyword`.
    pub keyword_prefix: Option<String>,

    /// Ordering of annotations in every output view. Default: [`SortBy::Date`].
    pub sort_by: SortBy,

    /// Bucketing of `groupedAnnotations`. Default: [`GroupBy::ExportDate`].
    pub group_by: GroupBy,

    /// Output representation of annotation colors. Default: [`ColorMode::Hex`].
    pub color_mode: ColorMode,

    /// chrono pattern for day-level keys. Default: `%Y-%m-%d`.
    pub date_format: String,

    /// chrono pattern for minute-level keys. Default: `%Y-%m-%d %H:%M`.
    pub date_time_format: String,

    /// Resolution of exported image regions. Range: 36–600. Default: 100.
    #[serde(rename = "imageDPI")]
    pub image_dpi: u32,

    /// Only annotations dated at or after this instant are output (JSON mode).
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_export_date: Option<DateTime<Utc>>,

    /// Suppress image-file side effects.
    pub no_write: bool,
}

impl Default for InputParams {
    fn default() -> Self {
        Self {
            pdf_input_path: PathBuf::new(),
            asset_output_path: PathBuf::new(),
            output_path: None,
            cite_key: None,
            task_prefix: None,
            callout_prefixes: Vec::new(),
            concatenation_prefix: None,
            keyword_prefix: Some("keyword".to_string()),
            sort_by: SortBy::default(),
            group_by: GroupBy::default(),
            color_mode: ColorMode::default(),
            date_format: "%Y-%m-%d".to_string(),
            date_time_format: "%Y-%m-%d %H:%M".to_string(),
            image_dpi: 100,
            last_export_date: None,
            no_write: false,
        }
    }
}

impl InputParams {
    /// Create a new builder for `InputParams`.
    pub fn builder() -> InputParamsBuilder {
        InputParamsBuilder {
            params: Self::default(),
        }
    }

    /// Parse and validate a JSON configuration object.
    pub fn from_json(json: &str) -> Result<Self, HighlightsError> {
        let params: InputParams =
            serde_json::from_str(json).map_err(HighlightsError::ConfigParse)?;
        params.validate()?;
        Ok(params)
    }

    /// Check every constraint a run relies on.
    pub fn validate(&self) -> Result<(), HighlightsError> {
        if self.pdf_input_path.as_os_str().is_empty() {
            return Err(HighlightsError::MissingParameter {
                name: "pdfInputPath",
            });
        }
        if !(MIN_IMAGE_DPI..=MAX_IMAGE_DPI).contains(&self.image_dpi) {
            return Err(HighlightsError::InvalidConfig(format!(
                "imageDPI must be {MIN_IMAGE_DPI}–{MAX_IMAGE_DPI}, got {}",
                self.image_dpi
            )));
        }
        validate_date_pattern("dateFormat", &self.date_format)?;
        validate_date_pattern("dateTimeFormat", &self.date_time_format)?;
        for rule in &self.callout_prefixes {
            if rule.prefix.is_empty() || rule.callout_type.is_empty() {
                return Err(HighlightsError::InvalidConfig(format!(
                    "callout rule needs a non-empty type and prefix, got {rule:?}"
                )));
            }
        }
        Ok(())
    }

    /// File name of the PDF without its `.pdf` extension.
    pub fn base_name(&self) -> String {
        document_base_name(&self.pdf_input_path)
    }

    /// Citation key for the preamble, falling back to the base name.
    pub fn cite_key(&self) -> String {
        self.cite_key.clone().unwrap_or_else(|| self.base_name())
    }

    /// Directory receiving this document's exported images.
    pub fn asset_dir(&self) -> PathBuf {
        self.asset_output_path.join(self.base_name())
    }

    /// Target Markdown file, when the run is in Markdown mode.
    pub fn markdown_path(&self) -> Option<PathBuf> {
        self.output_path
            .as_ref()
            .map(|dir| dir.join(format!("{}.md", self.base_name())))
    }
}

/// `basename(path, ".pdf")`: strip a trailing `.pdf` (any case) only.
pub fn document_base_name(path: &Path) -> String {
    let is_pdf = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    let name = if is_pdf {
        path.file_stem()
    } else {
        path.file_name()
    };
    name.map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn validate_date_pattern(name: &str, pattern: &str) -> Result<(), HighlightsError> {
    if pattern.is_empty() || StrftimeItems::new(pattern).any(|i| matches!(i, Item::Error)) {
        return Err(HighlightsError::InvalidConfig(format!(
            "{name} is not a valid strftime pattern: {pattern:?}"
        )));
    }
    Ok(())
}

/// Builder for [`InputParams`].
#[derive(Debug)]
pub struct InputParamsBuilder {
    params: InputParams,
}

impl InputParamsBuilder {
    pub fn pdf_input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.params.pdf_input_path = path.into();
        self
    }

    pub fn asset_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.params.asset_output_path = path.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.params.output_path = Some(path.into());
        self
    }

    pub fn cite_key(mut self, key: impl Into<String>) -> Self {
        self.params.cite_key = Some(key.into());
        self
    }

    pub fn task_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.params.task_prefix = Some(prefix.into());
        self
    }

    pub fn callout(mut self, rule: CalloutRule) -> Self {
        self.params.callout_prefixes.push(rule);
        self
    }

    pub fn concatenation_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.params.concatenation_prefix = Some(prefix.into());
        self
    }

    pub fn keyword_prefix(mut self, prefix: Option<String>) -> Self {
        self.params.keyword_prefix = prefix;
        self
    }

    pub fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.params.sort_by = sort_by;
        self
    }

    pub fn group_by(mut self, group_by: GroupBy) -> Self {
        self.params.group_by = group_by;
        self
    }

    pub fn color_mode(mut self, mode: ColorMode) -> Self {
        self.params.color_mode = mode;
        self
    }

    pub fn date_format(mut self, pattern: impl Into<String>) -> Self {
        self.params.date_format = pattern.into();
        self
    }

    pub fn date_time_format(mut self, pattern: impl Into<String>) -> Self {
        self.params.date_time_format = pattern.into();
        self
    }

    pub fn image_dpi(mut self, dpi: u32) -> Self {
        self.params.image_dpi = dpi.clamp(MIN_IMAGE_DPI, MAX_IMAGE_DPI);
        self
    }

    pub fn last_export_date(mut self, instant: DateTime<Utc>) -> Self {
        self.params.last_export_date = Some(instant);
        self
    }

    pub fn no_write(mut self, v: bool) -> Self {
        self.params.no_write = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<InputParams, HighlightsError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// A callout classification rule: comments starting with `prefix` are
/// labelled `type` and summarised in the preamble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalloutRule {
    #[serde(rename = "type")]
    pub callout_type: String,
    pub prefix: String,
    /// Heading of the preamble summary. Default: capitalised type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl CalloutRule {
    pub fn new(callout_type: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            callout_type: callout_type.into(),
            prefix: prefix.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Summary heading for this rule.
    pub fn display_title(&self) -> String {
        if let Some(ref t) = self.title {
            return t.clone();
        }
        let mut chars = self.callout_type.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Ordering applied to annotation lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Page/visual order as extracted.
    Location,
    /// Ascending annotation date. (default)
    #[default]
    Date,
    /// Ascending color string.
    Color,
}

/// Bucketing applied to `groupedAnnotations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupBy {
    /// First tag, or `"none"`.
    Tag,
    /// Export instant formatted with `dateFormat`.
    AnnotationDate,
    /// Export instant formatted with `dateTimeFormat`. (default)
    #[default]
    ExportDate,
    /// Color value.
    Color,
}

/// How annotation colors are represented in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// `#rrggbb`. (default)
    #[default]
    Hex,
    /// Reader palette bucket name (`yellow`, `red`, …).
    Named,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let p = InputParams::default();
        assert_eq!(p.sort_by, SortBy::Date);
        assert_eq!(p.group_by, GroupBy::ExportDate);
        assert_eq!(p.image_dpi, 100);
        assert_eq!(p.keyword_prefix.as_deref(), Some("keyword"));
        assert!(!p.no_write);
    }

    #[test]
    fn from_json_reads_camel_case_fields() {
        let json = r#"{
            "pdfInputPath": "/books/Deep Work.pdf",
            "assetOutputPath": "/vault/assets",
            "taskPrefix": "todo:",
            "calloutPrefixes": [{"type": "question", "prefix": "q:"}],
            "concatenationPrefix": "+",
            "sortBy": "location",
            "groupBy": "annotation-date",
            "imageDPI": 150,
            "lastExportDate": 1700000000000,
            "noWrite": true
        }"#;
        let p = InputParams::from_json(json).unwrap();
        assert_eq!(p.base_name(), "Deep Work");
        assert_eq!(p.asset_dir(), PathBuf::from("/vault/assets/Deep Work"));
        assert_eq!(p.task_prefix.as_deref(), Some("todo:"));
        assert_eq!(p.callout_prefixes[0].callout_type, "question");
        assert_eq!(p.sort_by, SortBy::Location);
        assert_eq!(p.group_by, GroupBy::AnnotationDate);
        assert_eq!(p.image_dpi, 150);
        assert_eq!(
            p.last_export_date.map(|d| d.timestamp_millis()),
            Some(1_700_000_000_000)
        );
        assert!(p.no_write);
    }

    #[test]
    fn missing_input_path_is_rejected() {
        let err = InputParams::from_json("{}").unwrap_err();
        assert!(matches!(
            err,
            HighlightsError::MissingParameter {
                name: "pdfInputPath"
            }
        ));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = InputParams::from_json("{not json").unwrap_err();
        assert!(matches!(err, HighlightsError::ConfigParse(_)));
    }

    #[test]
    fn unknown_group_by_is_rejected() {
        let json = r#"{"pdfInputPath": "a.pdf", "groupBy": "page"}"#;
        assert!(InputParams::from_json(json).is_err());
    }

    #[test]
    fn invalid_date_pattern_is_rejected() {
        let result = InputParams::builder()
            .pdf_input_path("a.pdf")
            .date_format("%Q")
            .build();
        assert!(matches!(result, Err(HighlightsError::InvalidConfig(_))));
    }

    #[test]
    fn dpi_out_of_range_in_json_is_rejected() {
        let json = r#"{"pdfInputPath": "a.pdf", "imageDPI": 5000}"#;
        assert!(matches!(
            InputParams::from_json(json),
            Err(HighlightsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn builder_clamps_dpi() {
        let p = InputParams::builder()
            .pdf_input_path("a.pdf")
            .image_dpi(5)
            .build()
            .unwrap();
        assert_eq!(p.image_dpi, MIN_IMAGE_DPI);
    }

    #[test]
    fn base_name_strips_only_pdf_extension() {
        assert_eq!(document_base_name(Path::new("/x/Book.PDF")), "Book");
        assert_eq!(document_base_name(Path::new("/x/notes.v2")), "notes.v2");
    }

    #[test]
    fn markdown_path_uses_base_name() {
        let p = InputParams::builder()
            .pdf_input_path("/in/paper.pdf")
            .output_path("/vault")
            .build()
            .unwrap();
        assert_eq!(p.markdown_path(), Some(PathBuf::from("/vault/paper.md")));
        assert_eq!(p.cite_key(), "paper");
    }

    #[test]
    fn callout_title_defaults_to_capitalised_type() {
        assert_eq!(CalloutRule::new("question", "q:").display_title(), "Question");
        assert_eq!(
            CalloutRule::new("important", "!").with_title("Callouts").display_title(),
            "Callouts"
        );
    }
}
