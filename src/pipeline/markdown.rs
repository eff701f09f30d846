//! Incremental Markdown export.
//!
//! A note produced by this module has two parts:
//!
//! ```text
//! > [!info]                       ┐
//! > - **Cite Key:** [[@key]]      │ preamble: rebuilt on every run
//! ...                             │
//! ## Annotations                  ┘
//!
//! ### Exported: 2024-03-01 9:05:12 am    ┐
//! > [!highlight_ffff80]                   │ exported block: kept verbatim,
//! ...                                     │ one section per run
//! ### Exported: 2024-03-08 6:40:03 pm    ┘
//! ```
//!
//! ## Why split at the last header?
//!
//! Everything the user may have edited lives below `## Annotations`, so the
//! prior document is split at the *last* such line and only the part above
//! it is regenerated. The last `### Exported:` marker below it tells which
//! annotations are already present; only annotations dated at or after it
//! are rendered into a new section. When nothing is new, no section is
//! written and the document comes out byte for byte unchanged.
//!
//! Markdown written by people is not a reliable format. A prior document
//! whose markers cannot all be parsed, or whose markers are not in
//! chronological order, has no usable export date and every annotation is
//! exported again.

use super::classify::{Classifier, PrefixMatcher};
use super::group::{group_callouts, sort_annotations};
use crate::config::InputParams;
use crate::output::{Annotation, AnnotationKind, MarkdownExport};
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info, warn};

/// Header separating the preamble from the exported annotations.
pub const ANNOTATIONS_HEADER: &str = "## Annotations";

/// Format of the timestamp written after `### Exported:`.
pub const EXPORT_MARKER_FORMAT: &str = "%Y-%m-%d %-I:%M:%S %P";

/// Marker formats accepted when reading a prior document, newest first.
/// The second is the minute-precision form older notes carry.
const EXPORT_MARKER_PARSE_FORMATS: [&str; 2] = ["%Y-%m-%d %I:%M:%S %p", "%Y-%m-%d %I:%M %p"];

/// Format of the daily-note link after each block's page link.
const DATE_LINK_FORMAT: &str = "%Y-%m-%d#%-I:%M %P";

static RE_ANNOTATIONS_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^## Annotations[ \t\r]*$").unwrap());

static RE_EXPORT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^### Exported: (.+)$").unwrap());

static RE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());

static RE_CONTINUATION_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+(?:- )?").unwrap());

static RE_KEYWORD_SEP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").unwrap());

// ── Prior document ───────────────────────────────────────────────────────

/// The parts of a previously written note that survive a re-export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorDocument<'a> {
    /// Everything after the last annotations header, verbatim.
    pub exported: &'a str,
    /// Timestamp of the last export marker, if usable.
    pub last_export: Option<DateTime<Utc>>,
}

/// Split a prior note at its last `## Annotations` line.
///
/// The single blank line the header is written with is not part of the
/// exported block. A document without the header is kept whole, with no
/// usable export date.
pub fn split_prior(document: &str) -> PriorDocument<'_> {
    let Some(header) = RE_ANNOTATIONS_HEADER.find_iter(document).last() else {
        warn!("Existing note has no '{}' header; keeping it whole", ANNOTATIONS_HEADER);
        return PriorDocument {
            exported: document,
            last_export: None,
        };
    };

    let mut rest = &document[header.end()..];
    for _ in 0..2 {
        rest = rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'))
            .unwrap_or(rest);
    }

    PriorDocument {
        exported: rest,
        last_export: last_export_marker(rest),
    }
}

/// Timestamp of the last `### Exported:` marker in `block`.
///
/// `None` when there are no markers, when any marker fails to parse, or
/// when the markers are out of chronological order.
pub fn last_export_marker(block: &str) -> Option<DateTime<Utc>> {
    let mut last: Option<DateTime<Utc>> = None;
    for caps in RE_EXPORT_MARKER.captures_iter(block) {
        let raw = caps[1].trim();
        let Some(instant) = parse_export_marker(raw) else {
            warn!("Unparseable export marker {:?}; exporting every annotation", raw);
            return None;
        };
        if last.is_some_and(|prev| instant < prev) {
            warn!("Export markers out of order at {:?}; exporting every annotation", raw);
            return None;
        }
        last = Some(instant);
    }
    last
}

/// Parse one marker timestamp in any accepted format.
pub fn parse_export_marker(raw: &str) -> Option<DateTime<Utc>> {
    EXPORT_MARKER_PARSE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Build the complete note for this run.
///
/// `annotations` is the run's full extraction; `prior` the existing note,
/// if any; `now` the wall-clock export instant stamped on the new section.
pub fn build_markdown(
    params: &InputParams,
    mut annotations: Vec<Annotation>,
    prior: Option<&str>,
    now: DateTime<Utc>,
) -> MarkdownExport {
    let classifier = Classifier::new(params);
    let base_name = params.base_name();
    sort_annotations(params.sort_by, &mut annotations);

    let mut markdown = build_preamble(params, &classifier, &annotations);

    let prior = prior.map(split_prior);
    let exported = prior.as_ref().map_or("", |p| p.exported);
    markdown.push_str(exported);
    let last_export = prior.and_then(|p| p.last_export);

    let blocks: Vec<String> = annotations
        .iter()
        .filter(|a| last_export.map_or(true, |t| a.date >= t))
        .map(|a| render_block(&base_name, a))
        .filter(|block| !block.is_empty())
        .collect();

    if blocks.is_empty() {
        debug!("No new annotations since {:?}", last_export);
    } else {
        // The marker must start its own line or the next run cannot find it.
        if !exported.is_empty() && !exported.ends_with('\n') {
            markdown.push_str("\n\n");
        }
        markdown.push_str(&format!(
            "### Exported: {}\n\n",
            now.format(EXPORT_MARKER_FORMAT)
        ));
        for block in &blocks {
            markdown.push_str(block);
        }
        info!("Rendered {} new annotations", blocks.len());
    }

    MarkdownExport {
        markdown,
        new_annotations: blocks.len(),
        last_export,
    }
}

/// Info callout, keyword list, callout summaries and the annotations header.
pub fn build_preamble(
    params: &InputParams,
    classifier: &Classifier,
    annotations: &[Annotation],
) -> String {
    let base_name = params.base_name();
    let mut out = String::from("> [!info]\n");
    out.push_str(&format!("> - **Cite Key:** [[@{}]]\n", params.cite_key()));
    out.push_str(&format!(
        "> - **Link:** [{}](file://{})\n",
        base_name,
        file_url_path(&params.pdf_input_path)
    ));

    let keywords = collect_keywords(params, annotations);
    if !keywords.is_empty() {
        out.push_str(&format!("> - **Keywords:** {}\n", keywords.join(", ")));
    }
    out.push('\n');

    let callouts = group_callouts(params, annotations);
    let mut written: Vec<&str> = Vec::new();
    for rule in classifier.rules() {
        if written.contains(&rule.callout_type.as_str()) {
            continue;
        }
        let Some(list) = callouts.get(&rule.callout_type) else {
            continue;
        };
        written.push(&rule.callout_type);

        out.push_str(&format!(
            "> [!{}: {}]\n",
            rule.callout_type,
            rule.display_title()
        ));
        for a in list {
            if let Some(text) = summary_text(classifier, a) {
                out.push_str(&format!("> - {}\n> {}\n", text, page_link(&base_name, a.page)));
            }
        }
        out.push('\n');
    }

    out.push('\n');
    out.push_str(ANNOTATIONS_HEADER);
    out.push_str("\n\n");
    out
}

/// One annotation block, or an empty string when there is nothing to show.
pub fn render_block(base_name: &str, a: &Annotation) -> String {
    let mut out = String::new();
    let page_line = format!(
        "> {} - [[{}]]\n",
        page_link(base_name, a.page),
        a.date.format(DATE_LINK_FORMAT)
    );

    match a.kind {
        AnnotationKind::Underline | AnnotationKind::Highlight | AnnotationKind::Strikethrough => {
            let text = a.joined_text().unwrap_or_default();
            let text = RE_NEWLINES.replace_all(text.trim(), "\n");
            if !text.is_empty() {
                out.push_str(&format!(
                    "> [!{}_{}]\n",
                    markup_label(a.kind),
                    a.color.trim_start_matches('#')
                ));
                for line in text.lines() {
                    out.push_str(&format!("> {}\n", line));
                }
                out.push_str(&page_line);
            }
        }
        AnnotationKind::Note => {
            if a.comment.is_some() {
                out.push_str("> [!note]\n");
                out.push_str(&page_line);
            }
        }
        AnnotationKind::Image => {
            if let Some(ref files) = a.image_path {
                out.push_str("> [!image]\n");
                for file in files {
                    out.push_str(&format!("> ![[{}]]\n", file));
                }
                out.push_str(&page_line);
            }
        }
    }

    if let Some(comment) = a.joined_comment() {
        let comment = comment.trim();
        if !comment.is_empty() {
            let marker = if a.is_task { "- [ ] " } else { "- " };
            out.push_str(&format!("> {}{}\n", marker, continuation_bullets(comment)));
        }
    }

    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn markup_label(kind: AnnotationKind) -> &'static str {
    match kind {
        AnnotationKind::Strikethrough => "strike",
        other => other.as_str(),
    }
}

/// `[page N](highlights://<base>#page=N)`
pub fn page_link(base_name: &str, page: usize) -> String {
    format!(
        "[page {page}](highlights://{}#page={page})",
        urlencoding::encode(base_name)
    )
}

/// Re-indent embedded line breaks as nested bullets of the enclosing quote.
pub fn continuation_bullets(text: &str) -> String {
    RE_CONTINUATION_BULLET
        .replace_all(text, "\n>    - ")
        .into_owned()
}

/// Percent-encode each path segment, keeping the separators.
fn file_url_path(path: &Path) -> String {
    path.to_string_lossy()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn collect_keywords(params: &InputParams, annotations: &[Annotation]) -> Vec<String> {
    let Some(matcher) = params.keyword_prefix.as_deref().and_then(PrefixMatcher::new) else {
        return Vec::new();
    };

    let mut keywords = Vec::new();
    for a in annotations {
        let Some(rest) = a.primary_comment().and_then(|c| matcher.strip(c)) else {
            continue;
        };
        match rest.strip_prefix(':') {
            Some(list) => keywords.extend(
                RE_KEYWORD_SEP
                    .split(list.trim())
                    .filter(|k| !k.is_empty())
                    .map(str::to_string),
            ),
            None => {
                if let Some(text) = a.joined_text() {
                    let text = text.trim();
                    if !text.is_empty() {
                        keywords.push(text.to_string());
                    }
                }
            }
        }
    }
    keywords
}

/// Bullet text for a callout summary: the comment after its prefix, else
/// the annotated text, else the first image.
fn summary_text(classifier: &Classifier, a: &Annotation) -> Option<String> {
    if let Some(rest) = a.primary_comment().and_then(|c| classifier.strip_callout(c)) {
        let rest = rest.strip_prefix(':').unwrap_or(rest).trim();
        if !rest.is_empty() {
            return Some(continuation_bullets(rest));
        }
    }
    if let Some(text) = a.joined_text() {
        let text = text.trim();
        if !text.is_empty() {
            return Some(continuation_bullets(text));
        }
    }
    a.image_path
        .as_ref()
        .and_then(|files| files.first())
        .map(|file| format!("![[{}]]", file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalloutRule;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn params() -> InputParams {
        InputParams::builder()
            .pdf_input_path("/papers/Deep Work.pdf")
            .cite_key("newport2016")
            .task_prefix("todo:")
            .callout(CalloutRule::new("question", "question"))
            .build()
            .unwrap()
    }

    fn highlight(id: &str, text: &str, comment: &str, date: DateTime<Utc>) -> Annotation {
        let mut a = Annotation {
            id: id.into(),
            kind: AnnotationKind::Highlight,
            color: "#ffff80".into(),
            annotated_text: None,
            comment: None,
            image_path: None,
            tags: vec![],
            is_task: false,
            is_callout: false,
            callout_type: None,
            page: 4,
            date,
            export_date: at(10, 9),
        };
        a.push_annotated_text(text);
        a.push_comment(comment);
        a
    }

    #[test]
    fn fresh_document_has_preamble_and_one_section() {
        let out = build_markdown(
            &params(),
            vec![highlight("a", "focus matters", "", at(1, 9))],
            None,
            at(10, 9),
        );

        let expected = "> [!info]\n\
            > - **Cite Key:** [[@newport2016]]\n\
            > - **Link:** [Deep Work](file:///papers/Deep%20Work.pdf)\n\
            \n\
            \n\
            ## Annotations\n\
            \n\
            ### Exported: 2024-03-10 9:00:00 am\n\
            \n\
            > [!highlight_ffff80]\n\
            > focus matters\n\
            > [page 4](highlights://Deep%20Work#page=4) - [[2024-03-01#9:00 am]]\n\
            \n";
        assert_eq!(out.markdown, expected);
        assert_eq!(out.new_annotations, 1);
        assert!(out.last_export.is_none());
    }

    #[test]
    fn rerun_without_new_annotations_is_byte_identical() {
        let annotations = vec![
            highlight("a", "one", "", at(1, 9)),
            highlight("b", "two", "todo: follow up", at(2, 9)),
        ];
        let first = build_markdown(&params(), annotations.clone(), None, at(10, 9));
        let second = build_markdown(&params(), annotations, Some(&first.markdown), at(11, 9));

        assert_eq!(second.markdown, first.markdown);
        assert_eq!(second.new_annotations, 0);
        assert_eq!(second.last_export, Some(at(10, 9)));
    }

    #[test]
    fn new_annotations_are_appended_after_prior_block() {
        let first = build_markdown(
            &params(),
            vec![highlight("a", "one", "", at(1, 9))],
            None,
            at(10, 9),
        );
        let edited = first.markdown.replace("> one\n", "> one (edited by hand)\n");

        let second = build_markdown(
            &params(),
            vec![
                highlight("a", "one", "", at(1, 9)),
                highlight("b", "two", "", at(10, 9)),
            ],
            Some(&edited),
            at(12, 18),
        );

        assert_eq!(second.new_annotations, 1);
        assert!(second.markdown.contains("> one (edited by hand)\n"));
        assert!(second
            .markdown
            .ends_with("### Exported: 2024-03-12 6:00:00 pm\n\n> [!highlight_ffff80]\n> two\n> [page 4](highlights://Deep%20Work#page=4) - [[2024-03-10#9:00 am]]\n\n"));
        assert!(!second.markdown.contains("> one\n"));
    }

    #[test]
    fn filter_keeps_annotations_at_the_marker_instant() {
        let prior = "x\n## Annotations\n\n### Exported: 2024-03-05 9:00:00 am\n\n";
        let out = build_markdown(
            &params(),
            vec![
                highlight("old", "old", "", at(4, 9)),
                highlight("same", "same", "", at(5, 9)),
            ],
            Some(prior),
            at(6, 9),
        );
        assert_eq!(out.new_annotations, 1);
        assert!(out.markdown.contains("> same\n"));
    }

    #[test]
    fn marker_parsing_accepts_legacy_format() {
        assert_eq!(parse_export_marker("2024-03-05 9:00 am"), Some(at(5, 9)));
        assert_eq!(parse_export_marker("2024-03-05 6:00:00 PM"), Some(at(5, 18)));
        assert_eq!(parse_export_marker("last tuesday"), None);
    }

    #[test]
    fn unusable_markers_export_everything() {
        let garbled = "### Exported: 2024-03-05 9:00 am\n\n### Exported: someday\n";
        assert_eq!(last_export_marker(garbled), None);

        let unordered = "### Exported: 2024-03-05 9:00 am\n\n### Exported: 2024-03-01 9:00 am\n";
        assert_eq!(last_export_marker(unordered), None);

        let ordered = "### Exported: 2024-03-01 9:00 am\n\n### Exported: 2024-03-05 9:00:00 am\n";
        assert_eq!(last_export_marker(ordered), Some(at(5, 9)));
    }

    #[test]
    fn marker_starts_its_own_line_after_unterminated_edit() {
        let first = build_markdown(
            &params(),
            vec![highlight("a", "one", "", at(1, 9))],
            None,
            at(5, 9),
        );
        let edited = format!("{}> [!note]\n> my edit", first.markdown);
        let annotations = vec![
            highlight("a", "one", "", at(1, 9)),
            highlight("b", "two", "", at(6, 9)),
        ];

        let second = build_markdown(&params(), annotations.clone(), Some(&edited), at(7, 9));
        assert_eq!(second.new_annotations, 1);
        assert!(second
            .markdown
            .contains("> my edit\n\n### Exported: 2024-03-07 9:00:00 am\n"));

        let third = build_markdown(&params(), annotations, Some(&second.markdown), at(8, 9));
        assert_eq!(third.last_export, Some(at(7, 9)));
        assert_eq!(third.new_annotations, 0);
        assert_eq!(third.markdown, second.markdown);
    }

    #[test]
    fn unterminated_prior_block_is_untouched_without_new_annotations() {
        let first = build_markdown(
            &params(),
            vec![highlight("a", "one", "", at(1, 9))],
            None,
            at(5, 9),
        );
        let edited = format!("{}my edit", first.markdown);
        let again = build_markdown(
            &params(),
            vec![highlight("a", "one", "", at(1, 9))],
            Some(&edited),
            at(6, 9),
        );
        assert_eq!(again.markdown, edited);
    }

    #[test]
    fn split_uses_the_last_header() {
        let doc = "intro\n## Annotations\n\nold notes\n## Annotations\n\n### Exported: 2024-03-01 9:00 am\n\nbody\n";
        let prior = split_prior(doc);
        assert_eq!(prior.exported, "### Exported: 2024-03-01 9:00 am\n\nbody\n");
        assert_eq!(prior.last_export, Some(at(1, 9)));
    }

    #[test]
    fn document_without_header_is_kept_whole() {
        let prior = split_prior("my own notes\n");
        assert_eq!(prior.exported, "my own notes\n");
        assert!(prior.last_export.is_none());
    }

    #[test]
    fn comments_render_as_bullets_and_tasks_as_checkboxes() {
        let mut a = highlight("a", "text", "todo: call Sam\n\n- about the draft", at(1, 9));
        a.push_comment("second entry");
        a.is_task = true;
        let block = render_block("Deep Work", &a);
        assert!(block.contains(
            "> - [ ] todo: call Sam\n>    - about the draft\n>    - second entry\n"
        ));
        assert!(block.ends_with("\n\n"));
    }

    #[test]
    fn note_and_image_blocks_have_no_body_text() {
        let mut note = highlight("n", "ignored", "margin thought", at(1, 9));
        note.kind = AnnotationKind::Note;
        note.annotated_text = None;
        let block = render_block("doc", &note);
        assert!(block.starts_with("> [!note]\n> [page 4](highlights://doc#page=4)"));
        assert!(block.contains("> - margin thought\n"));

        let mut image = highlight("i", "", "", at(1, 9));
        image.kind = AnnotationKind::Image;
        image.annotated_text = None;
        image.comment = None;
        image.push_image_path("doc-p4-a0.png");
        image.push_image_path("doc-p4-a1.png");
        let block = render_block("doc", &image);
        assert!(block.starts_with("> [!image]\n> ![[doc-p4-a0.png]]\n> ![[doc-p4-a1.png]]\n"));
    }

    #[test]
    fn strikethrough_uses_strike_label() {
        let mut a = highlight("s", "gone\n\nwrong", "", at(1, 9));
        a.kind = AnnotationKind::Strikethrough;
        a.color = "#ff8080".into();
        let block = render_block("doc", &a);
        assert!(block.starts_with("> [!strike_ff8080]\n> gone\n> wrong\n"));
    }

    #[test]
    fn empty_annotation_renders_nothing() {
        let mut a = highlight("e", "", "", at(1, 9));
        a.annotated_text = None;
        assert_eq!(render_block("doc", &a), "");
    }

    #[test]
    fn preamble_collects_keywords_and_callout_summaries() {
        let mut question = highlight("q", "what is deep work?", "question", at(1, 9));
        question.set_callout(Some("question".into()));
        let mut asked = highlight("q2", "ignored", "Question: why now?", at(2, 9));
        asked.set_callout(Some("question".into()));

        let annotations = vec![
            highlight("k1", "attention residue", "keyword", at(1, 10)),
            highlight("k2", "x", "keyword: flow, focus ,craft", at(1, 11)),
            question,
            asked,
        ];
        let p = params();
        let preamble = build_preamble(&p, &Classifier::new(&p), &annotations);

        assert!(preamble.contains("> - **Keywords:** attention residue, flow, focus, craft\n"));
        assert!(preamble.contains(
            "> [!question: Question]\n\
             > - what is deep work?\n> [page 4](highlights://Deep%20Work#page=4)\n\
             > - why now?\n> [page 4](highlights://Deep%20Work#page=4)\n\n"
        ));
        assert!(preamble.ends_with("\n\n## Annotations\n\n"));
    }
}
