//! Continuation merging: folding a physical annotation into its predecessor.
//!
//! Long passages often need several marks (a highlight that crosses a column
//! or a page break). A comment starting with the configured continuation
//! prefix says "this mark extends the previous one". [`ContinuationMerger`]
//! is the accumulator for the forward pass: it owns the emitted records and
//! tracks the index of the last emitted one, so merges only ever reach one
//! record back.

use super::classify::{Classification, PrefixMatcher};
use crate::output::Annotation;
use tracing::debug;

/// What [`ContinuationMerger::push`] did with an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Became a new record.
    Emitted,
    /// Folded into the preceding record.
    Merged,
}

/// Forward-pass accumulator of annotation records.
#[derive(Debug, Clone, Default)]
pub struct ContinuationMerger {
    prefix: Option<PrefixMatcher>,
    records: Vec<Annotation>,
    last: Option<usize>,
}

impl ContinuationMerger {
    /// `prefix` of `None` (or empty) disables merging.
    pub fn new(prefix: Option<&str>) -> Self {
        Self {
            prefix: prefix.and_then(PrefixMatcher::new),
            records: Vec::new(),
            last: None,
        }
    }

    /// Take one normalised annotation with its raw comment and the
    /// classification of that comment.
    pub fn push(
        &mut self,
        mut annotation: Annotation,
        comment: &str,
        classification: Classification,
    ) -> MergeOutcome {
        let continuation = self.prefix.as_ref().and_then(|p| p.strip(comment));

        if let (Some(rest), Some(last)) = (continuation, self.last) {
            let target = &mut self.records[last];
            for text in annotation.annotated_text.take().into_iter().flatten() {
                target.push_annotated_text(text);
            }
            target.push_comment(rest.to_string());
            target.tags.extend(classification.tags);
            // Only image records render their files.
            if target.image_path.is_some() {
                for file in annotation.image_path.take().into_iter().flatten() {
                    target.push_image_path(file);
                }
            }
            debug!("Page {}: merged continuation into {}", annotation.page, target.id);
            return MergeOutcome::Merged;
        }

        annotation.tags = classification.tags;
        annotation.is_task = classification.is_task;
        annotation.set_callout(classification.callout_type);

        self.records.push(annotation);
        self.last = Some(self.records.len() - 1);
        MergeOutcome::Emitted
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in extraction order.
    pub fn into_records(self) -> Vec<Annotation> {
        self.records
    }
}
