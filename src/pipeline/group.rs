//! Sorting and grouping of annotation records.
//!
//! Sorting is stable, so ties keep extraction order. Groups are ordered
//! maps in first-seen bucket order, each bucket sorted by the same rule as
//! the flat list.

use crate::config::{GroupBy, InputParams, SortBy};
use crate::output::{Annotation, AnnotationData};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// Bucket key for annotations with no tag under [`GroupBy::Tag`].
pub const UNTAGGED_BUCKET: &str = "none";

/// Order `annotations` in place according to `sort_by`.
pub fn sort_annotations(sort_by: SortBy, annotations: &mut [Annotation]) {
    match sort_by {
        SortBy::Location => {}
        SortBy::Date => annotations.sort_by_key(|a| a.date),
        SortBy::Color => annotations.sort_by(|a, b| a.color.cmp(&b.color)),
    }
}

/// Partition `annotations` by `params.group_by`.
pub fn group_annotations(
    params: &InputParams,
    annotations: &[Annotation],
) -> IndexMap<String, Vec<Annotation>> {
    let key = |a: &Annotation| -> String {
        match params.group_by {
            GroupBy::Tag => a.first_tag().unwrap_or(UNTAGGED_BUCKET).to_string(),
            GroupBy::Color => a.color.clone(),
            GroupBy::ExportDate => a.export_date.format(&params.date_time_format).to_string(),
            GroupBy::AnnotationDate => a.export_date.format(&params.date_format).to_string(),
        }
    };
    bucket(params.sort_by, annotations.iter().map(|a| (key(a), a)))
}

/// Partition callouts by type; non-callouts are left out.
pub fn group_callouts(
    params: &InputParams,
    annotations: &[Annotation],
) -> IndexMap<String, Vec<Annotation>> {
    bucket(
        params.sort_by,
        annotations
            .iter()
            .filter(|a| a.is_callout)
            .filter_map(|a| a.callout_type.clone().map(|t| (t, a))),
    )
}

fn bucket<'a>(
    sort_by: SortBy,
    entries: impl Iterator<Item = (String, &'a Annotation)>,
) -> IndexMap<String, Vec<Annotation>> {
    let mut groups: IndexMap<String, Vec<Annotation>> = IndexMap::new();
    for (key, annotation) in entries {
        groups.entry(key).or_default().push(annotation.clone());
    }
    for list in groups.values_mut() {
        sort_annotations(sort_by, list);
    }
    groups
}

/// Keep annotations dated at or after `since`.
pub fn filter_since(annotations: Vec<Annotation>, since: Option<DateTime<Utc>>) -> Vec<Annotation> {
    match since {
        Some(t) => annotations.into_iter().filter(|a| a.date >= t).collect(),
        None => annotations,
    }
}

/// Build the JSON view: `lastExportDate` filter, then sort and group.
pub fn prepare_annotation_data(params: &InputParams, annotations: Vec<Annotation>) -> AnnotationData {
    let mut annotations = filter_since(annotations, params.last_export_date);
    sort_annotations(params.sort_by, &mut annotations);
    AnnotationData {
        grouped_annotations: group_annotations(params, &annotations),
        callouts: group_callouts(params, &annotations),
        annotations,
    }
}
