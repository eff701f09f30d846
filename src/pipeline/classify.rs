//! Comment classification: tags, task flag and callout type.
//!
//! All prefixes are user-controlled strings, so they are escaped with
//! [`regex::escape`] before being compiled into anchored, case-insensitive
//! patterns. Patterns are compiled once per run in [`Classifier::new`].

use crate::config::{CalloutRule, InputParams};
use regex::{Regex, RegexBuilder};

/// An anchored, case-insensitive literal prefix.
#[derive(Debug, Clone)]
pub struct PrefixMatcher {
    prefix: String,
    pattern: Regex,
}

impl PrefixMatcher {
    /// Compile `prefix`; `None` for an empty prefix.
    pub fn new(prefix: &str) -> Option<Self> {
        if prefix.is_empty() {
            return None;
        }
        let pattern = RegexBuilder::new(&format!(r"^{}\s*", regex::escape(prefix)))
            .case_insensitive(true)
            .build()
            .ok()?;
        Some(Self {
            prefix: prefix.to_string(),
            pattern,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// The text after the prefix and any whitespace following it.
    pub fn strip<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.pattern.find(text).map(|m| &text[m.end()..])
    }
}

/// Classification derived from one comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub tags: Vec<String>,
    pub is_task: bool,
    pub callout_type: Option<String>,
}

/// Prefix rules compiled from [`InputParams`].
#[derive(Debug, Clone)]
pub struct Classifier {
    task: Option<PrefixMatcher>,
    callouts: Vec<(CalloutRule, PrefixMatcher)>,
}

impl Classifier {
    pub fn new(params: &InputParams) -> Self {
        Self {
            task: params.task_prefix.as_deref().and_then(PrefixMatcher::new),
            callouts: params
                .callout_prefixes
                .iter()
                .filter_map(|rule| PrefixMatcher::new(&rule.prefix).map(|m| (rule.clone(), m)))
                .collect(),
        }
    }

    /// Run every check against `comment`. The checks are independent.
    pub fn classify(&self, comment: &str) -> Classification {
        Classification {
            tags: parse_tags(comment),
            is_task: self.is_task(comment),
            callout_type: self.callout_rule(comment).map(|r| r.callout_type.clone()),
        }
    }

    pub fn is_task(&self, comment: &str) -> bool {
        self.task.as_ref().is_some_and(|m| m.is_match(comment))
    }

    /// First callout rule whose prefix matches.
    pub fn callout_rule(&self, comment: &str) -> Option<&CalloutRule> {
        self.callouts
            .iter()
            .find(|(_, m)| m.is_match(comment))
            .map(|(rule, _)| rule)
    }

    /// `comment` with the prefix of the first matching callout rule removed.
    pub fn strip_callout<'t>(&self, comment: &'t str) -> Option<&'t str> {
        self.callouts.iter().find_map(|(_, m)| m.strip(comment))
    }

    /// Configured rules in order.
    pub fn rules(&self) -> impl Iterator<Item = &CalloutRule> {
        self.callouts.iter().map(|(rule, _)| rule)
    }
}

/// Whitespace-separated `#tokens` with every leading `#` removed.
pub fn parse_tags(comment: &str) -> Vec<String> {
    comment
        .split_whitespace()
        .filter(|token| token.starts_with('#'))
        .map(|token| token.trim_start_matches('#'))
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
