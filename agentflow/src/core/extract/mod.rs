//! Recover [`FileRecord`]s from unreliable generated text.
//!
//! Generated output follows the `FILE:` / `Type:` / `Description:` / `Content:`
//! protocol only loosely, so extraction is an ordered cascade of independent
//! strategies. Each strategy is tried only when every earlier one produced
//! nothing; the first non-empty result wins. Extraction is pure and never fails:
//! text without recognizable blocks yields an empty vector.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::FileRecord;

mod fenced;
mod heuristic;
mod split;
mod strict;

pub use fenced::FencedBlockStrategy;
pub use heuristic::HeuristicStrategy;
pub use split::SplitOnHeaderStrategy;
pub use strict::{StrictLabelStrategy, StrictMarkerStrategy};

/// One way of reading file blocks out of generated text.
pub trait ExtractStrategy {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Return every record this strategy recognizes, in text order.
    fn extract(&self, text: &str) -> Vec<FileRecord>;
}

/// Ordered list of strategies tried until one yields records.
pub struct Extractor {
    strategies: Vec<Box<dyn ExtractStrategy>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(vec![
            Box::new(StrictMarkerStrategy),
            Box::new(StrictLabelStrategy),
            Box::new(SplitOnHeaderStrategy),
            Box::new(FencedBlockStrategy),
            Box::new(HeuristicStrategy),
        ])
    }
}

impl Extractor {
    pub fn new(strategies: Vec<Box<dyn ExtractStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn extract(&self, text: &str) -> Vec<FileRecord> {
        self.extract_named(text)
            .map(|(_, records)| records)
            .unwrap_or_default()
    }

    /// Like [`Extractor::extract`], also reporting which strategy matched.
    pub fn extract_named(&self, text: &str) -> Option<(&'static str, Vec<FileRecord>)> {
        if text.trim().is_empty() {
            return None;
        }
        for strategy in &self.strategies {
            let records = strategy.extract(text);
            if !records.is_empty() {
                tracing::debug!(
                    strategy = strategy.name(),
                    records = records.len(),
                    "extracted file records"
                );
                return Some((strategy.name(), records));
            }
        }
        tracing::debug!(len = text.len(), "no strategy matched");
        None
    }
}

/// Extract records with the default strategy cascade.
pub fn extract(text: &str) -> Vec<FileRecord> {
    Extractor::default().extract(text)
}

static MODIFICATION_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[\[(]\s*(?:modify|modified|modification|update|updated)\s*[\])]")
        .expect("modification tag regex")
});

/// True when a header or path line carries an explicit modification tag.
fn has_modification_tag(line: &str) -> bool {
    MODIFICATION_TAG.is_match(line)
}

/// Remove modification tags from a header value before treating it as a path.
fn strip_modification_tag(value: &str) -> String {
    MODIFICATION_TAG.replace_all(value, "").trim().to_string()
}

/// Interpret the value of a `Modification:` / `Operation:` field.
fn flag_value(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "y" | "1" | "modify" | "modified" | "modification" | "update"
    )
}

/// Trim a path and drop surrounding markdown decoration.
fn tidy_path(raw: &str) -> String {
    strip_modification_tag(raw)
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '`' | '"' | '\''))
        .to_string()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Collect the body of a fenced block starting after the opener at `lines[open]`.
///
/// Returns the body lines and the index just past the closing fence. An
/// unterminated fence runs to the end of the text.
fn fence_body<'a>(lines: &[&'a str], open: usize) -> (Vec<&'a str>, usize) {
    let mut body = Vec::new();
    let mut idx = open + 1;
    while idx < lines.len() {
        if lines[idx].trim() == "```" {
            return (body, idx + 1);
        }
        body.push(lines[idx]);
        idx += 1;
    }
    (body, idx)
}

fn is_fence_open(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clean::clean_content;

    #[test]
    fn label_scenario_yields_two_records() {
        let text = "FILE: a.txt\nType: text\nDescription: d\nContent:\nhello\nFILE: b.txt\nType: text\nDescription: d2\nContent:\nworld";
        let records = extract(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, "a.txt");
        assert_eq!(records[0].content, "hello");
        assert_eq!(records[0].description.as_deref(), Some("d"));
        assert_eq!(records[1].path, "b.txt");
        assert_eq!(records[1].content, "world");
        assert_eq!(records[1].description.as_deref(), Some("d2"));
    }

    #[test]
    fn both_strict_variants_agree() {
        let marker = "FILE: src/a.rs\nType: rust\nDescription: first\n<<<CONTENT\nfn a() {}\nCONTENT>>>\n\nFILE: src/b.rs\nType: rust\nDescription: second\n<<<CONTENT\nfn b() {}\nCONTENT>>>\n";
        let label = "FILE: src/a.rs\nType: rust\nDescription: first\nContent:\nfn a() {}\n\nFILE: src/b.rs\nType: rust\nDescription: second\nContent:\nfn b() {}\n";

        let from_marker = extract(marker);
        let from_label = extract(label);
        assert_eq!(from_marker, from_label);
        assert_eq!(from_marker.len(), 2);
        assert_eq!(from_marker[1].content, "fn b() {}");
    }

    #[test]
    fn missing_end_marker_keeps_both_records() {
        let text = "FILE: a.txt\nType: t\nDescription: d\n<<<CONTENT\nalpha\n\nFILE: b.txt\nType: t\nDescription: d\n<<<CONTENT\nbeta\nCONTENT>>>";
        let (strategy, records) = Extractor::default().extract_named(text).expect("records");
        assert_eq!(strategy, "split_on_header");
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, ["a.txt", "b.txt"]);
        assert_eq!(clean_content(&records[0].content), "alpha");
        assert_eq!(clean_content(&records[1].content), "beta");
    }

    #[test]
    fn unrecognized_text_yields_nothing() {
        assert!(extract("").is_empty());
        assert!(extract("Sure! Here is a summary of the requirements.").is_empty());
        assert!(extract("```\nno path here\n```").is_empty());
    }

    #[test]
    fn reports_matching_strategy() {
        let extractor = Extractor::default();
        let (name, records) = extractor
            .extract_named("```rust\n// src/lib.rs\npub fn x() {}\n```")
            .expect("match");
        assert_eq!(name, "fenced_block");
        assert_eq!(records[0].path, "src/lib.rs");
    }

    #[test]
    fn earlier_strategy_shadows_later_ones() {
        let text = "FILE: a.txt\nType: text\nDescription: d\nContent:\nhello\n\nnotes.md\n```\nignored\n```";
        let records = extract(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "a.txt");
    }

    #[test]
    fn duplicate_paths_are_kept() {
        let text = "FILE: a.txt\nType: t\nDescription: one\nContent:\nfirst\nFILE: a.txt\nType: t\nDescription: two\nContent:\nsecond";
        let records = extract(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content, "first");
        assert_eq!(records[1].content, "second");
    }
}
