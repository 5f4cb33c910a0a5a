//! Fenced code blocks whose first line is a path comment.

use std::sync::LazyLock;

use regex::Regex;

use super::{
    ExtractStrategy, fence_body, has_modification_tag, is_fence_open, non_empty, tidy_path,
};
use crate::core::types::FileRecord;

static PATH_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^\s*(?://|#|--|;|/\*|<!--)\s*",
        r"(?:(?:file(?:name)?|path)\s*:\s*)?",
        r"([\w./\-]+\.[A-Za-z0-9]+)",
        r"(\s*[\[(][^\])]*[\])])?",
        r"\s*(?:\*/|-->)?\s*$",
    ))
    .expect("path comment regex")
});

/// ```` ```lang ```` fences annotated with a leading `// path/to/file.ext`
/// comment (or the `#`, `--`, `;`, `/* */`, `<!-- -->` equivalents).
pub struct FencedBlockStrategy;

impl ExtractStrategy for FencedBlockStrategy {
    fn name(&self) -> &'static str {
        "fenced_block"
    }

    fn extract(&self, text: &str) -> Vec<FileRecord> {
        let lines: Vec<&str> = text.lines().collect();
        let mut records = Vec::new();
        let mut idx = 0;
        while idx < lines.len() {
            if !is_fence_open(lines[idx]) {
                idx += 1;
                continue;
            }
            let lang = lines[idx].trim_start().trim_start_matches('`');
            let (body, next) = fence_body(&lines, idx);
            if let Some(record) = record_from_body(lang, &body) {
                records.push(record);
            }
            idx = next;
        }
        records
    }
}

fn record_from_body(lang: &str, body: &[&str]) -> Option<FileRecord> {
    let first = body.iter().position(|line| !line.trim().is_empty())?;
    let caps = PATH_COMMENT.captures(body[first])?;
    let path = tidy_path(caps.get(1)?.as_str());
    if path.is_empty() {
        return None;
    }
    let mut record = FileRecord::new(path, body[first + 1..].join("\n").trim().to_string());
    record.declared_type = non_empty(lang);
    record.is_modification = caps
        .get(2)
        .map(|m| has_modification_tag(m.as_str()))
        .unwrap_or(false);
    Some(record)
}
