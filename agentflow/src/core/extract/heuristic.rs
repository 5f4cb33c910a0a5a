//! Last-resort scan: a filename mentioned in prose, followed by a fence.

use std::sync::LazyLock;

use regex::Regex;

use super::{ExtractStrategy, fence_body, has_modification_tag, is_fence_open, non_empty, tidy_path};
use crate::core::types::FileRecord;

static LABELED_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(path|file(?:name)?|modified(?:\s+file)?|updated(?:\s+file)?)\s*\**\s*:\s*\**\s*`?([^\s`*]+)")
        .expect("labeled path regex")
});

static BARE_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)(?:^|[\s(\[`'*])",
        r"([\w\-./]+\.(?:html?|css|scss|js|jsx|ts|tsx|py|md|json|xml|txt|rs|toml|ya?ml|sh|sql|java|go|rb|php|c|h|cpp|hpp|cs|kt|swift|ini|cfg|env|csv|vue))",
        r"(?:$|[\s)\]`'*:,.])",
    ))
    .expect("bare filename regex")
});

/// Pairs the most recent filename-like token outside a fence with the next
/// fenced region. No structural header is required.
pub struct HeuristicStrategy;

impl ExtractStrategy for HeuristicStrategy {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn extract(&self, text: &str) -> Vec<FileRecord> {
        let lines: Vec<&str> = text.lines().collect();
        let mut records = Vec::new();
        let mut pending: Option<(String, bool)> = None;
        let mut idx = 0;
        while idx < lines.len() {
            let line = lines[idx];
            if is_fence_open(line) {
                let (body, next) = fence_body(&lines, idx);
                if let Some((path, is_modification)) = pending.take() {
                    let lang = line.trim_start().trim_start_matches('`');
                    let mut record = FileRecord::new(path, body.join("\n").trim().to_string());
                    record.declared_type = non_empty(lang);
                    record.is_modification = is_modification;
                    records.push(record);
                }
                idx = next;
                continue;
            }
            if let Some(candidate) = candidate_path(line) {
                pending = Some(candidate);
            }
            idx += 1;
        }
        records
    }
}

fn candidate_path(line: &str) -> Option<(String, bool)> {
    if let Some(caps) = LABELED_PATH.captures(line) {
        let label = caps.get(1)?.as_str().to_ascii_lowercase();
        let path = tidy_path(caps.get(2)?.as_str().trim_end_matches([',', '.', ':', ')']));
        if !path.is_empty() {
            let flagged = label.starts_with("modified") || label.starts_with("updated");
            return Some((path, flagged || has_modification_tag(line)));
        }
    }
    let caps = BARE_FILENAME.captures(line)?;
    let path = tidy_path(caps.get(1)?.as_str());
    (!path.is_empty()).then(|| (path, has_modification_tag(line)))
}
