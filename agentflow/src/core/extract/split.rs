//! Lenient `FILE:` splitting for output that keeps the header but not the
//! strict field order.

use std::sync::LazyLock;

use regex::Regex;

use super::{ExtractStrategy, flag_value, has_modification_tag, non_empty, tidy_path};
use crate::core::types::FileRecord;

static LOOSE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    // Tolerates markdown decoration such as `### FILE:`, `- **FILE:** path`.
    Regex::new(r"(?im)^[ \t>#*\-]*\**[ \t]*FILE[ \t]*\**[ \t]*:[ \t]*\**[ \t]*(.*)$")
        .expect("loose header regex")
});

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[ \t>*\-]*\**[ \t]*(type|description|modifications?|operation|content)[ \t]*\**[ \t]*:[ \t]*\**(.*)$")
        .expect("field regex")
});

/// Split on every `FILE:` header and pair it with the text up to the next one.
///
/// `Type:`, `Description:` and modification fields are picked up in any order
/// directly below the header; everything after them (or after a `Content:`
/// label) is the content.
pub struct SplitOnHeaderStrategy;

impl ExtractStrategy for SplitOnHeaderStrategy {
    fn name(&self) -> &'static str {
        "split_on_header"
    }

    fn extract(&self, text: &str) -> Vec<FileRecord> {
        let headers: Vec<_> = LOOSE_HEADER.captures_iter(text).collect();
        let mut records = Vec::new();
        for (i, caps) in headers.iter().enumerate() {
            let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let body_end = headers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(text.len());
            let body = text.get(whole.end()..body_end).unwrap_or_default();
            if let Some(record) = parse_block(value.as_str(), body) {
                records.push(record);
            }
        }
        records
    }
}

fn parse_block(header_value: &str, body: &str) -> Option<FileRecord> {
    let path = tidy_path(header_value);
    if path.is_empty() {
        return None;
    }
    let mut record = FileRecord::new(path, String::new());
    record.is_modification = has_modification_tag(header_value);

    let lines: Vec<&str> = body.lines().collect();
    let mut idx = 0;
    while idx < lines.len() {
        let line = lines[idx];
        if line.trim().is_empty() {
            idx += 1;
            continue;
        }
        let Some(caps) = FIELD.captures(line) else {
            break;
        };
        let key = caps.get(1).map(|m| m.as_str().to_ascii_lowercase());
        let value = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let value = value.trim().trim_end_matches('*').trim();
        match key.as_deref() {
            Some("type") => record.declared_type = non_empty(value),
            Some("description") => record.description = non_empty(value),
            Some("content") => {
                let mut content_lines = Vec::with_capacity(lines.len() - idx);
                if !value.is_empty() {
                    content_lines.push(value);
                }
                content_lines.extend_from_slice(&lines[idx + 1..]);
                record.content = content_lines.join("\n").trim().to_string();
                return Some(record);
            }
            Some(_) => record.is_modification |= flag_value(value),
            None => break,
        }
        idx += 1;
    }

    record.content = lines[idx.min(lines.len())..].join("\n").trim().to_string();
    Some(record)
}
