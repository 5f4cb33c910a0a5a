//! Idempotent cleanup of extracted content and record paths.

use std::sync::LazyLock;

use regex::Regex;

static START_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:<<<\s*CONTENT|BEGIN\s+CONTENT)\s*$").expect("start marker regex")
});
static END_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:CONTENT\s*>>>|END\s+CONTENT)\s*$").expect("end marker regex")
});

/// Remove residual fence and content-marker decoration from `raw`.
///
/// Applies single-layer strips until nothing changes, so
/// `clean_content(clean_content(x)) == clean_content(x)`.
pub fn clean_content(raw: &str) -> String {
    let mut current = raw.trim().to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let Some((first, rest)) = lines.split_first() else {
        return String::new();
    };

    if is_fence(first) {
        // Opening fence, possibly with a language tag. A missing closing fence is
        // tolerated only when no other fence follows (truncated generation).
        match rest.split_last() {
            Some((last, inner)) if last.trim() == "```" => {
                return inner.join("\n").trim().to_string();
            }
            _ if !rest.iter().any(|line| is_fence(line)) => {
                return rest.join("\n").trim().to_string();
            }
            _ => {}
        }
    }
    if START_MARKER.is_match(first) {
        let body = match rest.split_last() {
            Some((last, inner)) if END_MARKER.is_match(last) => inner,
            _ => rest,
        };
        return body.join("\n").trim().to_string();
    }
    if let Some((last, inner)) = lines.split_last() {
        let dangling_fence = last.trim() == "```" && !inner.iter().any(|line| is_fence(line));
        if dangling_fence || END_MARKER.is_match(last) {
            return inner.join("\n").trim().to_string();
        }
    }
    text.trim().to_string()
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Clean a record path as produced by a generator.
///
/// Strips markdown emphasis, backticks and quotes, drops all whitespace and
/// normalizes `\` separators to `/`.
pub fn clean_record_path(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c: char| matches!(c, '*' | '`' | '"' | '\''));
    trimmed
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '\\' { '/' } else { c })
        .collect::<String>()
        .trim_end_matches('*')
        .to_string()
}
