//! Strict block grammar: `FILE:`, `Type:`, `Description:` headers in that
//! order, then an explicit content region.
//!
//! Two header-order variants exist because generators are not consistent about
//! how they delimit content: explicit start/end markers, or a `Content:` label
//! running to the next `FILE:` header.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{ExtractStrategy, flag_value, has_modification_tag, non_empty, tidy_path};
use crate::core::types::FileRecord;

static MARKER_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?ims)^[ \t]*FILE:[ \t]*([^\n]+?)[ \t]*\r?\n",
        r"[ \t]*Type:[ \t]*([^\n]*?)[ \t]*\r?\n",
        r"[ \t]*Description:[ \t]*([^\n]*?)[ \t]*\r?\n",
        r"(?:[ \t]*(?:Modifications?|Operation):[ \t]*([^\n]*?)[ \t]*\r?\n)?",
        r"[ \t]*(?:<<<[ \t]*CONTENT|BEGIN[ \t]+CONTENT)[ \t]*\r?\n",
        r"(.*?)",
        r"^[ \t]*(?:CONTENT[ \t]*>>>|END[ \t]+CONTENT)[ \t]*$",
    ))
    .expect("marker block regex")
});

/// Start of a block: an unindented `FILE:` line directly followed by `Type:`
/// and `Description:` lines. A bare `file:` key inside content never matches.
static HEADER_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?m)^FILE:[^\n]*\n",
        r"[ \t]*(?i:type)[ \t]*:[^\n]*\n",
        r"[ \t]*(?i:description)[ \t]*:",
    ))
    .expect("header sequence regex")
});

static LABEL_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?is)\A[ \t]*FILE:[ \t]*([^\n]*?)[ \t]*\r?\n",
        r"[ \t]*Type:[ \t]*([^\n]*?)[ \t]*\r?\n",
        r"[ \t]*Description:[ \t]*([^\n]*?)[ \t]*\r?\n",
        r"(?:[ \t]*(?:Modifications?|Operation):[ \t]*([^\n]*?)[ \t]*\r?\n)?",
        r"[ \t]*Content:(.*)\z",
    ))
    .expect("label block regex")
});

/// Strict headers with `<<<CONTENT` / `CONTENT>>>` (or `BEGIN CONTENT` /
/// `END CONTENT`) delimiting the content.
pub struct StrictMarkerStrategy;

impl ExtractStrategy for StrictMarkerStrategy {
    fn name(&self) -> &'static str {
        "strict_marker"
    }

    fn extract(&self, text: &str) -> Vec<FileRecord> {
        let mut records = Vec::new();
        for caps in MARKER_BLOCK.captures_iter(text) {
            // A body holding another block header means an end marker is missing.
            if caps
                .get(5)
                .is_some_and(|body| HEADER_SEQUENCE.is_match(body.as_str()))
            {
                return Vec::new();
            }
            records.extend(record_from_captures(&caps));
        }
        records
    }
}

/// Strict headers followed by a `Content:` label; content runs to the next
/// `FILE:` header or the end of the text.
pub struct StrictLabelStrategy;

impl ExtractStrategy for StrictLabelStrategy {
    fn name(&self) -> &'static str {
        "strict_label"
    }

    fn extract(&self, text: &str) -> Vec<FileRecord> {
        header_blocks(text)
            .into_iter()
            .filter_map(|block| LABEL_BLOCK.captures(block))
            .filter_map(|caps| record_from_captures(&caps))
            .collect()
    }
}

/// Slice `text` into blocks, each starting at a full header sequence and
/// ending just before the next one (or at the end of the text).
fn header_blocks(text: &str) -> Vec<&str> {
    let starts: Vec<usize> = HEADER_SEQUENCE.find_iter(text).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            &text[start..end]
        })
        .collect()
}

fn record_from_captures(caps: &Captures<'_>) -> Option<FileRecord> {
    let raw_path = caps.get(1)?.as_str();
    let path = tidy_path(raw_path);
    if path.is_empty() {
        return None;
    }
    let flagged = caps
        .get(4)
        .map(|m| flag_value(m.as_str()))
        .unwrap_or(false);
    Some(FileRecord {
        path,
        declared_type: caps.get(2).and_then(|m| non_empty(m.as_str())),
        description: caps.get(3).and_then(|m| non_empty(m.as_str())),
        content: caps.get(5).map(|m| m.as_str().trim()).unwrap_or_default().to_string(),
        is_modification: flagged || has_modification_tag(raw_path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_variant_reads_content_between_markers() {
        let text = "Here you go:\n\nFILE: docs/plan.md\nType: markdown\nDescription: The plan\n<<<CONTENT\n# Plan\n\nFILE: not a header inside content\nCONTENT>>>\ntrailing chatter";
        let records = StrictMarkerStrategy.extract(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "docs/plan.md");
        assert_eq!(records[0].declared_type.as_deref(), Some("markdown"));
        assert_eq!(
            records[0].content,
            "# Plan\n\nFILE: not a header inside content"
        );
    }

    #[test]
    fn marker_variant_accepts_begin_end_markers() {
        let text = "file: a.txt\ntype: text\ndescription: lower-case headers\nBEGIN CONTENT\nx\nEND CONTENT";
        let records = StrictMarkerStrategy.extract(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "x");
    }

    #[test]
    fn label_variant_runs_last_block_to_end_of_text() {
        let text = "FILE: a.txt\nType: text\nDescription: d\nContent:\nline one\nline two\n";
        let records = StrictLabelStrategy.extract(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "line one\nline two");
    }

    #[test]
    fn label_variant_skips_malformed_blocks() {
        let text = "FILE: bad.txt\nContent:\nno headers\nFILE: good.txt\nType: text\nDescription: ok\nContent:\nfine";
        let records = StrictLabelStrategy.extract(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "good.txt");
        assert_eq!(records[0].content, "fine");
    }

    #[test]
    fn label_variant_keeps_file_keys_inside_content() {
        let text = "FILE: docker-compose.yml\nType: yaml\nDescription: compose\nContent:\nservices:\n  app:\n    logging:\n      file: app.log\n    ports:\n      - \"80:80\"\n";
        let records = StrictLabelStrategy.extract(text);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].content,
            "services:\n  app:\n    logging:\n      file: app.log\n    ports:\n      - \"80:80\""
        );
    }

    #[test]
    fn label_variant_splits_only_on_full_headers() {
        let text = "FILE: model.py\nType: python\nDescription: model\nContent:\ndef load(\nfile: str):\n    pass\nFILE: b.txt\nType: text\nDescription: d\nContent:\nb";
        let records = StrictLabelStrategy.extract(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content, "def load(\nfile: str):\n    pass");
        assert_eq!(records[1].path, "b.txt");
    }

    #[test]
    fn marker_variant_declines_unterminated_blocks() {
        let text = "FILE: a.txt\nType: t\nDescription: d\n<<<CONTENT\nalpha\n\nFILE: b.txt\nType: t\nDescription: d\n<<<CONTENT\nbeta\nCONTENT>>>";
        assert!(StrictMarkerStrategy.extract(text).is_empty());
    }

    #[test]
    fn modification_flag_is_explicit() {
        let text = "FILE: app.py\nType: python\nDescription: fix\nModifications: true\nContent:\nprint(1)\nFILE: new.py\nType: python\nDescription: add\nContent:\nprint(2)";
        let records = StrictLabelStrategy.extract(text);
        assert_eq!(records.len(), 2);
        assert!(records[0].is_modification);
        assert!(!records[1].is_modification);
    }

    #[test]
    fn modification_tag_on_header_is_stripped_from_path() {
        let text = "FILE: src/app.js [MODIFY]\nType: js\nDescription: tweak\nContent:\nlet a;";
        let records = StrictLabelStrategy.extract(text);
        assert_eq!(records[0].path, "src/app.js");
        assert!(records[0].is_modification);
    }

    #[test]
    fn empty_type_becomes_none() {
        let text = "FILE: a.txt\nType:\nDescription: d\nContent:\nbody";
        let records = StrictLabelStrategy.extract(text);
        assert_eq!(records[0].declared_type, None);
    }
}
