use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

const ZWNJ: char = '\u{200C}';
const NBSP: char = '\u{00A0}';

/// Control (except newline), format and private-use code points plus U+FFFD.
///
/// Format (`Cf`) covers the RLM/LRE/PDF marks, soft hyphens and BOMs that
/// PDF extraction leaks; private use covers glyphs without a ToUnicode map.
#[allow(clippy::expect_used)]
static NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{Cf}\p{Co}\x{FFFD}[\p{Cc}&&[^\n]]]").expect("valid noise regex")
});

#[allow(clippy::expect_used)]
static SPACES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("valid spaces regex"));

/// Sanitize extracted text before filtering, chunking or caching.
///
/// Newlines survive as structure; horizontal whitespace is collapsed per
/// line and every line is trimmed.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");

    // Map to spaces before the noise pass, which would otherwise delete them.
    let mapped: String = text
        .chars()
        .map(|c| match c {
            '\r' => '\n',
            ZWNJ | NBSP | '\t' => ' ',
            other => other,
        })
        .nfkc()
        .collect();

    let stripped = NOISE_RE.replace_all(&mapped, "");

    let lines: Vec<String> = stripped
        .split('\n')
        .map(|line| SPACES_RE.replace_all(line, " ").trim().to_string())
        .collect();

    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_normalizes_newlines_and_spaces() {
        assert_eq!(clean_text("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(clean_text("  many    spaces\there  "), "many spaces here");
        assert_eq!(clean_text("x\u{00A0}y"), "x y");
    }

    #[test]
    fn test_clean_zwnj_becomes_space() {
        assert_eq!(clean_text("می\u{200C}خواهم"), "می خواهم");
    }

    #[test]
    fn test_clean_drops_invisible_marks() {
        let dirty = "\u{FEFF}co\u{00AD}operate\u{200F}\u{202A}x\u{202C}\u{FFFD}";
        assert_eq!(clean_text(dirty), "cooperatex");
    }

    #[test]
    fn test_clean_drops_private_use() {
        assert_eq!(clean_text("a\u{E001}b\u{F0001}c"), "abc");
    }

    #[test]
    fn test_clean_applies_nfkc() {
        assert_eq!(clean_text("\u{FB01}le"), "file");
        assert_eq!(clean_text("\u{FF21}"), "A");
    }

    #[test]
    fn test_clean_keeps_blank_line_structure() {
        assert_eq!(clean_text("one\n\n  two  "), "one\n\ntwo");
        assert_eq!(clean_text("   \n  "), "");
    }
}
