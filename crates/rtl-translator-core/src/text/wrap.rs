use std::sync::LazyLock;

use regex::Regex;

use super::shape::shape_rtl;

/// Width of a run of (already shaped) text at a given font size.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font_size: f32) -> f32;
}

#[allow(clippy::expect_used)]
static SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+\s*").expect("valid segment regex"));

/// Greedily wrap `text` into lines no wider than `max_width`.
///
/// Lines are returned in logical order and unshaped; every candidate is
/// measured in its shaped, visual form. Words wider than the line are cut
/// at the longest prefix that fits (at least one character). Blank input
/// lines are preserved as empty lines.
pub fn wrap_rtl(
    text: &str,
    font_size: f32,
    max_width: f32,
    measure: &impl TextMeasure,
) -> Vec<String> {
    let fits = |candidate: &str| {
        measure.text_width(&shape_rtl(candidate.trim_end()), font_size) <= max_width
    };

    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        for segment in SEGMENT_RE.find_iter(paragraph) {
            let mut remainder = segment.as_str().to_string();

            while !remainder.is_empty() {
                let candidate = format!("{current}{remainder}");
                if fits(&candidate) {
                    current = candidate;
                    remainder.clear();
                } else if !current.is_empty() {
                    lines.push(current.trim_end().to_string());
                    current.clear();
                } else {
                    let (part, rest) = split_segment(&remainder, &fits);
                    if part.is_empty() {
                        break;
                    }
                    lines.push(part);
                    remainder = rest;
                }
            }
        }

        if !current.trim().is_empty() {
            lines.push(current.trim_end().to_string());
        }
    }

    lines
}

/// Longest prefix of `segment` that fits, found by binary search on characters.
fn split_segment(segment: &str, fits: &impl Fn(&str) -> bool) -> (String, String) {
    let chars: Vec<char> = segment.trim_start().chars().collect();
    if chars.is_empty() {
        return (String::new(), String::new());
    }

    let (mut lo, mut hi, mut best) = (1usize, chars.len(), 1usize);
    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        let sample: String = chars[..mid].iter().collect();
        if fits(&sample) {
            best = mid;
            lo = mid + 1;
        } else {
            hi = mid - 1;
        }
    }

    let part: String = chars[..best].iter().collect();
    let rest: String = chars[best..].iter().collect();
    (part.trim_end().to_string(), rest.trim_start().to_string())
}

/// Total height of `line_count` lines at `font_size` and line gap factor `line_gap`.
pub fn measure_height(line_count: usize, font_size: f32, line_gap: f32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let n = line_count as f32;
    n * font_size * line_gap
}

/// Every character is `factor * size` wide.
///
/// Stands in for real glyph metrics when no font is loaded.
#[derive(Debug, Clone, Copy)]
pub struct FixedWidth(pub f32);

impl TextMeasure for FixedWidth {
    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let n = text.chars().count() as f32;
        n * self.0 * font_size
    }
}
