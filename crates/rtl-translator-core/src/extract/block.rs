use tracing::debug;

use super::geometry::{PageGeometry, Rect, TextFragment};
use crate::config::ExtractConfig;
use crate::text::clean_text;

/// Grid that fingerprint rectangles snap to, in points.
const ROUND_STEP: f32 = 0.5;

/// Stable address of a block within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub page: usize,
    pub index: usize,
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}#{}", self.page + 1, self.index)
    }
}

/// A region of text to translate.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub rect: Rect,
    pub text: String,
    pub page: usize,
    /// Position among the page's deduplicated blocks
    pub index: usize,
}

impl TextBlock {
    pub const fn id(&self) -> BlockId {
        BlockId {
            page: self.page,
            index: self.index,
        }
    }
}

/// Identity used for deduplication: snapped rectangle plus a hash of the
/// normalised text.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFingerprint {
    pub rect: [f32; 4],
    pub text_hash: String,
}

impl BlockFingerprint {
    pub fn new(rect: &Rect, text: &str) -> Self {
        Self {
            rect: rect.rounded(ROUND_STEP),
            text_hash: format!("{:x}", md5::compute(normalize_for_identity(text))),
        }
    }

    /// Same text and every coordinate within `tolerance` points.
    pub fn is_duplicate_of(&self, other: &Self, tolerance: f32) -> bool {
        self.text_hash == other.text_hash
            && self
                .rect
                .iter()
                .zip(other.rect.iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

/// Whitespace-collapsed, lower-cased cleaned text.
pub fn normalize_for_identity(text: &str) -> String {
    clean_text(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Accumulates fragments (or lines) into one region.
#[derive(Debug, Clone)]
struct Region {
    rect: Rect,
    text: String,
    /// Most recently appended line, for paragraph-gap checks
    last_line: Rect,
}

impl Region {
    fn from_fragment(fragment: &TextFragment) -> Self {
        Self {
            rect: fragment.rect,
            text: fragment.text.trim().to_string(),
            last_line: fragment.rect,
        }
    }
}

/// Turn a page's fragments into deduplicated blocks in reading order.
///
/// Malformed fragments (non-finite or empty rectangles, blank text) are
/// skipped; they never cause an error.
pub fn extract_blocks(geometry: &PageGeometry, config: &ExtractConfig) -> Vec<TextBlock> {
    let valid: Vec<&TextFragment> = geometry
        .fragments
        .iter()
        .filter(|f| f.rect.is_valid() && !f.text.trim().is_empty())
        .collect();

    let skipped = geometry.fragments.len() - valid.len();
    if skipped > 0 {
        debug!(
            "Page {}: skipped {} malformed or empty fragment(s)",
            geometry.page + 1,
            skipped
        );
    }

    let distinct = dedupe_fragments(valid, config.dedup_tolerance);
    let lines = merge_lines(&distinct, config.line_merge_gap);
    let paragraphs = merge_paragraphs(lines, config.paragraph_gap);
    let unique = dedupe_regions(paragraphs, config.dedup_tolerance);

    unique
        .into_iter()
        .enumerate()
        .map(|(index, region)| TextBlock {
            rect: region.rect,
            text: region.text,
            page: geometry.page,
            index,
        })
        .collect()
}

/// Drop fragments drawn again at the same spot (overprinted or repeated
/// text) so they cannot be merged into their own line.
fn dedupe_fragments(fragments: Vec<&TextFragment>, tolerance: f32) -> Vec<&TextFragment> {
    let mut seen: Vec<BlockFingerprint> = Vec::with_capacity(fragments.len());
    let mut kept = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        let fingerprint = BlockFingerprint::new(&fragment.rect, &fragment.text);
        if seen.iter().any(|s| fingerprint.is_duplicate_of(s, tolerance)) {
            debug!("Dropping duplicate fragment at {:?}", fragment.rect);
            continue;
        }
        seen.push(fingerprint);
        kept.push(fragment);
    }

    kept
}

/// Join fragments that sit on the same visual line.
///
/// Two fragments share a line when their vertical overlap is at least half
/// the smaller height and the horizontal gap is at most `gap_factor` times
/// that height.
fn merge_lines(fragments: &[&TextFragment], gap_factor: f32) -> Vec<Region> {
    let mut lines: Vec<Region> = Vec::new();

    for fragment in fragments {
        let rect = fragment.rect;
        if let Some(line) = lines.last_mut() {
            let min_height = line.rect.height().min(rect.height());
            let overlap = line.rect.vertical_overlap(&rect);
            let gap = (rect.x0 - line.rect.x1).max(line.rect.x0 - rect.x1);

            if overlap >= 0.5 * min_height && gap <= gap_factor * min_height {
                line.text.push(' ');
                line.text.push_str(fragment.text.trim());
                line.rect = line.rect.union(&rect);
                line.last_line = line.rect;
                continue;
            }
        }
        lines.push(Region::from_fragment(fragment));
    }

    lines
}

/// Join consecutive lines that belong to the same paragraph.
fn merge_paragraphs(lines: Vec<Region>, gap_factor: f32) -> Vec<Region> {
    let mut paragraphs: Vec<Region> = Vec::new();

    for line in lines {
        if let Some(para) = paragraphs.last_mut() {
            let prev = para.last_line;
            let line_height = prev.height().max(line.rect.height());
            let gap = line.rect.y0 - prev.y1;

            let below = gap >= -0.5 * line_height;
            if below && gap <= gap_factor * line_height && prev.overlaps_horizontally(&line.rect) {
                append_line(&mut para.text, &line.text);
                para.rect = para.rect.union(&line.rect);
                para.last_line = line.rect;
                continue;
            }
        }
        paragraphs.push(line);
    }

    paragraphs
}

/// Append `next` to a paragraph, undoing end-of-line hyphenation.
fn append_line(text: &mut String, next: &str) {
    let mut tail = text.chars().rev();
    let hyphenated = tail.next() == Some('-') && tail.next().is_some_and(char::is_alphabetic);
    let continues = next.chars().next().is_some_and(char::is_lowercase);

    if hyphenated && continues {
        text.pop();
    } else {
        text.push(' ');
    }
    text.push_str(next);
}

/// Keep the first region of every fingerprint group.
fn dedupe_regions(regions: Vec<Region>, tolerance: f32) -> Vec<Region> {
    let mut seen: Vec<BlockFingerprint> = Vec::with_capacity(regions.len());
    let mut kept = Vec::with_capacity(regions.len());

    for region in regions {
        let fingerprint = BlockFingerprint::new(&region.rect, &region.text);
        if seen.iter().any(|s| fingerprint.is_duplicate_of(s, tolerance)) {
            debug!("Dropping duplicate block at {:?}", region.rect);
            continue;
        }
        seen.push(fingerprint);
        kept.push(region);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(x0: f32, y0: f32, x1: f32, y1: f32, text: &str) -> TextFragment {
        TextFragment::new(Rect::new(x0, y0, x1, y1), text)
    }

    fn page(fragments: Vec<TextFragment>) -> PageGeometry {
        PageGeometry {
            page: 0,
            width: 612.0,
            height: 792.0,
            fragments,
        }
    }

    #[test]
    fn test_same_line_fragments_merge() {
        let blocks = extract_blocks(
            &page(vec![
                frag(50.0, 100.0, 100.0, 112.0, "Hello"),
                frag(104.0, 101.0, 150.0, 112.0, "world"),
            ]),
            &ExtractConfig::default(),
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Hello world");
        assert_eq!(blocks[0].rect, Rect::new(50.0, 100.0, 150.0, 112.0));
    }

    #[test]
    fn test_distant_fragments_stay_apart() {
        let blocks = extract_blocks(
            &page(vec![
                frag(50.0, 100.0, 100.0, 112.0, "Left"),
                frag(400.0, 100.0, 450.0, 112.0, "Right"),
            ]),
            &ExtractConfig::default(),
        );
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_paragraph_lines_merge_with_dehyphenation() {
        let blocks = extract_blocks(
            &page(vec![
                frag(50.0, 100.0, 300.0, 112.0, "A long para-"),
                frag(50.0, 114.0, 280.0, 126.0, "graph continues"),
                frag(50.0, 128.0, 200.0, 140.0, "here."),
            ]),
            &ExtractConfig::default(),
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "A long paragraph continues here.");
    }

    #[test]
    fn test_large_vertical_gap_splits_paragraphs() {
        let blocks = extract_blocks(
            &page(vec![
                frag(50.0, 100.0, 300.0, 112.0, "Heading"),
                frag(50.0, 160.0, 300.0, 172.0, "Body text"),
            ]),
            &ExtractConfig::default(),
        );
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].index, 1);
    }

    #[test]
    fn test_malformed_fragments_are_skipped() {
        let blocks = extract_blocks(
            &page(vec![
                frag(f32::NAN, 0.0, 10.0, 10.0, "nan"),
                frag(10.0, 10.0, 5.0, 20.0, "inverted"),
                frag(10.0, 10.0, 10.0, 20.0, "zero width"),
                frag(10.0, 10.0, 50.0, 20.0, "   "),
            ]),
            &ExtractConfig::default(),
        );
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_duplicates_within_tolerance_are_dropped() {
        let blocks = extract_blocks(
            &page(vec![
                frag(50.0, 100.0, 150.0, 112.0, "Repeated Title"),
                frag(50.0, 300.0, 150.0, 312.0, "Other"),
                frag(50.4, 100.3, 150.2, 112.4, "repeated   title"),
            ]),
            &ExtractConfig::default(),
        );
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["Repeated Title", "Other"]);
    }

    #[test]
    fn test_overprinted_fragment_on_same_line_is_dropped() {
        let blocks = extract_blocks(
            &page(vec![
                frag(50.0, 100.0, 150.0, 112.0, "Repeated Title"),
                frag(50.2, 100.1, 150.1, 112.0, "Repeated Title"),
            ]),
            &ExtractConfig::default(),
        );
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["Repeated Title"]);
    }

    #[test]
    fn test_repeated_word_at_other_position_is_kept() {
        let blocks = extract_blocks(
            &page(vec![
                frag(50.0, 100.0, 80.0, 112.0, "the"),
                frag(84.0, 100.0, 120.0, 112.0, "cat"),
                frag(124.0, 100.0, 154.0, 112.0, "the"),
            ]),
            &ExtractConfig::default(),
        );
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "the cat the");
    }

    #[test]
    fn test_near_duplicates_with_different_text_are_kept() {
        let a = BlockFingerprint::new(&Rect::new(0.0, 0.0, 10.0, 10.0), "one");
        let b = BlockFingerprint::new(&Rect::new(0.2, 0.0, 10.0, 10.0), "two");
        assert!(!a.is_duplicate_of(&b, 1.0));
    }

    #[test]
    fn test_fingerprint_tolerance() {
        let a = BlockFingerprint::new(&Rect::new(0.0, 0.0, 10.0, 10.0), "Same");
        let b = BlockFingerprint::new(&Rect::new(2.0, 0.0, 10.0, 10.0), "same");
        assert!(!a.is_duplicate_of(&b, 1.0));
        assert!(a.is_duplicate_of(&b, 2.0));
    }
}
