//! Noise predicates deciding which blocks are worth translating.
//!
//! Every predicate is a pure function of the block text (and rectangle for
//! the size check) so it can be tested and toggled on its own.

use std::sync::LazyLock;

use regex::Regex;

use super::geometry::Rect;
use crate::config::FilterConfig;

/// Share of non-space characters covered by URLs/e-mails that marks a block as link noise.
const URL_DOMINANCE: f32 = 0.6;

#[allow(clippy::expect_used)]
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:https?://|www\.)[\w\-.?,:/#%&=+~]+").expect("valid url regex")
});

#[allow(clippy::expect_used)]
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email regex")
});

#[allow(clippy::expect_used)]
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{1,3}\s*[-/]?\s*\d{1,4}[A-Z]?$").expect("valid label regex")
});

#[allow(clippy::expect_used)]
static FIGURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:fig\.|eq\.|(?:figure|table|equation)\b)").expect("valid figure regex")
});

#[allow(clippy::expect_used)]
static LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{L}").expect("valid letter regex"));

#[allow(clippy::expect_used)]
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{N}").expect("valid number regex"));

#[allow(clippy::expect_used)]
static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{P}\p{S}]").expect("valid symbol regex"));

/// Why a block was not translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Empty,
    Small,
    Label,
    TooShort,
    Url,
    NoLetters,
    FigureReference,
    NumericHeavy,
}

impl DropReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Small => "small",
            Self::Label => "label",
            Self::TooShort => "too_short",
            Self::Url => "url",
            Self::NoLetters => "no_letters",
            Self::FigureReference => "figure_reference",
            Self::NumericHeavy => "numeric_heavy",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn is_too_short(text: &str, min_chars: usize) -> bool {
    char_len(text) < min_chars
}

/// True when URLs and e-mail addresses make up most of the visible text.
pub fn is_url_dominated(text: &str) -> bool {
    let visible = text.chars().filter(|c| !c.is_whitespace()).count();
    if visible == 0 {
        return false;
    }

    let covered: usize = URL_RE
        .find_iter(text)
        .chain(EMAIL_RE.find_iter(text))
        .map(|m| char_len(m.as_str()))
        .sum();

    #[allow(clippy::cast_precision_loss)]
    let share = covered as f32 / visible as f32;
    share >= URL_DOMINANCE
}

/// `(digits + punctuation + symbols) / (letters + digits + punctuation + symbols)`.
pub fn symbol_ratio(text: &str) -> f32 {
    let letters = LETTER_RE.find_iter(text).count();
    let digits = NUMBER_RE.find_iter(text).count();
    let symbols = SYMBOL_RE.find_iter(text).count();
    let total = letters + digits + symbols;
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = (digits + symbols) as f32 / total as f32;
    ratio
}

pub fn is_numeric_heavy(text: &str, max_ratio: f32) -> bool {
    symbol_ratio(text) > max_ratio
}

/// Schematic labels such as `R12`, `A-3`, `IC 7B`, or any short text with at most two alphanumerics.
pub fn is_label(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() || char_len(text) > 6 {
        return false;
    }
    if LABEL_RE.is_match(text) {
        return true;
    }
    text.chars().filter(|c| c.is_alphanumeric()).count() <= 2
}

pub fn is_figure_reference(text: &str) -> bool {
    FIGURE_RE.is_match(text)
}

pub fn has_no_letters(text: &str) -> bool {
    !LETTER_RE.is_match(text)
}

/// Area at or below `max_area`, or a single token no longer than `max(3, min_chars)`.
pub fn is_small_block(text: &str, rect: &Rect, max_area: f32, min_chars: usize) -> bool {
    if rect.area() <= max_area {
        return true;
    }
    let mut tokens = text.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (None, _) => true,
        (Some(only), None) => char_len(only) <= min_chars.max(3),
        _ => false,
    }
}

/// Applies the enabled predicates in a fixed order and reports the first hit.
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    config: FilterConfig,
}

impl NoiseFilter {
    pub const fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// `None` when the (cleaned) block should be translated.
    pub fn classify(&self, text: &str, rect: &Rect) -> Option<DropReason> {
        let c = &self.config;

        if text.trim().is_empty() {
            return Some(DropReason::Empty);
        }
        if c.skip_small && is_small_block(text, rect, c.small_block_area, c.min_block_chars) {
            return Some(DropReason::Small);
        }
        if c.skip_labels && is_label(text) {
            return Some(DropReason::Label);
        }
        if is_too_short(text, c.min_block_chars) {
            return Some(DropReason::TooShort);
        }
        if c.skip_urls && is_url_dominated(text) {
            return Some(DropReason::Url);
        }
        if c.require_letters && has_no_letters(text) {
            return Some(DropReason::NoLetters);
        }
        if c.skip_figure_refs && is_figure_reference(text) {
            return Some(DropReason::FigureReference);
        }
        if c.skip_numeric && is_numeric_heavy(text, c.max_symbol_ratio) {
            return Some(DropReason::NumericHeavy);
        }
        None
    }
}
