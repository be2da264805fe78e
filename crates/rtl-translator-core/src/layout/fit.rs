use tracing::debug;

use crate::config::LayoutConfig;
use crate::extract::Rect;
use crate::text::{TextMeasure, measure_height, shape_rtl, wrap_rtl};

/// Resolution of the font-size search grid, in points.
const SIZE_STEP: f32 = 0.25;

/// Slack for float comparisons against the rectangle.
const EPSILON: f32 = 1e-3;

const ELLIPSIS: &str = "…";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParams {
    pub min_font: f32,
    pub max_font: f32,
    pub line_gap: f32,
    pub shrink_to_fit: bool,
}

impl FitParams {
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self {
            min_font: config.min_font,
            max_font: config.max_font.max(config.min_font),
            line_gap: config.line_gap,
            shrink_to_fit: config.shrink_to_fit,
        }
    }
}

/// How a layout that does not fit at the minimum size was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Drawn at the minimum size, spilling past the rectangle
    Shrunk,
    /// Truncated to the lines that fit, last line ending in an ellipsis
    Elided,
}

/// Translated text laid out for one rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedLayout {
    /// Shaped lines in visual order, top line first
    pub lines: Vec<String>,
    /// The same lines before shaping, in logical order
    pub logical_lines: Vec<String>,
    /// Width of each shaped line at `font_size`
    pub line_widths: Vec<f32>,
    pub font_size: f32,
    pub line_gap: f32,
    pub rect: Rect,
    pub overflow: Option<Overflow>,
}

impl FittedLayout {
    pub fn height(&self) -> f32 {
        measure_height(self.lines.len(), self.font_size, self.line_gap)
    }

    /// Logical text as drawn, lines joined by newlines.
    pub fn logical_text(&self) -> String {
        self.logical_lines.join("\n")
    }
}

/// Candidate sizes: `min`, then every multiple of the step strictly between
/// `min` and `max`. Sizes are computed from the index, never materialised.
#[derive(Debug, Clone, Copy)]
pub struct SizeGrid {
    min: f32,
    first_step: f64,
    len: usize,
}

impl SizeGrid {
    pub fn new(min: f32, max: f32) -> Self {
        let step = f64::from(SIZE_STEP);
        let first_step = (f64::from(min) / step).floor() + 1.0;
        let last_step = (f64::from(max) / step).ceil() - 1.0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let between = (last_step - first_step + 1.0).max(0.0) as usize;
        Self {
            min,
            first_step,
            len: between + 1,
        }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        false
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn get(&self, index: usize) -> f32 {
        if index == 0 {
            self.min
        } else {
            ((self.first_step + (index - 1) as f64) * f64::from(SIZE_STEP)) as f32
        }
    }

    pub fn sizes(self) -> impl Iterator<Item = f32> {
        (0..self.len).map(move |i| self.get(i))
    }
}

struct Trial {
    logical: Vec<String>,
    shaped: Vec<String>,
    widths: Vec<f32>,
}

fn layout_at(text: &str, rect: &Rect, measure: &impl TextMeasure, size: f32) -> Trial {
    let logical = wrap_rtl(text, size, rect.width(), measure);
    let shaped: Vec<String> = logical.iter().map(|l| shape_rtl(l)).collect();
    let widths = shaped.iter().map(|l| measure.text_width(l, size)).collect();
    Trial {
        logical,
        shaped,
        widths,
    }
}

fn trial_fits(trial: &Trial, rect: &Rect, size: f32, line_gap: f32) -> bool {
    trial.widths.iter().all(|w| *w <= rect.width() + EPSILON)
        && measure_height(trial.logical.len(), size, line_gap) <= rect.height() + EPSILON
}

/// Pick the largest font size at which `text` fits `rect`, or apply the
/// overflow policy at `min_font`.
pub fn fit_text(
    text: &str,
    rect: &Rect,
    measure: &impl TextMeasure,
    params: FitParams,
) -> FittedLayout {
    let min = params.min_font;
    let max = params.max_font.max(min);
    let done = |size: f32, trial: Trial, overflow: Option<Overflow>| FittedLayout {
        lines: trial.shaped,
        logical_lines: trial.logical,
        line_widths: trial.widths,
        font_size: size,
        line_gap: params.line_gap,
        rect: *rect,
        overflow,
    };

    if text.trim().is_empty() {
        let empty = Trial {
            logical: Vec::new(),
            shaped: Vec::new(),
            widths: Vec::new(),
        };
        return done(max, empty, None);
    }

    let at_max = layout_at(text, rect, measure, max);
    if trial_fits(&at_max, rect, max, params.line_gap) {
        return done(max, at_max, None);
    }

    let grid = SizeGrid::new(min, max);
    let at_min = layout_at(text, rect, measure, min);
    if !trial_fits(&at_min, rect, min, params.line_gap) {
        return overflow_at_min(at_min, rect, measure, params, done);
    }

    // Invariant: grid.get(lo) fits and `best` is its layout
    let (mut lo, mut hi) = (0usize, grid.len() - 1);
    let mut best = at_min;
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        let size = grid.get(mid);
        let trial = layout_at(text, rect, measure, size);
        if trial_fits(&trial, rect, size, params.line_gap) {
            lo = mid;
            best = trial;
        } else {
            hi = mid - 1;
        }
    }

    done(grid.get(lo), best, None)
}

fn overflow_at_min(
    at_min: Trial,
    rect: &Rect,
    measure: &impl TextMeasure,
    params: FitParams,
    done: impl Fn(f32, Trial, Option<Overflow>) -> FittedLayout,
) -> FittedLayout {
    let min = params.min_font;

    if params.shrink_to_fit {
        debug!("Text overflows at {}pt; keeping minimum size", min);
        return done(min, at_min, Some(Overflow::Shrunk));
    }

    let advance = min * params.line_gap;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let max_lines = if advance > 0.0 {
        ((rect.height() + EPSILON) / advance).floor().max(1.0) as usize
    } else {
        1
    };

    let mut logical: Vec<String> = at_min.logical.into_iter().take(max_lines).collect();
    if logical.is_empty() {
        logical.push(String::new());
    }
    if let Some(last) = logical.last_mut() {
        *last = elide_line(last, rect.width(), min, measure);
    }

    debug!(
        "Text overflows at {}pt; eliding to {} line(s)",
        min,
        logical.len()
    );

    let shaped: Vec<String> = logical.iter().map(|l| shape_rtl(l)).collect();
    let widths = shaped.iter().map(|l| measure.text_width(l, min)).collect();
    done(
        min,
        Trial {
            logical,
            shaped,
            widths,
        },
        Some(Overflow::Elided),
    )
}

/// Append an ellipsis, trimming characters off `line` until it fits `max_width`.
fn elide_line(line: &str, max_width: f32, size: f32, measure: &impl TextMeasure) -> String {
    let mut base: Vec<char> = line.trim_end().chars().collect();
    let render = |base: &[char]| -> String {
        let head: String = base.iter().collect();
        let head = head.trim_end();
        if head.is_empty() {
            ELLIPSIS.to_string()
        } else {
            format!("{head} {ELLIPSIS}")
        }
    };

    let mut candidate = render(&base);
    while !base.is_empty() && measure.text_width(&shape_rtl(&candidate), size) > max_width {
        base.pop();
        candidate = render(&base);
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::FixedWidth;

    fn params(min: f32, max: f32, shrink: bool) -> FitParams {
        FitParams {
            min_font: min,
            max_font: max,
            line_gap: 1.2,
            shrink_to_fit: shrink,
        }
    }

    fn assert_fits(layout: &FittedLayout) {
        for w in &layout.line_widths {
            assert!(*w <= layout.rect.width() + EPSILON, "line width {w}");
        }
        assert!(layout.height() <= layout.rect.height() + EPSILON);
    }

    #[test]
    fn test_size_grid() {
        let sizes = |min, max| SizeGrid::new(min, max).sizes().collect::<Vec<f32>>();
        assert_eq!(sizes(7.0, 8.0), vec![7.0, 7.25, 7.5, 7.75]);
        assert_eq!(sizes(7.1, 7.6), vec![7.1, 7.25, 7.5]);
        assert_eq!(sizes(7.0, 7.0), vec![7.0]);
    }

    #[test]
    fn test_size_grid_is_not_materialised() {
        let grid = SizeGrid::new(7.0, 1e9);
        assert_eq!(grid.len(), 4_000_000_000 - 28);
        assert!((grid.get(1) - 7.25).abs() < f32::EPSILON);
    }

    // 20 chars at 0.5em in a 100x13 box fit up to 10pt
    const SWEEP_TEXT: &str = "abcdefghijklmnopqrst";

    fn sweep_rect() -> Rect {
        Rect::new(0.0, 0.0, 100.0, 13.0)
    }

    #[test]
    fn test_raising_max_font_never_lowers_size() {
        let mut previous = 0.0_f32;
        for tenths in (75..=200).step_by(5) {
            #[allow(clippy::cast_precision_loss)]
            let max = tenths as f32 / 10.0;
            let layout = fit_text(SWEEP_TEXT, &sweep_rect(), &FixedWidth(0.5), params(7.1, max, false));
            assert!(
                layout.font_size >= previous,
                "max {max}: {} < {previous}",
                layout.font_size
            );
            assert_fits(&layout);
            previous = layout.font_size;
        }
        assert!((previous - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_lowering_min_font_never_raises_size() {
        let mut previous = f32::INFINITY;
        for min in [12.0, 10.3, 10.0, 9.0, 7.1, 7.0, 5.5, 4.0] {
            let layout = fit_text(SWEEP_TEXT, &sweep_rect(), &FixedWidth(0.5), params(min, 14.0, true));
            assert!(
                layout.font_size <= previous,
                "min {min}: {} > {previous}",
                layout.font_size
            );
            let on_grid = (layout.font_size / SIZE_STEP).fract().abs() < 1e-4;
            assert!(on_grid || (layout.font_size - min).abs() < f32::EPSILON);
            previous = layout.font_size;
        }
    }

    #[test]
    fn test_uses_max_font_when_it_fits() {
        let rect = Rect::new(0.0, 0.0, 500.0, 100.0);
        let layout = fit_text("سلام", &rect, &FixedWidth(0.5), params(7.0, 14.0, false));
        assert!((layout.font_size - 14.0).abs() < f32::EPSILON);
        assert_eq!(layout.overflow, None);
        assert_eq!(layout.lines.len(), 1);
    }

    #[test]
    fn test_finds_largest_fitting_size() {
        // 20 chars on one line need 10*size width; 100 wide -> size <= 10
        let rect = Rect::new(0.0, 0.0, 100.0, 13.0);
        let text = "abcdefghijklmnopqrst";
        let layout = fit_text(text, &rect, &FixedWidth(0.5), params(7.0, 14.0, false));

        assert_eq!(layout.overflow, None);
        assert_fits(&layout);
        assert!(layout.font_size <= 10.0 + EPSILON);

        // the next grid step up must not fit
        let next = layout.font_size + SIZE_STEP;
        let trial = layout_at(text, &rect, &FixedWidth(0.5), next);
        assert!(!trial_fits(&trial, &rect, next, 1.2));
    }

    #[test]
    fn test_fitting_is_monotonic_in_rect_size() {
        let text = "این یک متن آزمایشی برای بررسی اندازه قلم است";
        let small = fit_text(
            text,
            &Rect::new(0.0, 0.0, 120.0, 40.0),
            &FixedWidth(0.5),
            params(4.0, 14.0, false),
        );
        let large = fit_text(
            text,
            &Rect::new(0.0, 0.0, 240.0, 80.0),
            &FixedWidth(0.5),
            params(4.0, 14.0, false),
        );
        assert!(large.font_size >= small.font_size);
    }

    #[test]
    fn test_shrink_to_fit_keeps_min_and_overflows() {
        let rect = Rect::new(0.0, 0.0, 20.0, 5.0);
        let layout = fit_text(
            "a long text that cannot fit",
            &rect,
            &FixedWidth(0.5),
            params(7.0, 14.0, true),
        );
        assert!((layout.font_size - 7.0).abs() < f32::EPSILON);
        assert_eq!(layout.overflow, Some(Overflow::Shrunk));
    }

    #[test]
    fn test_elision_is_prefix_plus_ellipsis() {
        let rect = Rect::new(0.0, 0.0, 60.0, 20.0);
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let layout = fit_text(text, &rect, &FixedWidth(0.5), params(7.0, 14.0, false));

        assert_eq!(layout.overflow, Some(Overflow::Elided));
        assert!((layout.font_size - 7.0).abs() < f32::EPSILON);
        assert_fits(&layout);

        let drawn = layout.logical_lines.join(" ");
        let head = drawn.strip_suffix(ELLIPSIS).unwrap_or(&drawn).trim_end();
        assert!(drawn.ends_with(ELLIPSIS));
        assert!(text.starts_with(head), "{head:?} is not a prefix");
        assert!(head.len() < text.len());
    }

    #[test]
    fn test_elision_keeps_at_least_one_line() {
        let rect = Rect::new(0.0, 0.0, 30.0, 2.0);
        let layout = fit_text("abc def ghi", &rect, &FixedWidth(0.5), params(7.0, 14.0, false));
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.overflow, Some(Overflow::Elided));
    }

    #[test]
    fn test_empty_text() {
        let rect = Rect::new(0.0, 0.0, 30.0, 20.0);
        let layout = fit_text("   ", &rect, &FixedWidth(0.5), params(7.0, 14.0, false));
        assert!(layout.lines.is_empty());
        assert_eq!(layout.overflow, None);
    }
}
