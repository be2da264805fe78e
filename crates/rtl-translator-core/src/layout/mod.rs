//! Font-size fitting of translated text into source rectangles.

mod fit;

pub use fit::{FitParams, FittedLayout, Overflow, SizeGrid, fit_text};
