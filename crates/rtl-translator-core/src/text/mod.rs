//! Text preparation: cleaning, chunking for translation, RTL shaping and wrapping.

mod chunk;
mod clean;
mod shape;
mod wrap;

pub use chunk::{chunk_text, join_chunks};
pub use clean::clean_text;
pub use shape::{reshape, shape_rtl, visual_order};
pub use wrap::{FixedWidth, TextMeasure, measure_height, wrap_rtl};
