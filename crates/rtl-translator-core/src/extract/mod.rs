//! Page geometry to translatable blocks: line merge, paragraph merge,
//! deduplication and noise filtering.

mod block;
pub mod filters;
mod geometry;

pub use block::{BlockFingerprint, BlockId, TextBlock, extract_blocks, normalize_for_identity};
pub use filters::{DropReason, NoiseFilter};
pub use geometry::{PageGeometry, Rect, TextFragment};
