//! PDF collaborators: MuPDF for reading geometry, lopdf for writing.

mod background;
mod document;
mod font;
mod geometry;
mod page_index;
mod writer;

pub use background::sample_background;
pub use document::PdfDocument;
pub use font::{FontResource, to_unicode_cmap};
pub use geometry::{GeometrySource, PageRaster, RASTER_SCALE};
pub use page_index::PageIndex;
pub use writer::{
    BlockSink, DrawStyle, FONT_RESOURCE_NAME, GlyphEncode, MediaBox, PdfWriter, append_content,
    block_content, install_font, media_box,
};
