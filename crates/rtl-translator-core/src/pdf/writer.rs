//! Draws fitted layouts into a copy of the input document with lopdf.
//!
//! Each touched page gets one extra content stream holding, per block, a
//! background fill over the source text followed by the right-aligned
//! translated lines. The target-script font is embedded once, when the
//! document is finished.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use super::font::FontResource;
use super::page_index::PageIndex;
use crate::config::TextColor;
use crate::error::{Error, Result};
use crate::extract::Rect;
use crate::layout::FittedLayout;

/// Resource name of the embedded font in every page's `/Font` dictionary.
pub const FONT_RESOURCE_NAME: &str = "FRtl";

/// Pages nested deeper than this in the page tree are treated as orphans.
const MAX_TREE_DEPTH: usize = 10;

const LETTER: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Receives every block the pipeline decided to draw.
pub trait BlockSink {
    fn draw_block(&mut self, page: usize, layout: &FittedLayout, background: TextColor)
    -> Result<()>;
}

/// Maps characters to glyph ids of the drawing font.
pub trait GlyphEncode {
    fn glyph_id(&self, c: char) -> u16;
}

impl GlyphEncode for FontResource {
    fn glyph_id(&self, c: char) -> u16 {
        Self::glyph_id(self, c)
    }
}

/// Drawing options shared by every block.
#[derive(Debug, Clone, Copy)]
pub struct DrawStyle {
    pub text_color: TextColor,
    pub debug_overlay: bool,
}

/// MediaBox `[x0, y0, x1, y1]` in PDF user space (bottom-left origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaBox(pub [f32; 4]);

impl MediaBox {
    /// Convert a top-left-origin point to PDF user space.
    pub fn to_pdf(&self, x: f32, y: f32) -> (f32, f32) {
        (self.0[0] + x, self.0[3] - y)
    }

    /// Lower-left corner, width and height of `rect` for an `re` operator.
    pub fn rect_to_pdf(&self, rect: &Rect) -> (f32, f32, f32, f32) {
        let (x, y) = self.to_pdf(rect.x0, rect.y1);
        (x, y, rect.width(), rect.height())
    }
}

fn color_op(out: &mut String, color: TextColor, op: &str) {
    let _ = writeln!(out, "{:.3} {:.3} {:.3} {op}", color.r, color.g, color.b);
}

/// Content-stream operators for one block.
///
/// `used` collects every glyph drawn, for the ToUnicode map.
pub fn block_content(
    layout: &FittedLayout,
    background: TextColor,
    style: DrawStyle,
    media_box: MediaBox,
    encoder: &impl GlyphEncode,
    used: &mut BTreeMap<u16, char>,
) -> String {
    let rect = &layout.rect;
    let size = layout.font_size;
    let mut out = String::from("q\n");

    color_op(&mut out, background, "rg");
    let (x, y, w, h) = media_box.rect_to_pdf(rect);
    let _ = writeln!(out, "{x:.2} {y:.2} {w:.2} {h:.2} re f");

    color_op(&mut out, style.text_color, "rg");
    // OCR layers often leave the text render mode invisible
    out.push_str("0 Tr\n");

    let mut baselines = Vec::with_capacity(layout.lines.len());
    for (i, (line, width)) in layout.lines.iter().zip(&layout.line_widths).enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let top_y = rect.y0 + size + i as f32 * size * layout.line_gap;
        let left_x = (rect.x1 - width).max(rect.x0);
        let (px, py) = media_box.to_pdf(left_x, top_y);
        baselines.push(py);

        let hex = line.chars().fold(String::with_capacity(line.len() * 4), |mut acc, c| {
            let gid = encoder.glyph_id(c);
            used.entry(gid).or_insert(c);
            let _ = write!(acc, "{gid:04X}");
            acc
        });

        out.push_str("BT\n");
        let _ = writeln!(out, "/{FONT_RESOURCE_NAME} {size:.2} Tf");
        let _ = writeln!(out, "{px:.2} {py:.2} Td");
        let _ = writeln!(out, "<{hex}> Tj");
        out.push_str("ET\n");
    }

    if style.debug_overlay {
        out.push_str("1 0 0 RG\n0.5 w\n");
        let _ = writeln!(out, "{x:.2} {y:.2} {w:.2} {h:.2} re S");
        out.push_str("0.6 0.6 0.6 RG\n0.25 w\n");
        for py in baselines {
            let _ = writeln!(out, "{x:.2} {py:.2} m {:.2} {py:.2} l S", x + w);
        }
    }

    out.push_str("Q\n");
    out
}

/// Output document under construction.
pub struct PdfWriter<'f> {
    doc: Document,
    font: &'f FontResource,
    style: DrawStyle,
    pages: BTreeMap<u32, ObjectId>,
    pending: BTreeMap<ObjectId, (MediaBox, String)>,
    used: BTreeMap<u16, char>,
}

impl<'f> PdfWriter<'f> {
    pub fn new(pdf_bytes: &[u8], font: &'f FontResource, style: DrawStyle) -> Result<Self> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| Error::Lopdf(format!("Failed to load PDF: {e}")))?;
        let pages = doc.get_pages();
        Ok(Self {
            doc,
            font,
            style,
            pages,
            pending: BTreeMap::new(),
            used: BTreeMap::new(),
        })
    }

    fn page_id(&self, page: usize) -> Result<ObjectId> {
        let index = PageIndex::checked(page, self.pages.len())?;
        self.pages
            .get(&index.lopdf_number())
            .copied()
            .ok_or(Error::PdfInvalidPage {
                page,
                total: self.pages.len(),
            })
    }

    /// Number of pages that received content.
    pub fn touched_pages(&self) -> usize {
        self.pending.len()
    }

    /// Embed the font, attach the new content streams and serialise.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if !self.pending.is_empty() {
            let font_id = self.font.embed(&mut self.doc, &self.used);
            let pending = std::mem::take(&mut self.pending);
            for (page_id, (_, content)) in pending {
                install_font(&mut self.doc, page_id, font_id)?;
                append_content(&mut self.doc, page_id, content.into_bytes())?;
            }
            debug!("Embedded {} with {} glyph(s)", self.font.base_name(), self.used.len());
        }

        self.doc.compress();

        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| Error::PdfSave(format!("Failed to save PDF: {e}")))?;
        Ok(output)
    }
}

impl BlockSink for PdfWriter<'_> {
    fn draw_block(
        &mut self,
        page: usize,
        layout: &FittedLayout,
        background: TextColor,
    ) -> Result<()> {
        let page_id = self.page_id(page)?;
        if !self.pending.contains_key(&page_id) {
            let media_box = media_box(&self.doc, page_id)?;
            self.pending.insert(page_id, (media_box, String::new()));
        }
        if let Some((media_box, content)) = self.pending.get_mut(&page_id) {
            content.push_str(&block_content(
                layout,
                background,
                self.style,
                *media_box,
                self.font,
                &mut self.used,
            ));
        }
        Ok(())
    }
}

fn numbers(arr: &[Object]) -> Option<[f32; 4]> {
    let values: Vec<f32> = arr
        .iter()
        .filter_map(|o| match o {
            #[allow(clippy::cast_precision_loss)]
            Object::Integer(i) => Some(*i as f32),
            Object::Real(r) => Some(*r),
            _ => None,
        })
        .collect();
    <[f32; 4]>::try_from(values).ok()
}

fn dict_of<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d),
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        _ => None,
    }
}

/// Look `key` up on the page, then on its ancestors in the page tree.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// The page MediaBox (inherited if needed); US Letter when absent.
pub fn media_box(doc: &Document, page_id: ObjectId) -> Result<MediaBox> {
    doc.get_dictionary(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;

    let found = inherited(doc, page_id, b"MediaBox").and_then(|obj| match obj {
        Object::Array(arr) => numbers(arr),
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok().and_then(|a| numbers(a)),
        _ => None,
    });
    Ok(MediaBox(found.unwrap_or(LETTER)))
}

/// Register `font_id` under [`FONT_RESOURCE_NAME`] in an inline copy of the
/// page's (possibly inherited or referenced) resources.
pub fn install_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<()> {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|obj| dict_of(doc, obj))
        .cloned()
        .unwrap_or_default();

    let mut fonts = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| dict_of(doc, obj))
        .cloned()
        .unwrap_or_default();

    fonts.set(FONT_RESOURCE_NAME, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Add a content stream after the page's existing ones.
pub fn append_content(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
    let content_id = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), content)));

    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;

    let contents = match page.get(b"Contents").ok().cloned() {
        Some(Object::Reference(existing)) => Object::Array(vec![
            Object::Reference(existing),
            Object::Reference(content_id),
        ]),
        Some(Object::Array(mut arr)) => {
            arr.push(Object::Reference(content_id));
            Object::Array(arr)
        }
        _ => Object::Reference(content_id),
    };
    page.set("Contents", contents);
    Ok(())
}
