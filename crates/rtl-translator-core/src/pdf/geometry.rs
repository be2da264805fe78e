//! Page geometry from MuPDF: one positioned fragment per text line, plus an
//! optional raster used to sample background colours.

use image::RgbaImage;
use mupdf::{Colorspace, Matrix, Quad, TextPageOptions};

use super::document::PdfDocument;
use super::page_index::PageIndex;
use crate::error::{Error, Result};
use crate::extract::{PageGeometry, Rect, TextFragment};

/// Raster scale used for background sampling (pixels per point).
pub const RASTER_SCALE: f32 = 1.0;

/// A rendered page and the pixels-per-point factor it was rendered at.
#[derive(Debug, Clone)]
pub struct PageRaster {
    pub image: RgbaImage,
    pub scale: f32,
}

/// Anything that can describe the text layout of a paginated document.
pub trait GeometrySource {
    fn page_count(&self) -> usize;

    fn page_geometry(&self, page: usize) -> Result<PageGeometry>;

    /// Rendered page, when the backend can rasterise it.
    fn page_raster(&self, _page: usize) -> Result<Option<PageRaster>> {
        Ok(None)
    }
}

fn quad_rect(quad: &Quad) -> Rect {
    let xs = [quad.ul.x, quad.ur.x, quad.ll.x, quad.lr.x];
    let ys = [quad.ul.y, quad.ur.y, quad.ll.y, quad.lr.y];
    Rect::new(
        xs.iter().copied().fold(f32::INFINITY, f32::min),
        ys.iter().copied().fold(f32::INFINITY, f32::min),
        xs.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        ys.iter().copied().fold(f32::NEG_INFINITY, f32::max),
    )
}

impl GeometrySource for PdfDocument {
    fn page_count(&self) -> usize {
        Self::page_count(self)
    }

    fn page_geometry(&self, page: usize) -> Result<PageGeometry> {
        let index = PageIndex::checked(page, Self::page_count(self))?;
        let extraction = |reason: String| Error::Extraction { page, reason };

        let doc = self.open_document()?;
        let mu_page = doc
            .load_page(index.into())
            .map_err(|e| extraction(format!("Failed to load page: {e}")))?;
        let bounds = mu_page
            .bounds()
            .map_err(|e| extraction(format!("Failed to get bounds: {e}")))?;
        let text_page = mu_page
            .to_text_page(TextPageOptions::empty())
            .map_err(|e| extraction(format!("Failed to get text page: {e}")))?;

        let mut fragments = Vec::new();
        for block in text_page.blocks() {
            for line in block.lines() {
                let mut text = String::new();
                let mut rect: Option<Rect> = None;

                for ch in line.chars() {
                    let Some(c) = ch.char() else { continue };
                    text.push(c);
                    if c.is_whitespace() {
                        continue;
                    }
                    let glyph = quad_rect(&ch.quad());
                    rect = Some(rect.map_or(glyph, |r| r.union(&glyph)));
                }

                if let Some(rect) = rect {
                    fragments.push(TextFragment::new(rect, text.trim()));
                }
            }
        }

        Ok(PageGeometry {
            page,
            width: bounds.x1 - bounds.x0,
            height: bounds.y1 - bounds.y0,
            fragments,
        })
    }

    fn page_raster(&self, page: usize) -> Result<Option<PageRaster>> {
        let index = PageIndex::checked(page, Self::page_count(self))?;
        let render = |reason: String| Error::PdfRender { page, reason };

        let doc = self.open_document()?;
        let mu_page = doc
            .load_page(index.into())
            .map_err(|e| render(format!("Failed to load page: {e}")))?;

        let matrix = Matrix::new_scale(RASTER_SCALE, RASTER_SCALE);
        let pixmap = mu_page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), 1.0, true)
            .map_err(|e| render(format!("Failed to render: {e}")))?;

        let n = pixmap.n() as usize;
        let samples = pixmap.samples();
        let mut rgba = Vec::with_capacity(samples.len() / n.max(1) * 4);
        for px in samples.chunks_exact(n.max(1)) {
            match n {
                1 => rgba.extend_from_slice(&[px[0], px[0], px[0], 255]),
                3 => rgba.extend_from_slice(&[px[0], px[1], px[2], 255]),
                4 => rgba.extend_from_slice(px),
                _ => return Err(render(format!("Unexpected pixel format with {n} components"))),
            }
        }

        let image = RgbaImage::from_raw(pixmap.width(), pixmap.height(), rgba)
            .ok_or_else(|| render("Failed to create image buffer".to_string()))?;

        Ok(Some(PageRaster {
            image,
            scale: RASTER_SCALE,
        }))
    }
}
