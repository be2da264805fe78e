//! Erasure colour: the dominant colour of a thin ring around a block.

use std::collections::HashMap;

use image::RgbaImage;

use super::geometry::PageRaster;
use crate::config::TextColor;
use crate::extract::Rect;

/// Ring width around the block, in points.
const RING: f32 = 2.0;

/// Channel quantisation shift (16 levels per channel).
const QUANT_SHIFT: u8 = 4;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_px(v: f32, scale: f32, limit: u32) -> u32 {
    ((v * scale).floor().max(0.0) as u32).min(limit)
}

/// Mode of the quantised pixel colours in the ring around `rect`, averaged
/// within the winning bucket. White when the ring has no opaque pixels.
pub fn sample_background(raster: &PageRaster, rect: &Rect) -> TextColor {
    let image: &RgbaImage = &raster.image;
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || !rect.is_valid() {
        return TextColor::white();
    }

    let s = raster.scale;
    let outer = (
        to_px(rect.x0 - RING, s, w),
        to_px(rect.y0 - RING, s, h),
        to_px(rect.x1 + RING, s, w),
        to_px(rect.y1 + RING, s, h),
    );
    let inner = (
        to_px(rect.x0, s, w),
        to_px(rect.y0, s, h),
        to_px(rect.x1, s, w),
        to_px(rect.y1, s, h),
    );

    let mut buckets: HashMap<[u8; 3], (u32, [u64; 3])> = HashMap::new();
    for y in outer.1..outer.3 {
        for x in outer.0..outer.2 {
            if (inner.0..inner.2).contains(&x) && (inner.1..inner.3).contains(&y) {
                continue;
            }
            let [r, g, b, a] = image.get_pixel(x, y).0;
            if a == 0 {
                continue;
            }
            let key = [r >> QUANT_SHIFT, g >> QUANT_SHIFT, b >> QUANT_SHIFT];
            let entry = buckets.entry(key).or_insert((0, [0; 3]));
            entry.0 += 1;
            entry.1[0] += u64::from(r);
            entry.1[1] += u64::from(g);
            entry.1[2] += u64::from(b);
        }
    }

    // Ties go to the lighter bucket so results do not depend on map order
    let Some((_, (count, sums))) = buckets
        .into_iter()
        .max_by_key(|(key, (count, _))| (*count, key.iter().map(|c| u32::from(*c)).sum::<u32>(), *key))
    else {
        return TextColor::white();
    };

    let mean = |sum: u64| -> u8 { u8::try_from(sum / u64::from(count)).unwrap_or(u8::MAX) };
    TextColor::from_rgb_bytes(mean(sums[0]), mean(sums[1]), mean(sums[2]))
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn raster(w: u32, h: u32, fill: [u8; 4]) -> PageRaster {
        PageRaster {
            image: RgbaImage::from_pixel(w, h, Rgba(fill)),
            scale: 1.0,
        }
    }

    fn approx(a: TextColor, b: TextColor) -> bool {
        (a.r - b.r).abs() < 0.01 && (a.g - b.g).abs() < 0.01 && (a.b - b.b).abs() < 0.01
    }

    #[test]
    fn test_uniform_background() {
        let page = raster(100, 100, [255, 240, 200, 255]);
        let color = sample_background(&page, &Rect::new(20.0, 20.0, 60.0, 40.0));
        assert!(approx(color, TextColor::from_rgb_bytes(255, 240, 200)));
    }

    #[test]
    fn test_text_inside_block_is_ignored() {
        let mut page = raster(100, 100, [255, 255, 255, 255]);
        for y in 20..40 {
            for x in 20..60 {
                page.image.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let color = sample_background(&page, &Rect::new(20.0, 20.0, 60.0, 40.0));
        assert!(approx(color, TextColor::white()));
    }

    #[test]
    fn test_dominant_ring_colour_wins() {
        let mut page = raster(100, 100, [0, 0, 255, 255]);
        // a single-pixel stray on the ring
        page.image.put_pixel(19, 19, Rgba([255, 0, 0, 255]));
        let color = sample_background(&page, &Rect::new(20.0, 20.0, 60.0, 40.0));
        assert!(approx(color, TextColor::from_rgb_bytes(0, 0, 255)));
    }

    #[test]
    fn test_transparent_or_empty_defaults_to_white() {
        let page = raster(50, 50, [10, 10, 10, 0]);
        let color = sample_background(&page, &Rect::new(5.0, 5.0, 20.0, 20.0));
        assert!(approx(color, TextColor::white()));

        let invalid = sample_background(&raster(50, 50, [0, 0, 0, 255]), &Rect::new(5.0, 5.0, 5.0, 5.0));
        assert!(approx(invalid, TextColor::white()));
    }
}
