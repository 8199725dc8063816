//! ARGB32 premultiplied-alpha pixel storage and the three primitive ops
//! every block render reduces to: `fill`, `composite_over`, `blit_transformed`.

use crate::geometry::{ContentTransform, Rect};

/// A CPU-side ARGB32 bitmap, premultiplied. This is the one pixel
/// representation used throughout the renderer — shm buffers are filled by
/// copying a surface's `PixelBuffer` verbatim.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub width: i32,
    pub height: i32,
    pixels: Vec<u32>,
}

#[inline]
fn unpack(p: u32) -> (u32, u32, u32, u32) {
    ((p >> 24) & 0xFF, (p >> 16) & 0xFF, (p >> 8) & 0xFF, p & 0xFF)
}

#[inline]
fn pack(a: u32, r: u32, g: u32, b: u32) -> u32 {
    (a << 24) | (r << 16) | (g << 8) | b
}

impl PixelBuffer {
    pub fn new(width: i32, height: i32) -> Self {
        let len = (width.max(0) as usize) * (height.max(0) as usize);
        Self {
            width,
            height,
            pixels: vec![0u32; len],
        }
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.pixels
    }

    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            None
        } else {
            Some((y * self.width + x) as usize)
        }
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> u32 {
        self.index(x, y).map(|i| self.pixels[i]).unwrap_or(0)
    }

    #[inline]
    pub fn set(&mut self, x: i32, y: i32, value: u32) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = value;
        }
    }

    /// Solid-fill `region` (clipped to bounds) with a premultiplied colour.
    pub fn fill(&mut self, region: Rect, premultiplied: u32) {
        let x0 = region.x.max(0);
        let y0 = region.y.max(0);
        let x1 = (region.x + region.width).min(self.width);
        let y1 = (region.y + region.height).min(self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                self.set(x, y, premultiplied);
            }
        }
    }

    /// Composite `src` over `self` ("over" Porter-Duff, premultiplied),
    /// starting at `src_offset` in `src` and landing at `dst_offset` in
    /// `self`, covering `size`. Out-of-bounds reads/writes are clipped.
    pub fn composite_over(
        &mut self,
        src: &PixelBuffer,
        src_offset: (i32, i32),
        dst_offset: (i32, i32),
        size: (i32, i32),
    ) {
        let (sx0, sy0) = src_offset;
        let (dx0, dy0) = dst_offset;
        let (w, h) = size;
        for row in 0..h {
            for col in 0..w {
                let s = src.get(sx0 + col, sy0 + row);
                if s == 0 {
                    continue;
                }
                let dx = dx0 + col;
                let dy = dy0 + row;
                let d = self.get(dx, dy);
                self.set(dx, dy, over(s, d));
            }
        }
    }

    /// Composite `src` over `self` using `src` as an alpha mask tinted by
    /// `tint` — used for mask glyphs, which carry coverage only and are
    /// coloured by the block's `text_color`.
    pub fn composite_mask_tinted(
        &mut self,
        mask: &PixelBuffer,
        tint_premultiplied: u32,
        dst_offset: (i32, i32),
    ) {
        let (tint_a, tint_r, tint_g, tint_b) = unpack(tint_premultiplied);
        let (dx0, dy0) = dst_offset;
        for y in 0..mask.height {
            for x in 0..mask.width {
                let coverage = unpack(mask.get(x, y)).0; // alpha channel carries coverage
                if coverage == 0 {
                    continue;
                }
                let s = pack(
                    tint_a * coverage / 0xFF,
                    tint_r * coverage / 0xFF,
                    tint_g * coverage / 0xFF,
                    tint_b * coverage / 0xFF,
                );
                let dx = dx0 + x;
                let dy = dy0 + y;
                let d = self.get(dx, dy);
                self.set(dx, dy, over(s, d));
            }
        }
    }

    /// Scale `src` to `(dst_w, dst_h)`, apply one of the eight
    /// rotation/flip transforms, and composite the result over `self` at
    /// `dst_origin`, clipped to `clip`. Bilinear-filtered; SVG content is
    /// expected to be re-rasterised at target resolution upstream rather
    /// than routed through this scaler.
    #[allow(clippy::too_many_arguments)]
    pub fn blit_transformed(
        &mut self,
        src: &PixelBuffer,
        transform: ContentTransform,
        dst_w: i32,
        dst_h: i32,
        dst_origin: (i32, i32),
        clip: Rect,
    ) {
        if src.width == 0 || src.height == 0 || dst_w <= 0 || dst_h <= 0 {
            return;
        }
        let (ox, oy) = dst_origin;
        let clip_x0 = clip.x.max(0);
        let clip_y0 = clip.y.max(0);
        let clip_x1 = (clip.x + clip.width).min(self.width);
        let clip_y1 = (clip.y + clip.height).min(self.height);

        for dy in 0..dst_h {
            for dx in 0..dst_w {
                let px = ox + dx;
                let py = oy + dy;
                if px < clip_x0 || px >= clip_x1 || py < clip_y0 || py >= clip_y1 {
                    continue;
                }
                // Map the post-transform (dx, dy) back into pre-transform,
                // unit-square-normalised space, then into source pixels.
                let (u, v) = unit_coords_for(transform, dx, dy, dst_w, dst_h);
                let sx = u * (src.width - 1).max(0) as f32;
                let sy = v * (src.height - 1).max(0) as f32;
                let sample = bilinear_sample(src, sx, sy);
                if sample == 0 {
                    continue;
                }
                let d = self.get(px, py);
                self.set(px, py, over(sample, d));
            }
        }
    }
}

#[inline]
fn over(src: u32, dst: u32) -> u32 {
    let (sa, sr, sg, sb) = unpack(src);
    let (da, dr, dg, db) = unpack(dst);
    let inv = 0xFF - sa;
    pack(
        sa + da * inv / 0xFF,
        sr + dr * inv / 0xFF,
        sg + dg * inv / 0xFF,
        sb + db * inv / 0xFF,
    )
}

/// Given a destination pixel within a `dst_w x dst_h` transformed box,
/// return the corresponding normalised `(u, v) in [0,1]^2` coordinate in
/// the untransformed source.
fn unit_coords_for(transform: ContentTransform, dx: i32, dy: i32, dst_w: i32, dst_h: i32) -> (f32, f32) {
    let u = dx as f32 / (dst_w - 1).max(1) as f32;
    let v = dy as f32 / (dst_h - 1).max(1) as f32;
    match transform {
        ContentTransform::Normal => (u, v),
        ContentTransform::Rotate90 => (v, 1.0 - u),
        ContentTransform::Rotate180 => (1.0 - u, 1.0 - v),
        ContentTransform::Rotate270 => (1.0 - v, u),
        ContentTransform::FlipHorizontal => (1.0 - u, v),
        ContentTransform::FlipVertical => (u, 1.0 - v),
        ContentTransform::FlipRotate90 => (v, u),
        ContentTransform::FlipRotate270 => (1.0 - v, 1.0 - u),
    }
}

fn bilinear_sample(src: &PixelBuffer, sx: f32, sy: f32) -> u32 {
    let x0 = sx.floor().max(0.0) as i32;
    let y0 = sy.floor().max(0.0) as i32;
    let x1 = (x0 + 1).min(src.width - 1);
    let y1 = (y0 + 1).min(src.height - 1);
    let fx = sx - x0 as f32;
    let fy = sy - y0 as f32;

    let c00 = unpack(src.get(x0, y0));
    let c10 = unpack(src.get(x1, y0));
    let c01 = unpack(src.get(x0, y1));
    let c11 = unpack(src.get(x1, y1));

    let lerp = |a: u32, b: u32, t: f32| -> u32 { (a as f32 + (b as f32 - a as f32) * t).round() as u32 };
    let top = (
        lerp(c00.0, c10.0, fx),
        lerp(c00.1, c10.1, fx),
        lerp(c00.2, c10.2, fx),
        lerp(c00.3, c10.3, fx),
    );
    let bot = (
        lerp(c01.0, c11.0, fx),
        lerp(c01.1, c11.1, fx),
        lerp(c01.2, c11.2, fx),
        lerp(c01.3, c11.3, fx),
    );
    pack(
        lerp(top.0, bot.0, fy),
        lerp(top.1, bot.1, fy),
        lerp(top.2, bot.2, fy),
        lerp(top.3, bot.3, fy),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_clips_to_bounds() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.fill(
            Rect {
                x: -2,
                y: -2,
                width: 4,
                height: 4,
            },
            0xFFFF_0000,
        );
        assert_eq!(buf.get(0, 0), 0xFFFF_0000);
        assert_eq!(buf.get(3, 3), 0);
    }

    #[test]
    fn composite_over_transparent_src_is_noop() {
        let mut dst = PixelBuffer::new(2, 2);
        dst.fill(
            Rect {
                x: 0,
                y: 0,
                width: 2,
                height: 2,
            },
            0xFF00_FF00,
        );
        let src = PixelBuffer::new(2, 2);
        dst.composite_over(&src, (0, 0), (0, 0), (2, 2));
        assert_eq!(dst.get(0, 0), 0xFF00_FF00);
    }

    #[test]
    fn composite_over_opaque_src_replaces_dst() {
        let mut dst = PixelBuffer::new(1, 1);
        dst.set(0, 0, 0xFF00_FF00);
        let mut src = PixelBuffer::new(1, 1);
        src.set(0, 0, 0xFFFF_0000);
        dst.composite_over(&src, (0, 0), (0, 0), (1, 1));
        assert_eq!(dst.get(0, 0), 0xFFFF_0000);
    }
}
