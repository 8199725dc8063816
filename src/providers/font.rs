//! A minimal built-in [`FontProvider`](super::FontProvider). Real glyph
//! shaping is an external concern (spec §4.C); this stub exists so the
//! binary is runnable without wiring in a text-shaping stack, producing
//! deterministic fixed-width coverage boxes instead of real glyph outlines.

use crate::error::RendererResourceError;
use crate::pixel::PixelBuffer;

use super::{FontProvider, Glyph, GlyphRun};

/// Falls back to `monospace:size=16`, mirroring the original's default
/// font-name list when the controller supplies none.
pub const DEFAULT_FONT_ATTRIBUTES: &str = "size=16";

pub struct MonospaceStub;

fn parse_size(attributes: &str) -> i32 {
    for part in attributes.split(':') {
        if let Some(v) = part.strip_prefix("size=") {
            if let Ok(n) = v.parse::<i32>() {
                return n.max(1);
            }
        }
    }
    16
}

impl FontProvider for MonospaceStub {
    fn shape(
        &self,
        _font_names: &[String],
        attributes: &str,
        text: &str,
    ) -> Result<GlyphRun, RendererResourceError> {
        let size = parse_size(attributes);
        let cell_w = (size as f32 * 0.6).round() as i32;
        let ascent = (size as f32 * 0.8).round() as i32;
        let descent = size - ascent;

        let mut glyphs = Vec::with_capacity(text.chars().count());
        for ch in text.chars() {
            let mut bitmap = PixelBuffer::new(cell_w.max(1), size.max(1));
            if !ch.is_whitespace() {
                // Full coverage mask; the caller tints with text_color.
                for y in 0..bitmap.height {
                    for x in 0..bitmap.width {
                        bitmap.set(x, y, 0xFFFF_FFFF);
                    }
                }
            }
            glyphs.push(Glyph {
                bitmap,
                advance: cell_w,
                origin_x: 0,
                origin_y: 0,
                is_mask: true,
            });
        }

        Ok(GlyphRun {
            glyphs,
            ascent,
            descent,
            height: size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_glyphs() {
        let run = MonospaceStub.shape(&[], DEFAULT_FONT_ATTRIBUTES, "").unwrap();
        assert!(run.glyphs.is_empty());
        assert_eq!(run.height, 16);
    }

    #[test]
    fn each_character_advances_by_cell_width() {
        let run = MonospaceStub.shape(&[], "size=20", "hi").unwrap();
        assert_eq!(run.glyphs.len(), 2);
        assert!(run.glyphs.iter().all(|g| g.advance == 12));
    }

    #[test]
    fn whitespace_glyph_has_no_coverage() {
        let run = MonospaceStub.shape(&[], DEFAULT_FONT_ATTRIBUTES, " ").unwrap();
        assert_eq!(run.glyphs[0].bitmap.get(0, 0), 0);
    }
}
