//! External collaborators (spec §4.C): font shaping and image decoding are
//! both "given an input, return ARGB32 pixels" functions the core renderer
//! depends on as trait objects, never as concrete implementations.

pub mod font;
pub mod image;

use crate::error::RendererResourceError;
use crate::pixel::PixelBuffer;

/// One shaped glyph: its bitmap, how far the pen advances after it, and
/// where its bitmap's origin sits relative to the pen position.
pub struct Glyph {
    pub bitmap: PixelBuffer,
    pub advance: i32,
    pub origin_x: i32,
    pub origin_y: i32,
    /// `true` if `bitmap`'s alpha channel is coverage only (to be tinted by
    /// the block's `text_color`); `false` if the bitmap is already
    /// pre-coloured (e.g. colour emoji) and should be composited as-is.
    pub is_mask: bool,
}

pub struct GlyphRun {
    pub glyphs: Vec<Glyph>,
    pub ascent: i32,
    pub descent: i32,
    pub height: i32,
}

/// Rasterise a UTF-32 run over a font. Font selection tries
/// `font_names` in order with a final implicit fallback; `attributes` is an
/// opaque font-description string (e.g. fontconfig-style `:size=16`).
pub trait FontProvider {
    fn shape(
        &self,
        font_names: &[String],
        attributes: &str,
        text: &str,
    ) -> Result<GlyphRun, RendererResourceError>;
}

/// Decode an image file to ARGB32. `natural_width`/`natural_height` are the
/// bitmap's own pixel dimensions before any block-level scaling.
pub trait ImageProvider {
    fn load(
        &self,
        path: &str,
        image_type: super::block::ImageType,
    ) -> Result<(PixelBuffer, i32, i32), RendererResourceError>;
}
