//! The block data model (spec §3) — the smallest visual unit drawn into a
//! bar or popup.

pub mod cache;
pub mod layout;
pub mod parse;
pub mod render;

pub use cache::BlockCache;

use std::cell::RefCell;
use std::rc::Rc;

use crate::color::Color;
use crate::geometry::{Anchor, ContentAnchor, ContentTransform};
use crate::pixel::PixelBuffer;
use crate::size_language::SizeValue;

/// Shared ownership of a block: surfaces, composite parents, and the
/// id-index all hold a clone of this handle. The id-index's clone is a
/// `Weak`, so it never keeps a block alive by itself (spec §9, "refcounted
/// blocks").
pub type BlockHandle = Rc<RefCell<Block>>;

/// `borders[BorderSide::Left as usize]` etc. This ordering — not CSS
/// top/right/bottom/left order — is load-bearing for `bar_configure`'s
/// margin array in the original implementation and is preserved here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderSide {
    Left = 0,
    Right = 1,
    Bottom = 2,
    Top = 3,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Border {
    pub width: i32,
    pub color: Option<Color>,
}

#[derive(Debug, Clone)]
pub enum BlockKind {
    Spacer,
    Text {
        text: String,
        font_names: Vec<String>,
        font_attributes: String,
        text_color: Color,
    },
    Image {
        path: String,
        image_type: ImageType,
    },
    Composite {
        children: Vec<BlockHandle>,
        /// Each child's position within the composite's content bitmap,
        /// baked in at construction time.
        child_boxes: Vec<crate::geometry::BlockBox>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Pixmap,
    Png,
    Svg,
}

/// A rectangular visual primitive. See spec §3 for the full field
/// rationale; `content` is rasterised once at construction and is
/// thereafter immutable.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: u64,
    pub kind: BlockKind,
    pub anchor: Anchor,
    pub color: Option<Color>,
    pub min_width: SizeValue,
    pub max_width: SizeValue,
    pub min_height: SizeValue,
    pub max_height: SizeValue,
    pub content_width: SizeValue,
    pub content_height: SizeValue,
    pub content_transform: ContentTransform,
    pub content_anchor: ContentAnchor,
    pub borders: [Border; 4],
    pub render: bool,
    /// Rasterised content bitmap, and its natural (unscaled) size. `None`
    /// for spacers, or when a resource failed to load (see
    /// `RendererResourceError`, which substitutes a transparent spacer).
    pub content: Option<PixelBuffer>,
    pub natural_width: i32,
    pub natural_height: i32,
}

impl Block {
    pub fn border(&self, side: BorderSide) -> &Border {
        &self.borders[side as usize]
    }

    /// `min_width > max_width > 0` disables both — size-language treats the
    /// block as unconstrained on that axis (spec §8 boundary behaviour).
    pub fn effective_width_bounds(&self) -> (SizeValue, SizeValue) {
        disable_if_inverted(self.min_width, self.max_width)
    }

    pub fn effective_height_bounds(&self) -> (SizeValue, SizeValue) {
        disable_if_inverted(self.min_height, self.max_height)
    }
}

fn disable_if_inverted(min: SizeValue, max: SizeValue) -> (SizeValue, SizeValue) {
    if let (SizeValue::Absolute(min_n), SizeValue::Absolute(max_n)) = (min, max) {
        if min_n > 0 && max_n > 0 && max_n < min_n {
            return (SizeValue::Auto, SizeValue::Auto);
        }
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_min_max_disables_both() {
        let (min, max) =
            disable_if_inverted(SizeValue::Absolute(50), SizeValue::Absolute(10));
        assert_eq!(min, SizeValue::Auto);
        assert_eq!(max, SizeValue::Auto);
    }

    #[test]
    fn non_inverted_bounds_pass_through() {
        let (min, max) =
            disable_if_inverted(SizeValue::Absolute(10), SizeValue::Absolute(50));
        assert_eq!(min, SizeValue::Absolute(10));
        assert_eq!(max, SizeValue::Absolute(50));
    }
}
