//! Compositing a single block's background, borders, and content bitmap
//! onto a surface's pixel buffer (spec §4.E "Block render").

use crate::geometry::{BlockBox, Rect};
use crate::pixel::PixelBuffer;

use super::{Block, BorderSide};

/// Composite `block` into `dst` at `bbox`. Order: background, then the
/// four borders, then content (clipped to the interior so it never draws
/// under a border).
pub fn render_block(dst: &mut PixelBuffer, block: &Block, bbox: &BlockBox) {
    if !block.render {
        return;
    }

    let left = block.border(BorderSide::Left).width.max(0);
    let right = block.border(BorderSide::Right).width.max(0);
    let top = block.border(BorderSide::Top).width.max(0);
    let bottom = block.border(BorderSide::Bottom).width.max(0);

    let interior = Rect {
        x: bbox.x + left,
        y: bbox.y + top,
        width: (bbox.width - left - right).max(0),
        height: (bbox.height - top - bottom).max(0),
    };

    if let Some(color) = block.color {
        dst.fill(interior, color.premultiply());
    }

    // Left/right borders span the full block height; top/bottom span only
    // between them, so the four corners "belong" to the left/right border.
    if left > 0 {
        if let Some(c) = block.border(BorderSide::Left).color {
            dst.fill(
                Rect { x: bbox.x, y: bbox.y, width: left, height: bbox.height },
                c.premultiply(),
            );
        }
    }
    if right > 0 {
        if let Some(c) = block.border(BorderSide::Right).color {
            dst.fill(
                Rect {
                    x: bbox.x + bbox.width - right,
                    y: bbox.y,
                    width: right,
                    height: bbox.height,
                },
                c.premultiply(),
            );
        }
    }
    if top > 0 {
        if let Some(c) = block.border(BorderSide::Top).color {
            dst.fill(
                Rect {
                    x: bbox.x + left,
                    y: bbox.y,
                    width: (bbox.width - left - right).max(0),
                    height: top,
                },
                c.premultiply(),
            );
        }
    }
    if bottom > 0 {
        if let Some(c) = block.border(BorderSide::Bottom).color {
            dst.fill(
                Rect {
                    x: bbox.x + left,
                    y: bbox.y + bbox.height - bottom,
                    width: (bbox.width - left - right).max(0),
                    height: bottom,
                },
                c.premultiply(),
            );
        }
    }

    if let Some(content) = &block.content {
        let (ox, oy) = block.content_anchor.offset_within(
            interior.width,
            interior.height,
            bbox.content_width,
            bbox.content_height,
        );
        dst.blit_transformed(
            content,
            block.content_transform,
            bbox.content_width,
            bbox.content_height,
            (interior.x + ox, interior.y + oy),
            interior,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockKind;
    use crate::color::Color;
    use crate::geometry::{Anchor, ContentAnchor, ContentTransform};
    use crate::size_language::SizeValue;

    fn block_with_bg(color: Color) -> Block {
        Block {
            id: 0,
            kind: BlockKind::Spacer,
            anchor: Anchor::Left,
            color: Some(color),
            min_width: SizeValue::Auto,
            max_width: SizeValue::Auto,
            min_height: SizeValue::Auto,
            max_height: SizeValue::Auto,
            content_width: SizeValue::Auto,
            content_height: SizeValue::Auto,
            content_transform: ContentTransform::Normal,
            content_anchor: ContentAnchor::LeftCenter,
            borders: Default::default(),
            render: true,
            content: None,
            natural_width: 0,
            natural_height: 0,
        }
    }

    #[test]
    fn background_fills_interior_not_borders() {
        let mut block = block_with_bg(Color(0xFF00_FF00));
        block.borders[BorderSide::Left as usize] = super::super::Border {
            width: 2,
            color: Some(Color(0xFFFF_0000)),
        };
        let dst_box = BlockBox { x: 0, y: 0, width: 10, height: 10, content_width: 0, content_height: 0 };
        let mut dst = PixelBuffer::new(10, 10);
        render_block(&mut dst, &block, &dst_box);
        assert_eq!(dst.get(0, 5), 0xFFFF_0000); // inside left border
        assert_eq!(dst.get(5, 5), 0xFF00_FF00); // interior background
    }

    #[test]
    fn render_false_draws_nothing() {
        let mut block = block_with_bg(Color(0xFF00_FF00));
        block.render = false;
        let dst_box = BlockBox { x: 0, y: 0, width: 4, height: 4, content_width: 0, content_height: 0 };
        let mut dst = PixelBuffer::new(4, 4);
        render_block(&mut dst, &block, &dst_box);
        assert_eq!(dst.get(1, 1), 0);
    }
}
