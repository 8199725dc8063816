//! Block layout — the size-language resolution ladder and the three-pass
//! surface layout algorithm (spec §4.E).

use crate::geometry::{Anchor, BlockBox};
use crate::size_language::SizeContext;

use super::Block;

/// The result of resolving one block's size-language fields against a
/// [`SizeContext`]: the block's own content box plus its outer (bordered,
/// possibly surface-stretched) box.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvedSize {
    pub width: i32,
    pub height: i32,
    pub content_width: i32,
    pub content_height: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct SurfaceOrientation {
    pub vertical: bool,
}

fn clamp_if_max_positive(raw: i32, min_v: i32, max_v: i32) -> i32 {
    if max_v > 0 {
        let lo = min_v.max(0).min(max_v);
        raw.clamp(lo, max_v)
    } else {
        raw
    }
}

/// Resolve one block's natural box. `orientation` is `None` inside a
/// composite, where `surface*` references are unbound and the anchor-based
/// cross-axis stretch never applies.
pub fn natural_box(
    block: &Block,
    ctx: &SizeContext,
    orientation: Option<SurfaceOrientation>,
) -> ResolvedSize {
    let mut content_w = if matches!(block.content_width, crate::size_language::SizeValue::Auto)
        && block.natural_width > 0
    {
        block.natural_width
    } else {
        block.content_width.resolve(ctx)
    };
    let mut content_h = if matches!(block.content_height, crate::size_language::SizeValue::Auto)
        && block.natural_height > 0
    {
        block.natural_height
    } else {
        block.content_height.resolve(ctx)
    };

    if block.content_transform.swaps_dimensions() {
        std::mem::swap(&mut content_w, &mut content_h);
    }

    let border_w = block.border(super::BorderSide::Left).width + block.border(super::BorderSide::Right).width;
    let border_h = block.border(super::BorderSide::Top).width + block.border(super::BorderSide::Bottom).width;

    let mut width = content_w + border_w;
    let mut height = content_h + border_h;

    if block.anchor == Anchor::None {
        if let Some(sw) = ctx.surface_width {
            width = sw;
        }
        if let Some(sh) = ctx.surface_height {
            height = sh;
        }
    } else if let Some(orient) = orientation {
        if orient.vertical {
            if let Some(sw) = ctx.surface_width {
                width = sw;
            }
        } else if let Some(sh) = ctx.surface_height {
            height = sh;
        }
    }

    let (min_w, max_w) = block.effective_width_bounds();
    let (min_h, max_h) = block.effective_height_bounds();
    width = clamp_if_max_positive(width, min_w.resolve(ctx), max_w.resolve(ctx));
    height = clamp_if_max_positive(height, min_h.resolve(ctx), max_h.resolve(ctx));

    ResolvedSize {
        width,
        height,
        content_width: content_w,
        content_height: content_h,
    }
}

/// Three-pass main-axis layout (spec §4.E). `surface_width`/`surface_height`
/// are the surface's own current dimensions (used both as the basis for
/// `surface*` refs and as the axis length); `output_width`/`output_height`
/// ground `output*` refs.
pub fn layout_surface(
    blocks: &[super::BlockHandle],
    vertical: bool,
    surface_width: i32,
    surface_height: i32,
    output_width: i32,
    output_height: i32,
) -> Vec<BlockBox> {
    let orientation = SurfaceOrientation { vertical };
    let main_len = if vertical { surface_height } else { surface_width };

    // Pass 1: measure every block, tracking prev-sibling context as we go.
    let mut resolved = Vec::with_capacity(blocks.len());
    let mut prev: Option<ResolvedSize> = None;
    for handle in blocks {
        let block = handle.borrow();
        let ctx = SizeContext {
            surface_width: Some(surface_width),
            surface_height: Some(surface_height),
            output_width: Some(output_width),
            output_height: Some(output_height),
            prev_block_width: prev.map(|p| p.width),
            prev_block_height: prev.map(|p| p.height),
            prev_content_width: prev.map(|p| p.content_width),
            prev_content_height: prev.map(|p| p.content_height),
        };
        let size = natural_box(&block, &ctx, Some(orientation));
        prev = Some(size);
        resolved.push((block.anchor, size));
    }

    // Pass 2: centred total and starting cursor.
    let centered_total: i32 = resolved
        .iter()
        .filter(|(a, _)| *a == Anchor::Center)
        .map(|(_, s)| if vertical { s.height } else { s.width })
        .sum();
    let mut l = 0i32;
    let mut r = main_len;
    let mut c = (main_len - centered_total) / 2;

    // Pass 3: assign positions.
    let mut boxes = Vec::with_capacity(resolved.len());
    for (anchor, size) in resolved {
        let main_axis_len = if vertical { size.height } else { size.width };
        let pos = match anchor {
            Anchor::Left | Anchor::Top => {
                let p = l;
                l += main_axis_len;
                p
            }
            Anchor::Right | Anchor::Bottom => {
                r -= main_axis_len;
                r
            }
            Anchor::Center => {
                let p = c;
                c += main_axis_len;
                p
            }
            Anchor::None => 0,
        };
        let (x, y) = if vertical { (0, pos) } else { (pos, 0) };
        boxes.push(BlockBox {
            x,
            y,
            width: size.width,
            height: size.height,
            content_width: size.content_width,
            content_height: size.content_height,
        });
    }
    boxes
}

/// A surface's "wanted size" when the controller supplies `0` for a
/// dimension: sum natural boxes along the main axis, max them along the
/// cross axis, over only `render && anchor != None` blocks (spec §4.E).
pub fn derive_wanted_size(
    blocks: &[super::BlockHandle],
    vertical: bool,
    output_width: i32,
    output_height: i32,
) -> (i32, i32) {
    let mut prev: Option<ResolvedSize> = None;
    let mut main_total = 0i32;
    let mut cross_max = 0i32;
    for handle in blocks {
        let block = handle.borrow();
        if !block.render || block.anchor == Anchor::None {
            continue;
        }
        // surface* is not yet known; resolve with None so such refs fall
        // back to 0, matching "not available in this context".
        let ctx = SizeContext {
            surface_width: None,
            surface_height: None,
            output_width: Some(output_width),
            output_height: Some(output_height),
            prev_block_width: prev.map(|p| p.width),
            prev_block_height: prev.map(|p| p.height),
            prev_content_width: prev.map(|p| p.content_width),
            prev_content_height: prev.map(|p| p.content_height),
        };
        let size = natural_box(&block, &ctx, None);
        prev = Some(size);
        let main = if vertical { size.height } else { size.width };
        let cross = if vertical { size.width } else { size.height };
        main_total += main;
        cross_max = cross_max.max(cross);
    }
    if vertical {
        (cross_max, main_total)
    } else {
        (main_total, cross_max)
    }
}

/// One child of a composite block, as parsed from JSON, before its position
/// within the composite's content bitmap is decided.
pub struct CompositeChildSpec {
    pub size: ResolvedSize,
    pub anchor: Anchor,
    pub explicit_xy: Option<(i32, i32)>,
}

/// Position composite children: explicit `x,y` wins; otherwise position
/// relative to the previous child by anchor. Negative origins trigger a
/// retroactive shift of every already-placed child so the composite's
/// content starts at `(0, 0)` (spec §4.E).
pub fn layout_composite_children(specs: &[CompositeChildSpec]) -> (Vec<BlockBox>, i32, i32) {
    let mut boxes: Vec<BlockBox> = Vec::with_capacity(specs.len());
    let mut prev: Option<BlockBox> = None;

    for spec in specs {
        let (mut x, mut y) = if let Some(xy) = spec.explicit_xy {
            xy
        } else if let Some(p) = prev {
            match spec.anchor {
                Anchor::Left => (p.x - spec.size.width, p.y + (p.height - spec.size.height) / 2),
                Anchor::Right => (p.x + p.width, p.y + (p.height - spec.size.height) / 2),
                Anchor::Top => (p.x + (p.width - spec.size.width) / 2, p.y - spec.size.height),
                Anchor::Bottom => (p.x + (p.width - spec.size.width) / 2, p.y + p.height),
                Anchor::Center | Anchor::None => (0, 0),
            }
        } else {
            (0, 0)
        };

        // Retroactive shift if this child lands at a negative origin.
        if x < 0 {
            let shift = -x;
            for b in boxes.iter_mut() {
                b.x += shift;
            }
            if let Some(p) = prev.as_mut() {
                p.x += shift;
            }
            x = 0;
        }
        if y < 0 {
            let shift = -y;
            for b in boxes.iter_mut() {
                b.y += shift;
            }
            if let Some(p) = prev.as_mut() {
                p.y += shift;
            }
            y = 0;
        }

        let b = BlockBox {
            x,
            y,
            width: spec.size.width,
            height: spec.size.height,
            content_width: spec.size.content_width,
            content_height: spec.size.content_height,
        };
        boxes.push(b);
        prev = Some(b);
    }

    let bounding_w = boxes.iter().map(|b| b.x + b.width).max().unwrap_or(0);
    let bounding_h = boxes.iter().map(|b| b.y + b.height).max().unwrap_or(0);
    (boxes, bounding_w, bounding_h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, BlockKind};
    use crate::color::Color;
    use crate::geometry::{ContentAnchor, ContentTransform};
    use crate::size_language::SizeValue;
    use std::rc::Rc;

    fn make_block(anchor: Anchor, content_w: i32, content_h: i32) -> super::super::BlockHandle {
        Rc::new(std::cell::RefCell::new(Block {
            id: 0,
            kind: BlockKind::Spacer,
            anchor,
            color: Some(Color(0xFF00_0000)),
            min_width: SizeValue::Auto,
            max_width: SizeValue::Auto,
            min_height: SizeValue::Auto,
            max_height: SizeValue::Auto,
            content_width: SizeValue::Absolute(content_w as u32),
            content_height: SizeValue::Absolute(content_h as u32),
            content_transform: ContentTransform::Normal,
            content_anchor: ContentAnchor::LeftCenter,
            borders: Default::default(),
            render: true,
            content: None,
            natural_width: 0,
            natural_height: 0,
        }))
    }

    #[test]
    fn left_and_right_anchors_pack_from_opposite_ends() {
        let blocks = vec![make_block(Anchor::Left, 10, 5), make_block(Anchor::Right, 20, 5)];
        let boxes = layout_surface(&blocks, false, 100, 20, 100, 20);
        assert_eq!(boxes[0].x, 0);
        assert_eq!(boxes[1].x, 80);
    }

    #[test]
    fn center_anchor_is_centred_in_remaining_space() {
        let blocks = vec![make_block(Anchor::Center, 10, 5)];
        let boxes = layout_surface(&blocks, false, 100, 20, 100, 20);
        assert_eq!(boxes[0].x, 45);
    }

    #[test]
    fn none_anchor_is_full_surface_at_origin() {
        let blocks = vec![make_block(Anchor::None, 10, 5)];
        let boxes = layout_surface(&blocks, false, 100, 20, 100, 20);
        assert_eq!(boxes[0], BlockBox {
            x: 0,
            y: 0,
            width: 100,
            height: 20,
            content_width: 10,
            content_height: 5,
        });
    }

    #[test]
    fn vertical_surface_stretches_width_of_anchored_blocks() {
        let blocks = vec![make_block(Anchor::Top, 10, 5)];
        let boxes = layout_surface(&blocks, true, 50, 200, 50, 200);
        assert_eq!(boxes[0].width, 50);
        assert_eq!(boxes[0].height, 5);
    }

    #[test]
    fn composite_negative_origin_shifts_all_prior_children() {
        let specs = vec![
            CompositeChildSpec {
                size: ResolvedSize { width: 10, height: 10, content_width: 10, content_height: 10 },
                anchor: Anchor::Center,
                explicit_xy: Some((10, 0)),
            },
            CompositeChildSpec {
                size: ResolvedSize { width: 20, height: 10, content_width: 20, content_height: 10 },
                anchor: Anchor::Left,
                explicit_xy: None,
            },
        ];
        let (boxes, w, _h) = layout_composite_children(&specs);
        // second child anchors Left relative to first: x = 10 - 20 = -10, shifting
        // everything right by 10.
        assert_eq!(boxes[1].x, 0);
        assert_eq!(boxes[0].x, 20);
        assert_eq!(w, 40);
    }
}
