//! Decode one JSON block description (spec §6) into a [`Block`], rasterising
//! its content once at construction time and reusing cached instances by id
//! (spec §4.D).

use serde_json::Value;

use crate::color::Color;
use crate::geometry::{Anchor, ContentAnchor, ContentTransform};
use crate::providers::image::ImageCache;
use crate::providers::{FontProvider, ImageProvider};
use crate::size_language::{SizeContext, SizeValue};

use super::layout::{self, CompositeChildSpec, ResolvedSize};
use super::{Block, BlockCache, BlockHandle, BlockKind, Border, ImageType};

/// Everything `parse_block` needs beyond the JSON itself. Borrowed, not
/// owned, so the reconciler can reuse one set of providers across an
/// entire incoming state document. The same `cache` is threaded through
/// composite children, since the id-index is process-wide, not per-subtree
/// (spec §4.D).
pub struct ParseEnv<'a> {
    pub cache: &'a mut BlockCache,
    pub fonts: &'a dyn FontProvider,
    pub images: &'a mut ImageCache,
    pub image_provider: &'a dyn ImageProvider,
}

fn get_i64(json: &Value, key: &str) -> Option<i64> {
    json.get(key).and_then(Value::as_i64)
}

fn size_value(json: &Value, key: &str) -> SizeValue {
    get_i64(json, key).map(SizeValue::decode).unwrap_or(SizeValue::Auto)
}

fn color(json: &Value, key: &str) -> Option<Color> {
    json.get(key)
        .and_then(Value::as_u64)
        .map(|v| Color::from_json_u32(v as u32))
}

fn border(json: &Value, key: &str) -> Border {
    match json.get(key) {
        Some(obj) => Border {
            width: obj.get("width").and_then(Value::as_i64).unwrap_or(0) as i32,
            color: color(obj, "color"),
        },
        None => Border::default(),
    }
}

fn anchor(json: &Value) -> Anchor {
    get_i64(json, "anchor").map(Anchor::from_wire).unwrap_or_default()
}

fn content_transform(json: &Value) -> ContentTransform {
    get_i64(json, "content_transform")
        .map(ContentTransform::from_wire)
        .unwrap_or_default()
}

fn content_anchor(json: &Value) -> ContentAnchor {
    get_i64(json, "content_anchor")
        .map(ContentAnchor::from_wire)
        .unwrap_or_default()
}

fn string_list(json: &Value, key: &str) -> Vec<String> {
    json.get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect())
        .unwrap_or_default()
}

fn image_type(json: &Value) -> Option<ImageType> {
    match json.get("image_type").and_then(Value::as_str) {
        Some("pixmap") => Some(ImageType::Pixmap),
        Some("png") => Some(ImageType::Png),
        Some("svg") => Some(ImageType::Svg),
        _ => None,
    }
}

/// Shared fields every block variant carries, parsed once.
struct CommonFields {
    id: u64,
    anchor: Anchor,
    color: Option<Color>,
    min_width: SizeValue,
    max_width: SizeValue,
    min_height: SizeValue,
    max_height: SizeValue,
    content_width: SizeValue,
    content_height: SizeValue,
    content_transform: ContentTransform,
    content_anchor: ContentAnchor,
    borders: [Border; 4],
    render: bool,
}

fn common_fields(json: &Value) -> CommonFields {
    CommonFields {
        id: json.get("id").and_then(Value::as_u64).unwrap_or(0),
        anchor: anchor(json),
        color: color(json, "color"),
        min_width: size_value(json, "min_width"),
        max_width: size_value(json, "max_width"),
        min_height: size_value(json, "min_height"),
        max_height: size_value(json, "max_height"),
        content_width: size_value(json, "content_width"),
        content_height: size_value(json, "content_height"),
        content_transform: content_transform(json),
        content_anchor: content_anchor(json),
        borders: [
            border(json, "border_left"),
            border(json, "border_right"),
            border(json, "border_bottom"),
            border(json, "border_top"),
        ],
        render: json.get("render").and_then(Value::as_bool).unwrap_or(true),
    }
}

/// A spacer carrying `common`'s geometry but no content — used both for
/// genuine spacer blocks and as the fallback substitution for a block
/// whose resource (font/image) failed to load (spec §7
/// `RendererResourceError`).
fn spacer_from(common: CommonFields) -> Block {
    Block {
        id: common.id,
        kind: BlockKind::Spacer,
        anchor: common.anchor,
        color: common.color,
        min_width: common.min_width,
        max_width: common.max_width,
        min_height: common.min_height,
        max_height: common.max_height,
        content_width: common.content_width,
        content_height: common.content_height,
        content_transform: common.content_transform,
        content_anchor: common.content_anchor,
        borders: common.borders,
        render: common.render,
        content: None,
        natural_width: 0,
        natural_height: 0,
    }
}

/// Parse one block JSON description, consulting the id-index first. Returns
/// `None` only for an unsupported block `type` (spec §7 `SurfaceBuildError`)
/// — the caller drops the block from its containing list.
pub fn parse_block(json: &Value, env: &mut ParseEnv) -> Option<BlockHandle> {
    let id = json.get("id").and_then(Value::as_u64).unwrap_or(0);
    if let Some(existing) = env.cache.lookup(id) {
        return Some(existing);
    }
    let block = build_block(json, env)?;
    Some(env.cache.insert(id, block))
}

pub fn parse_blocks(list: &[Value], env: &mut ParseEnv) -> Vec<BlockHandle> {
    list.iter().filter_map(|j| parse_block(j, env)).collect()
}

fn build_block(json: &Value, env: &mut ParseEnv) -> Option<Block> {
    let common = common_fields(json);
    match json.get("type").and_then(Value::as_i64).unwrap_or(0) {
        0 => Some(spacer_from(common)),
        1 => Some(build_text(json, common, env.fonts)),
        2 => Some(build_image(json, common, env.images, env.image_provider)),
        3 => Some(build_composite(json, common, env)),
        other => {
            tracing::debug!(block_type = other, "unsupported block type");
            None
        }
    }
}

fn build_text(json: &Value, common: CommonFields, fonts: &dyn FontProvider) -> Block {
    let text = json.get("text").and_then(Value::as_str).unwrap_or("").to_string();
    let font_names = string_list(json, "font_names");
    let font_attributes = json
        .get("font_attributes")
        .and_then(Value::as_str)
        .unwrap_or(crate::providers::font::DEFAULT_FONT_ATTRIBUTES)
        .to_string();
    let text_color = color(json, "text_color").unwrap_or(Color(0xFFFF_FFFF));

    let run = match fonts.shape(&font_names, &font_attributes, &text) {
        Ok(run) => run,
        Err(e) => {
            tracing::warn!(error = %e, "font shaping failed, substituting transparent spacer");
            return spacer_from(common);
        }
    };

    let natural_width: i32 = run.glyphs.iter().map(|g| g.advance).sum();
    let natural_height = run.height;
    let mut bitmap = crate::pixel::PixelBuffer::new(natural_width.max(1), natural_height.max(1));
    let tint = text_color.premultiply();
    let mut pen_x = 0;
    for glyph in &run.glyphs {
        let offset = (pen_x + glyph.origin_x, glyph.origin_y);
        if glyph.is_mask {
            bitmap.composite_mask_tinted(&glyph.bitmap, tint, offset);
        } else {
            let size = (glyph.bitmap.width, glyph.bitmap.height);
            bitmap.composite_over(&glyph.bitmap, (0, 0), offset, size);
        }
        pen_x += glyph.advance;
    }

    Block {
        id: common.id,
        kind: BlockKind::Text { text, font_names, font_attributes, text_color },
        anchor: common.anchor,
        color: common.color,
        min_width: common.min_width,
        max_width: common.max_width,
        min_height: common.min_height,
        max_height: common.max_height,
        content_width: common.content_width,
        content_height: common.content_height,
        content_transform: common.content_transform,
        content_anchor: common.content_anchor,
        borders: common.borders,
        render: common.render,
        content: Some(bitmap),
        natural_width,
        natural_height,
    }
}

fn build_image(
    json: &Value,
    common: CommonFields,
    images: &mut ImageCache,
    image_provider: &dyn ImageProvider,
) -> Block {
    let path = json.get("path").and_then(Value::as_str).unwrap_or("").to_string();
    let Some(kind) = image_type(json) else {
        tracing::warn!("image block missing a recognised image_type, substituting spacer");
        return spacer_from(common);
    };

    match images.load(&path, kind, image_provider) {
        Ok((bitmap, natural_width, natural_height)) => Block {
            id: common.id,
            kind: BlockKind::Image { path, image_type: kind },
            anchor: common.anchor,
            color: common.color,
            min_width: common.min_width,
            max_width: common.max_width,
            min_height: common.min_height,
            max_height: common.max_height,
            content_width: common.content_width,
            content_height: common.content_height,
            content_transform: common.content_transform,
            content_anchor: common.content_anchor,
            borders: common.borders,
            render: common.render,
            content: Some((*bitmap).clone()),
            natural_width,
            natural_height,
        },
        Err(e) => {
            tracing::warn!(error = %e, path, "image decode failed, substituting transparent spacer");
            spacer_from(common)
        }
    }
}

/// One child's anchor-relative position is resolved with the same
/// size-language engine used for top-level blocks, except `surface*`
/// references are unbound (composite content has no enclosing surface yet)
/// — spec §4.E "`surface*` references are then unbound and resolve to 0".
fn build_composite(json: &Value, common: CommonFields, env: &mut ParseEnv) -> Block {
    let child_json = json.get("blocks").and_then(Value::as_array).cloned().unwrap_or_default();

    let mut children = Vec::with_capacity(child_json.len());
    let mut specs = Vec::with_capacity(child_json.len());
    let mut prev: Option<ResolvedSize> = None;

    for cj in &child_json {
        let Some(child) = parse_block(cj, env) else { continue };
        let explicit_xy = match (cj.get("x").and_then(Value::as_i64), cj.get("y").and_then(Value::as_i64)) {
            (Some(x), Some(y)) => Some((x as i32, y as i32)),
            _ => None,
        };
        let child_anchor = anchor(cj);
        let size = {
            let b = child.borrow();
            let ctx = SizeContext {
                surface_width: None,
                surface_height: None,
                output_width: None,
                output_height: None,
                prev_block_width: prev.map(|p| p.width),
                prev_block_height: prev.map(|p| p.height),
                prev_content_width: prev.map(|p| p.content_width),
                prev_content_height: prev.map(|p| p.content_height),
            };
            layout::natural_box(&b, &ctx, None)
        };
        prev = Some(size);
        specs.push(CompositeChildSpec { size, anchor: child_anchor, explicit_xy });
        children.push(child);
    }

    let (child_boxes, bounding_w, bounding_h) = layout::layout_composite_children(&specs);

    let mut bitmap = crate::pixel::PixelBuffer::new(bounding_w.max(1), bounding_h.max(1));
    for (child, bbox) in children.iter().zip(&child_boxes) {
        super::render::render_block(&mut bitmap, &child.borrow(), bbox);
    }

    Block {
        id: common.id,
        kind: BlockKind::Composite { children, child_boxes },
        anchor: common.anchor,
        color: common.color,
        min_width: common.min_width,
        max_width: common.max_width,
        min_height: common.min_height,
        max_height: common.max_height,
        content_width: common.content_width,
        content_height: common.content_height,
        content_transform: common.content_transform,
        content_anchor: common.content_anchor,
        borders: common.borders,
        render: common.render,
        content: Some(bitmap),
        natural_width: bounding_w,
        natural_height: bounding_h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::font::MonospaceStub;
    use crate::providers::image::DefaultImageProvider;
    use serde_json::json;

    fn env<'a>(cache: &'a mut BlockCache, images: &'a mut ImageCache) -> ParseEnv<'a> {
        ParseEnv { cache, fonts: &MonospaceStub, images, image_provider: &DefaultImageProvider }
    }

    #[test]
    fn spacer_parses_with_defaults() {
        let j = json!({"type": 0});
        let mut cache = BlockCache::new();
        let mut images = ImageCache::new();
        let handle = parse_block(&j, &mut env(&mut cache, &mut images)).unwrap();
        assert!(matches!(handle.borrow().kind, BlockKind::Spacer));
    }

    #[test]
    fn text_block_rasterises_and_caches_by_id() {
        let j = json!({"type": 1, "id": 42, "text": "hi", "text_color": 4294967295u32});
        let mut cache = BlockCache::new();
        let mut images = ImageCache::new();
        let a = parse_block(&j, &mut env(&mut cache, &mut images)).unwrap();
        let b = parse_block(&j, &mut env(&mut cache, &mut images)).unwrap();
        assert!(std::rc::Rc::ptr_eq(&a, &b));
        assert!(a.borrow().content.is_some());
    }

    #[test]
    fn unsupported_type_returns_none() {
        let j = json!({"type": 99});
        let mut cache = BlockCache::new();
        let mut images = ImageCache::new();
        assert!(parse_block(&j, &mut env(&mut cache, &mut images)).is_none());
    }

    #[test]
    fn composite_bakes_children_into_one_bitmap() {
        let j = json!({
            "type": 3,
            "blocks": [
                {"type": 0, "content_width": 10, "content_height": 10, "color": 4294901760u32},
                {"type": 0, "content_width": 10, "content_height": 10, "x": 20, "y": 0, "color": 4278255360u32},
            ],
        });
        let mut cache = BlockCache::new();
        let mut images = ImageCache::new();
        let handle = parse_block(&j, &mut env(&mut cache, &mut images)).unwrap();
        let block = handle.borrow();
        assert!(matches!(block.kind, BlockKind::Composite { .. }));
        assert_eq!(block.natural_width, 30);
        assert!(block.content.is_some());
    }
}
