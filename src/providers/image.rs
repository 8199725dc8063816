//! Image decoding and the `(path, mtime)` cache in front of it (spec §4.C,
//! §4.D "Image cache keys are `(path, mtime)`").

use std::collections::HashMap;
use std::rc::Rc;
use std::time::SystemTime;

use crate::block::ImageType;
use crate::error::RendererResourceError;
use crate::pixel::PixelBuffer;

use super::ImageProvider;

struct CachedImage {
    bitmap: Rc<PixelBuffer>,
    width: i32,
    height: i32,
    mtime: SystemTime,
}

/// Caches decoded bitmaps by path, evicting on any mtime change — a fresh
/// `stat` that differs from the cached mtime evicts unconditionally.
#[derive(Default)]
pub struct ImageCache {
    entries: HashMap<String, CachedImage>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(
        &mut self,
        path: &str,
        image_type: ImageType,
        provider: &dyn ImageProvider,
    ) -> Result<(Rc<PixelBuffer>, i32, i32), RendererResourceError> {
        let mtime = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| RendererResourceError::ImageDecode {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(cached) = self.entries.get(path) {
            if cached.mtime == mtime {
                return Ok((cached.bitmap.clone(), cached.width, cached.height));
            }
        }

        let (bitmap, width, height) = provider.load(path, image_type)?;
        let bitmap = Rc::new(bitmap);
        self.entries.insert(
            path.to_string(),
            CachedImage { bitmap: bitmap.clone(), width, height, mtime },
        );
        Ok((bitmap, width, height))
    }
}

/// The default [`ImageProvider`]: raw pixmap always available, PNG/SVG
/// behind their respective Cargo features.
pub struct DefaultImageProvider;

impl ImageProvider for DefaultImageProvider {
    fn load(
        &self,
        path: &str,
        image_type: ImageType,
    ) -> Result<(PixelBuffer, i32, i32), RendererResourceError> {
        match image_type {
            ImageType::Pixmap => load_pixmap(path),
            ImageType::Png => load_png(path),
            ImageType::Svg => load_svg(path),
        }
    }
}

/// Raw format: `{u32 width, u32 height, u32 pixels[width*height]}`,
/// native-endian, straight ARGB32 — premultiplied on load.
fn load_pixmap(path: &str) -> Result<(PixelBuffer, i32, i32), RendererResourceError> {
    let decode_err = |reason: String| RendererResourceError::ImageDecode {
        path: path.to_string(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| decode_err(e.to_string()))?;
    if bytes.len() < 8 {
        return Err(decode_err("pixmap header truncated".into()));
    }
    let width = u32::from_ne_bytes(bytes[0..4].try_into().unwrap()) as i32;
    let height = u32::from_ne_bytes(bytes[4..8].try_into().unwrap()) as i32;
    let expected = 8 + (width as usize) * (height as usize) * 4;
    if bytes.len() < expected {
        return Err(decode_err("pixmap pixel data truncated".into()));
    }

    let mut buf = PixelBuffer::new(width, height);
    for i in 0..(width as usize * height as usize) {
        let off = 8 + i * 4;
        let straight = u32::from_ne_bytes(bytes[off..off + 4].try_into().unwrap());
        let premultiplied = crate::color::Color::from_json_u32(straight).premultiply();
        let x = (i % width.max(1) as usize) as i32;
        let y = (i / width.max(1) as usize) as i32;
        buf.set(x, y, premultiplied);
    }
    Ok((buf, width, height))
}

#[cfg(feature = "png")]
fn load_png(path: &str) -> Result<(PixelBuffer, i32, i32), RendererResourceError> {
    let decode_err = |reason: String| RendererResourceError::ImageDecode {
        path: path.to_string(),
        reason,
    };
    let img = image::open(path).map_err(|e| decode_err(e.to_string()))?.to_rgba8();
    let (width, height) = (img.width() as i32, img.height() as i32);
    let mut buf = PixelBuffer::new(width, height);
    for (x, y, px) in img.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let straight = ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
        let premultiplied = crate::color::Color::from_json_u32(straight).premultiply();
        buf.set(x as i32, y as i32, premultiplied);
    }
    Ok((buf, width, height))
}

#[cfg(not(feature = "png"))]
fn load_png(path: &str) -> Result<(PixelBuffer, i32, i32), RendererResourceError> {
    Err(RendererResourceError::ImageDecode {
        path: path.to_string(),
        reason: "built without the `png` feature".into(),
    })
}

#[cfg(feature = "svg")]
fn load_svg(path: &str) -> Result<(PixelBuffer, i32, i32), RendererResourceError> {
    let decode_err = |reason: String| RendererResourceError::ImageDecode {
        path: path.to_string(),
        reason,
    };
    let data = std::fs::read(path).map_err(|e| decode_err(e.to_string()))?;
    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_data(&data, &opt).map_err(|e| decode_err(e.to_string()))?;
    let size = tree.size();
    let (width, height) = (size.width().ceil() as u32, size.height().ceil() as u32);
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width.max(1), height.max(1))
        .ok_or_else(|| decode_err("zero-sized SVG".into()))?;
    resvg::render(&tree, resvg::tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    let mut buf = PixelBuffer::new(width as i32, height as i32);
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let idx = ((y as u32 * width + x as u32) * 4) as usize;
            let data = pixmap.data();
            // tiny_skia stores premultiplied RGBA already.
            let (r, g, b, a) = (data[idx], data[idx + 1], data[idx + 2], data[idx + 3]);
            let packed = ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
            buf.set(x, y, packed);
        }
    }
    Ok((buf, width as i32, height as i32))
}

#[cfg(not(feature = "svg"))]
fn load_svg(path: &str) -> Result<(PixelBuffer, i32, i32), RendererResourceError> {
    Err(RendererResourceError::ImageDecode {
        path: path.to_string(),
        reason: "built without the `svg` feature".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn pixmap_roundtrips_a_solid_red_square() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&2u32.to_ne_bytes()).unwrap();
        file.write_all(&2u32.to_ne_bytes()).unwrap();
        for _ in 0..4 {
            file.write_all(&0xFFFF_0000u32.to_ne_bytes()).unwrap();
        }
        let (buf, w, h) = load_pixmap(file.path().to_str().unwrap()).unwrap();
        assert_eq!((w, h), (2, 2));
        assert_eq!(buf.get(0, 0), 0xFFFF_0000);
    }

    #[test]
    fn cache_reuses_bitmap_until_mtime_changes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&1u32.to_ne_bytes()).unwrap();
        file.write_all(&1u32.to_ne_bytes()).unwrap();
        file.write_all(&0xFF00_FF00u32.to_ne_bytes()).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let mut cache = ImageCache::new();
        let provider = DefaultImageProvider;
        let (a, _, _) = cache.load(&path, ImageType::Pixmap, &provider).unwrap();
        let (b, _, _) = cache.load(&path, ImageType::Pixmap, &provider).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }
}
