//! One texture per stream. The cache owns the GPU objects; callers only
//! ever see an opaque `TextureId`.

use crate::error::TextureError;
use rayon::prelude::*;
use rgbd::{PixelFormat, StreamKind};
use std::collections::HashMap;

/// Opaque handle to a cached texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(u32);

/// Allocation and upload primitives of the graphics context. Textures are
/// always RGBA8, sampled with linear filtering and clamp-to-edge wrapping.
pub trait TextureBackend {
    type Texture;

    fn allocate(&self, label: &str, width: u32, height: u32) -> Self::Texture;

    fn write(&self, texture: &Self::Texture, rgba: &[u8], width: u32, height: u32);
}

#[derive(Debug)]
struct Entry<T> {
    id: TextureId,
    texture: T,
    width: u32,
    height: u32,
}

#[derive(Debug)]
pub struct TextureCache<T> {
    entries: HashMap<StreamKind, Entry<T>>,
    next_id: u32,
}

impl<T> Default for TextureCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }
}

/// RGB8, RGBA8 and Y8 can be shown as textures.
#[inline]
pub fn is_supported(format: PixelFormat) -> bool {
    matches!(format, PixelFormat::Rgb8 | PixelFormat::Rgba8 | PixelFormat::Y8)
}

/// Expands a supported pixel buffer to tightly packed RGBA8.
pub fn to_rgba(pixels: &[u8], width: u32, height: u32, format: PixelFormat) -> Result<Vec<u8>, TextureError> {
    if !is_supported(format) {
        return Err(TextureError::UnsupportedFormat(format));
    }

    let count = width as usize * height as usize;
    let bpp = format.bytes_per_pixel();
    let expected = count * bpp;
    if pixels.len() < expected {
        return Err(TextureError::BufferSize {
            expected,
            actual: pixels.len(),
        });
    }
    let pixels = &pixels[..expected];

    let rgba = match format {
        PixelFormat::Rgba8 => pixels.to_vec(),
        PixelFormat::Rgb8 => pixels
            .par_chunks_exact(3)
            .flat_map_iter(|p| [p[0], p[1], p[2], 255])
            .collect(),
        PixelFormat::Y8 => pixels.par_iter().flat_map_iter(|&l| [l, l, l, 255]).collect(),
        other => return Err(TextureError::UnsupportedFormat(other)),
    };
    Ok(rgba)
}

impl<T> TextureCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads the full image for `stream`. The handle for a stream is
    /// allocated on first use and stays the same afterwards; the backing
    /// storage is reallocated when the image size changes.
    pub fn upload<B>(
        &mut self,
        backend: &B,
        stream: StreamKind,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<TextureId, TextureError>
    where
        B: TextureBackend<Texture = T>,
    {
        let rgba = to_rgba(pixels, width, height, format)?;

        let label = stream.label();
        let entry = match self.entries.entry(stream) {
            std::collections::hash_map::Entry::Occupied(slot) => {
                let entry = slot.into_mut();
                if entry.width != width || entry.height != height {
                    log::debug!(
                        "Reallocating {} texture {}x{} -> {}x{}",
                        label,
                        entry.width,
                        entry.height,
                        width,
                        height
                    );
                    entry.texture = backend.allocate(label, width, height);
                    entry.width = width;
                    entry.height = height;
                }
                entry
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                let id = TextureId(self.next_id);
                self.next_id += 1;
                log::debug!("Allocating {} texture {}x{} ({:?})", label, width, height, id);
                slot.insert(Entry {
                    id,
                    texture: backend.allocate(label, width, height),
                    width,
                    height,
                })
            }
        };

        backend.write(&entry.texture, &rgba, width, height);
        Ok(entry.id)
    }

    /// `None` until the stream has been uploaded once.
    pub fn get_handle(&self, stream: StreamKind) -> Option<TextureId> {
        self.entries.get(&stream).map(|e| e.id)
    }

    pub fn texture(&self, id: TextureId) -> Option<&T> {
        self.entries.values().find(|e| e.id == id).map(|e| &e.texture)
    }
}
