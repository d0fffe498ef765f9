//! Deduplicated texture loading.
//!
//! Every texture is identified by a canonical key derived from its reference,
//! the model's directory and (for embedded textures) the model's path. The
//! [`TextureCache`] maps keys to uploaded textures for the whole lifetime of
//! the viewer, so no key is decoded or uploaded twice, even across reloads.

use std::{borrow::Cow, collections::HashMap, path::Path};

use image::{DynamicImage, ImageFormat};
use thiserror::Error;

use crate::{
    data_structures::texture::{DecodedImage, PixelFormat},
    gpu::{RenderDevice, TextureHandle},
    resources::scene::{EmbeddedTexture, ParsedScene, embedded_index},
};

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("embedded texture '{reference}' requested without a source scene")]
    MissingScene { reference: String },
    #[error("invalid embedded texture reference '{reference}'")]
    InvalidEmbeddedIndex { reference: String },
    #[error("embedded texture '{reference}' holds {actual} bytes, {expected} expected")]
    InvalidEmbeddedData {
        reference: String,
        expected: usize,
        actual: usize,
    },
    #[error("failed to decode '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: image::ImageError,
    },
    #[error("'{key}' has {components} components per pixel, only 1, 3 and 4 are supported")]
    UnsupportedComponents { key: String, components: u8 },
}

#[derive(Debug, Error)]
pub enum CacheError {
    /// The caller still owns `handle` and has to dispose of it; `cached` is
    /// the texture already stored under `key`.
    #[error("texture key '{key}' is already cached as {cached}")]
    DuplicateKey {
        key: String,
        handle: TextureHandle,
        cached: TextureHandle,
    },
}

/// Derives the deduplication key of a texture reference.
///
/// - `*N` references: `model_path` followed by the reference, e.g.
///   `models/x.glb*0`.
/// - references that look absolute (contain `:/` or `:\`, or start with `/`)
///   are used as they are.
/// - anything else is joined onto `model_dir` with a `/`.
///
/// No `.` or `..` segments are collapsed, so two spellings of the same file
/// produce two keys.
pub fn canonical_key(reference: &str, model_dir: &str, model_path: &str) -> String {
    if embedded_index(reference).is_some() {
        return format!("{model_path}{reference}");
    }
    let absolute =
        reference.contains(":/") || reference.contains(":\\") || reference.starts_with('/');
    if absolute || model_dir.is_empty() {
        return reference.to_string();
    }
    let dir = model_dir.trim_end_matches(['/', '\\']);
    format!("{dir}/{reference}")
}

/// Process-wide store of uploaded textures.
///
/// Entries are never evicted. [`TextureCache::release_all`] deletes every
/// stored texture exactly once and must run while the device is alive.
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: HashMap<String, TextureHandle>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &str) -> Option<TextureHandle> {
        self.entries.get(key).copied()
    }

    pub fn insert(&mut self, key: impl Into<String>, handle: TextureHandle) -> Result<(), CacheError> {
        let key = key.into();
        if let Some(&cached) = self.entries.get(&key) {
            log::error!("Texture key '{key}' is already cached, refusing handle {handle}");
            return Err(CacheError::DuplicateKey {
                key,
                handle,
                cached,
            });
        }
        self.entries.insert(key, handle);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn release_all<D: RenderDevice + ?Sized>(&mut self, device: &mut D) {
        let count = self.entries.len();
        for (key, handle) in self.entries.drain() {
            log::debug!("Releasing texture {handle} ({key})");
            device.delete_texture(handle);
        }
        if count > 0 {
            log::info!("Released {count} cached textures");
        }
    }
}

impl Drop for TextureCache {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            log::warn!(
                "Texture cache dropped with {} textures still uploaded",
                self.entries.len()
            );
        }
    }
}

/// Decodes a compressed image held in memory. `format_hint` is a file
/// extension or MIME subtype such as `png`; unknown hints fall back to
/// sniffing the data.
pub fn decode_memory(
    bytes: &[u8],
    format_hint: Option<&str>,
) -> Result<DynamicImage, image::ImageError> {
    match format_hint.and_then(ImageFormat::from_extension) {
        Some(format) => image::load_from_memory_with_format(bytes, format),
        None => image::load_from_memory(bytes),
    }
}

pub fn decode_file(path: &Path) -> Result<DynamicImage, image::ImageError> {
    image::ImageReader::open(path)?.with_guessed_format()?.decode()
}

/// Converts a decoded image into 8-bit pixels of 1, 3 or 4 components.
/// Deeper images are narrowed to 8 bits per channel.
pub fn to_pixels(image: DynamicImage, key: &str) -> Result<DecodedImage<'static>, TextureError> {
    let components = image.color().channel_count();
    let format =
        PixelFormat::from_components(components).ok_or_else(|| TextureError::UnsupportedComponents {
            key: key.to_string(),
            components,
        })?;
    let (width, height) = (image.width(), image.height());
    let pixels = match format {
        PixelFormat::R8 => image.into_luma8().into_raw(),
        PixelFormat::Rgb8 => image.into_rgb8().into_raw(),
        PixelFormat::Rgba8 => image.into_rgba8().into_raw(),
    };
    Ok(DecodedImage {
        width,
        height,
        format,
        pixels: Cow::Owned(pixels),
    })
}

/// Borrows the texels of a raw embedded texture. Raw data always carries four
/// components per pixel.
fn borrow_raw<'s>(
    texture: &'s EmbeddedTexture,
    reference: &str,
) -> Result<DecodedImage<'s>, TextureError> {
    let image = DecodedImage {
        width: texture.width,
        height: texture.height,
        format: PixelFormat::Rgba8,
        pixels: Cow::Borrowed(&texture.data[..]),
    };
    let expected = image.expected_len();
    if texture.data.len() < expected {
        return Err(TextureError::InvalidEmbeddedData {
            reference: reference.to_string(),
            expected,
            actual: texture.data.len(),
        });
    }
    Ok(DecodedImage {
        pixels: Cow::Borrowed(&texture.data[..expected]),
        ..image
    })
}

/// Loads textures through the cache onto a device.
pub struct TextureLoader<'a, D: RenderDevice + ?Sized> {
    device: &'a mut D,
    cache: &'a mut TextureCache,
}

impl<'a, D: RenderDevice + ?Sized> TextureLoader<'a, D> {
    pub fn new(device: &'a mut D, cache: &'a mut TextureCache) -> Self {
        Self { device, cache }
    }

    /// Returns the texture for `reference`, decoding and uploading it only when
    /// its canonical key is not cached yet.
    ///
    /// Pixels are decoded before any GPU object is created, so a failure never
    /// leaves a texture behind. Failures are logged and returned.
    pub fn load(
        &mut self,
        reference: &str,
        model_dir: &str,
        scene: Option<&ParsedScene>,
        model_path: &str,
    ) -> Result<TextureHandle, TextureError> {
        let key = canonical_key(reference, model_dir, model_path);
        if let Some(handle) = self.cache.lookup(&key) {
            log::debug!("Texture cache hit: {key} -> {handle}");
            return Ok(handle);
        }

        let image = match self.decode(reference, &key, scene) {
            Ok(image) => image,
            Err(e) => {
                log::error!("Failed to load texture {key}: {e}");
                return Err(e);
            }
        };

        let created = self.device.create_texture(&key, &image);
        let handle = self.store(&key, created);
        log::info!(
            "Loaded texture: {key} ({}x{}, {:?}) -> {handle}",
            image.width,
            image.height,
            image.format
        );
        Ok(handle)
    }

    /// Caches `handle` under `key`. If the key is taken, `handle` is deleted
    /// and the texture already cached is returned instead.
    fn store(&mut self, key: &str, handle: TextureHandle) -> TextureHandle {
        match self.cache.insert(key, handle) {
            Ok(()) => handle,
            Err(CacheError::DuplicateKey { handle, cached, .. }) => {
                self.device.delete_texture(handle);
                cached
            }
        }
    }

    fn decode<'s>(
        &self,
        reference: &str,
        key: &str,
        scene: Option<&'s ParsedScene>,
    ) -> Result<DecodedImage<'s>, TextureError> {
        if embedded_index(reference).is_none() {
            let image = decode_file(Path::new(key)).map_err(|source| TextureError::Decode {
                key: key.to_string(),
                source,
            })?;
            return to_pixels(image, key);
        }

        let scene = scene.ok_or_else(|| TextureError::MissingScene {
            reference: reference.to_string(),
        })?;
        let texture = scene.embedded_texture(reference).ok_or_else(|| {
            TextureError::InvalidEmbeddedIndex {
                reference: reference.to_string(),
            }
        })?;
        if !texture.is_compressed() {
            return borrow_raw(texture, reference);
        }
        let image = decode_memory(&texture.data, texture.format_hint.as_deref()).map_err(
            |source| TextureError::Decode {
                key: key.to_string(),
                source,
            },
        )?;
        to_pixels(image, key)
    }
}
