//! Texture data as it travels between the decoder and the GPU.
//!
//! [`DecodedImage`] holds pixels either owned by the decoder or borrowed from
//! an imported scene, [`TextureDescriptor`] is what a mesh keeps to refer to a
//! cached texture, and [`DepthTexture`] is the render target used for depth
//! testing.

use std::borrow::Cow;
use std::fmt;

use crate::gpu::TextureHandle;

/// Channel layout of 8-bit pixel data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Single channel, sampled as red.
    R8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    /// Maps a decoder component count onto a format. Only 1, 3 and 4 channels
    /// are supported.
    pub fn from_components(components: u8) -> Option<Self> {
        match components {
            1 => Some(PixelFormat::R8),
            3 => Some(PixelFormat::Rgb8),
            4 => Some(PixelFormat::Rgba8),
            _ => None,
        }
    }

    pub fn components(self) -> usize {
        match self {
            PixelFormat::R8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Pixel data ready for upload.
///
/// `pixels` is `Cow::Owned` when a decoder produced the buffer and
/// `Cow::Borrowed` when it points straight into an imported scene's raw
/// embedded texture. Only the owned variant is freed when the image drops.
#[derive(Clone, PartialEq)]
pub struct DecodedImage<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Cow<'a, [u8]>,
}

impl<'a> DecodedImage<'a> {
    pub fn is_borrowed(&self) -> bool {
        matches!(self.pixels, Cow::Borrowed(_))
    }

    /// Expected byte length for the dimensions and format.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.components()
    }

    /// Number of levels in a full mip chain down to 1x1.
    pub fn mip_level_count(&self) -> u32 {
        let largest = self.width.max(self.height).max(1);
        32 - largest.leading_zeros()
    }
}

impl fmt::Debug for DecodedImage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.pixels.len())
            .field("borrowed", &self.is_borrowed())
            .finish()
    }
}

/// The part a texture plays in a material.
///
/// Only `Diffuse` is produced today: PBR base colour maps are tagged diffuse
/// too since the shader has no notion of PBR roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureRole {
    Diffuse,
}

/// A mesh's reference to a cached texture.
///
/// The texture is owned by the cache; dropping or releasing a descriptor never
/// frees GPU memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub handle: TextureHandle,
    pub role: TextureRole,
    pub key: String,
}

/// A depth buffer the size of the surface.
#[derive(Debug)]
pub struct DepthTexture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl DepthTexture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a depth texture suitable as a `RENDER_ATTACHMENT`.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels, clamped to at least 1
    /// * `label` is used as a debug label for the GPU resource
    pub fn new(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}
