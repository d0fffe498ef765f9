//! The rendering collaborator.
//!
//! Everything above this module talks to the GPU through [`RenderDevice`]
//! using small copyable handles instead of backend objects. This keeps the
//! loaders and the mesh resource free of any windowing or adapter state:
//!
//! - [`wgpu_device::WgpuDevice`] maps handles onto real wgpu objects
//! - [`recording::RecordingDevice`] keeps nothing but bookkeeping and is used
//!   for headless inspection and for tests
//!
//! Handles are never reused by a device. A handle value of `0` is never
//! produced, so an id can double as "no resource" in debug output.

pub mod recording;
pub mod wgpu_device;

use std::fmt;

use crate::data_structures::texture::DecodedImage;

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub(crate) fn new(id: u32) -> Self {
                debug_assert!(id != 0, "handle ids start at 1");
                Self(id)
            }

            /// The raw id, useful for logging.
            pub fn id(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

gpu_handle!(
    /// A 2D texture with a full mip chain living on the GPU.
    TextureHandle
);
gpu_handle!(
    /// A vertex or index buffer.
    BufferHandle
);
gpu_handle!(
    /// The attribute binding that ties a vertex buffer, an index buffer and a
    /// [`VertexLayout`] together (the analogue of a vertex-array object).
    VertexLayoutHandle
);
gpu_handle!(
    /// A linked shader program / render pipeline.
    ProgramHandle
);

/// Monotonic id source shared by the device implementations.
#[derive(Debug)]
pub(crate) struct HandleAllocator {
    next: u32,
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl HandleAllocator {
    pub(crate) fn next(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1).max(1);
        id
    }
}

/// Component type of a vertex attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeFormat {
    Float32x2,
    Float32x3,
}

impl AttributeFormat {
    pub fn components(self) -> u32 {
        match self {
            AttributeFormat::Float32x2 => 2,
            AttributeFormat::Float32x3 => 3,
        }
    }
}

/// One attribute inside an interleaved vertex record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: AttributeFormat,
    /// Offset in floats from the start of the record.
    pub offset: u32,
}

/// Description of an interleaved vertex record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    /// Stride in floats.
    pub stride: u32,
    pub attributes: &'static [VertexAttribute],
}

impl VertexLayout {
    pub fn stride_bytes(&self) -> u64 {
        self.stride as u64 * std::mem::size_of::<f32>() as u64
    }
}

/// GPU object creation, deletion and draw submission.
///
/// All calls must happen on the thread that owns the rendering context.
/// Creation is treated as infallible; deleting an unknown handle is a no-op
/// that the implementation may log.
pub trait RenderDevice {
    /// Upload `image` into a new 2D texture, generate its full mip chain and
    /// configure repeat wrapping with trilinear minification and linear
    /// magnification.
    fn create_texture(&mut self, label: &str, image: &DecodedImage<'_>) -> TextureHandle;
    fn delete_texture(&mut self, texture: TextureHandle);

    fn create_vertex_buffer(&mut self, label: &str, vertices: &[f32]) -> BufferHandle;
    fn create_index_buffer(&mut self, label: &str, indices: &[u32]) -> BufferHandle;
    fn delete_buffer(&mut self, buffer: BufferHandle);

    fn create_vertex_layout(
        &mut self,
        label: &str,
        layout: &VertexLayout,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
    ) -> VertexLayoutHandle;
    fn delete_vertex_layout(&mut self, layout: VertexLayoutHandle);

    fn use_program(&mut self, program: ProgramHandle);
    fn set_uniform_bool(&mut self, program: ProgramHandle, name: &str, value: bool);
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);
    /// Draw `index_count` indices of the bound layout as a triangle list.
    fn draw_indexed(&mut self, layout: VertexLayoutHandle, index_count: u32);
}
