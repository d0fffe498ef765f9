//! A device that keeps bookkeeping instead of GPU objects.
//!
//! Used by `--headless` inspection and by the test-suite to observe exactly
//! which objects get created, deleted and drawn.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    data_structures::texture::{DecodedImage, PixelFormat},
    gpu::{
        BufferHandle, HandleAllocator, ProgramHandle, RenderDevice, TextureHandle, VertexLayout,
        VertexLayoutHandle,
    },
};

/// A texture upload as seen by the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedTexture {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub mip_levels: u32,
}

/// State captured at an indexed draw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedDraw {
    pub program: Option<ProgramHandle>,
    pub layout: VertexLayoutHandle,
    pub index_count: u32,
    pub bound_texture: Option<TextureHandle>,
    pub has_diffuse: Option<bool>,
}

/// Every call counted, every live object tracked.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    ids: HandleAllocator,
    textures: BTreeMap<TextureHandle, RecordedTexture>,
    buffers: BTreeSet<BufferHandle>,
    layouts: BTreeMap<VertexLayoutHandle, (BufferHandle, BufferHandle)>,
    deleted_textures: Vec<TextureHandle>,
    deleted_buffers: Vec<BufferHandle>,
    deleted_layouts: Vec<VertexLayoutHandle>,
    programs: BTreeSet<ProgramHandle>,
    current_program: Option<ProgramHandle>,
    bound_texture: Option<TextureHandle>,
    uniforms: BTreeMap<String, bool>,
    draws: Vec<RecordedDraw>,
    texture_uploads: usize,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out a program handle standing in for a compiled shader.
    pub fn create_program(&mut self) -> ProgramHandle {
        let program = ProgramHandle::new(self.ids.next());
        self.programs.insert(program);
        program
    }

    /// Number of textures ever uploaded, including deleted ones.
    pub fn texture_uploads(&self) -> usize {
        self.texture_uploads
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&RecordedTexture> {
        self.textures.get(&handle)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_layouts(&self) -> usize {
        self.layouts.len()
    }

    /// `true` once every created object has been deleted.
    pub fn is_clean(&self) -> bool {
        self.textures.is_empty() && self.buffers.is_empty() && self.layouts.is_empty()
    }

    pub fn deleted_textures(&self) -> &[TextureHandle] {
        &self.deleted_textures
    }

    pub fn deleted_buffers(&self) -> &[BufferHandle] {
        &self.deleted_buffers
    }

    pub fn deleted_layouts(&self) -> &[VertexLayoutHandle] {
        &self.deleted_layouts
    }

    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }
}

impl RenderDevice for RecordingDevice {
    fn create_texture(&mut self, label: &str, image: &DecodedImage<'_>) -> TextureHandle {
        let handle = TextureHandle::new(self.ids.next());
        self.texture_uploads += 1;
        self.textures.insert(
            handle,
            RecordedTexture {
                label: label.to_string(),
                width: image.width,
                height: image.height,
                format: image.format,
                mip_levels: image.mip_level_count(),
            },
        );
        handle
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.deleted_textures.push(texture);
        } else {
            log::warn!("RecordingDevice: delete of unknown texture {texture}");
        }
    }

    fn create_vertex_buffer(&mut self, _label: &str, _vertices: &[f32]) -> BufferHandle {
        let handle = BufferHandle::new(self.ids.next());
        self.buffers.insert(handle);
        handle
    }

    fn create_index_buffer(&mut self, _label: &str, _indices: &[u32]) -> BufferHandle {
        let handle = BufferHandle::new(self.ids.next());
        self.buffers.insert(handle);
        handle
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer) {
            self.deleted_buffers.push(buffer);
        } else {
            log::warn!("RecordingDevice: delete of unknown buffer {buffer}");
        }
    }

    fn create_vertex_layout(
        &mut self,
        _label: &str,
        _layout: &VertexLayout,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
    ) -> VertexLayoutHandle {
        let handle = VertexLayoutHandle::new(self.ids.next());
        self.layouts.insert(handle, (vertex_buffer, index_buffer));
        handle
    }

    fn delete_vertex_layout(&mut self, layout: VertexLayoutHandle) {
        if self.layouts.remove(&layout).is_some() {
            self.deleted_layouts.push(layout);
        } else {
            log::warn!("RecordingDevice: delete of unknown vertex layout {layout}");
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
    }

    fn set_uniform_bool(&mut self, _program: ProgramHandle, name: &str, value: bool) {
        self.uniforms.insert(name.to_string(), value);
    }

    fn bind_texture(&mut self, _unit: u32, texture: TextureHandle) {
        self.bound_texture = Some(texture);
    }

    fn draw_indexed(&mut self, layout: VertexLayoutHandle, index_count: u32) {
        self.draws.push(RecordedDraw {
            program: self.current_program,
            layout,
            index_count,
            bound_texture: self.bound_texture,
            has_diffuse: self
                .uniforms
                .get(crate::data_structures::model::HAS_DIFFUSE_UNIFORM)
                .copied(),
        });
    }
}
