//! Meshes as they move from the importer onto the GPU.
//!
//! - [`SubMeshData`] is the transient CPU-side output of the importer
//! - [`GpuMesh`] exclusively owns the buffers of one sub-mesh
//! - [`ModelSet`] is the ordered collection the renderer draws every frame
//!
//! GPU memory is released explicitly through a [`RenderDevice`]: the device is
//! not reachable from `Drop`, and releasing has to happen while the context
//! is still alive.

use crate::{
    data_structures::texture::{TextureDescriptor, TextureRole},
    gpu::{
        AttributeFormat, BufferHandle, ProgramHandle, RenderDevice, VertexAttribute,
        VertexLayout, VertexLayoutHandle,
    },
};

/// Floats per interleaved vertex record: position(3) normal(3) colour(3) uv(2).
pub const FLOATS_PER_VERTEX: usize = 11;

/// Uniform telling the shader whether texture unit 0 holds a diffuse map.
pub const HAS_DIFFUSE_UNIFORM: &str = "has_diffuse_texture";

/// Texture unit the diffuse map is bound to.
pub const DIFFUSE_TEXTURE_UNIT: u32 = 0;

const MODEL_VERTEX_ATTRIBUTES: [VertexAttribute; 4] = [
    VertexAttribute {
        location: 0,
        format: AttributeFormat::Float32x3,
        offset: 0,
    },
    VertexAttribute {
        location: 1,
        format: AttributeFormat::Float32x3,
        offset: 3,
    },
    VertexAttribute {
        location: 2,
        format: AttributeFormat::Float32x3,
        offset: 6,
    },
    VertexAttribute {
        location: 3,
        format: AttributeFormat::Float32x2,
        offset: 9,
    },
];

/// The binary contract between the importer and the model pipeline.
pub const MODEL_VERTEX_LAYOUT: VertexLayout = VertexLayout {
    stride: FLOATS_PER_VERTEX as u32,
    attributes: &MODEL_VERTEX_ATTRIBUTES,
};

/// Typed view of one interleaved record. Only used to build and inspect the
/// flat buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl ModelVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 9]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// CPU-side geometry of one sub-mesh, consumed by [`GpuMesh::new`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubMeshData {
    pub name: String,
    /// `FLOATS_PER_VERTEX` floats per vertex.
    pub vertices: Vec<f32>,
    /// Triangle list.
    pub indices: Vec<u32>,
    pub textures: Vec<TextureDescriptor>,
}

impl SubMeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / FLOATS_PER_VERTEX
    }

    /// Reinterprets the flat buffer as records.
    pub fn records(&self) -> &[ModelVertex] {
        bytemuck::cast_slice(&self.vertices[..self.vertex_count() * FLOATS_PER_VERTEX])
    }
}

/// The three objects a valid mesh owns. Held behind one `Option` so a mesh can
/// never be half constructed.
#[derive(Debug, PartialEq, Eq)]
struct MeshBuffers {
    vertex: BufferHandle,
    index: BufferHandle,
    layout: VertexLayoutHandle,
}

/// GPU resources of one sub-mesh.
///
/// Either fully valid (all buffers present, `index_count > 0`) or empty.
/// Not `Clone`: two values owning the same handles would release them twice.
/// [`GpuMesh::take`] moves the buffers out and leaves the source empty.
#[derive(Debug, Default)]
pub struct GpuMesh {
    pub name: String,
    buffers: Option<MeshBuffers>,
    index_count: u32,
    textures: Vec<TextureDescriptor>,
}

impl GpuMesh {
    /// Uploads `data`. Empty geometry produces an empty mesh and allocates
    /// nothing.
    pub fn new<D: RenderDevice + ?Sized>(device: &mut D, data: SubMeshData) -> Self {
        let SubMeshData {
            name,
            vertices,
            indices,
            textures,
        } = data;
        if indices.is_empty() || vertices.is_empty() {
            return Self {
                name,
                buffers: None,
                index_count: 0,
                textures,
            };
        }

        let vertex = device.create_vertex_buffer(&format!("{name} Vertex Buffer"), &vertices);
        let index = device.create_index_buffer(&format!("{name} Index Buffer"), &indices);
        let layout = device.create_vertex_layout(
            &format!("{name} Vertex Layout"),
            &MODEL_VERTEX_LAYOUT,
            vertex,
            index,
        );

        Self {
            name,
            buffers: Some(MeshBuffers {
                vertex,
                index,
                layout,
            }),
            index_count: indices.len() as u32,
            textures,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_none()
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn textures(&self) -> &[TextureDescriptor] {
        &self.textures
    }

    /// The texture `draw` binds: the first one tagged diffuse.
    pub fn diffuse_texture(&self) -> Option<&TextureDescriptor> {
        self.textures
            .iter()
            .find(|texture| texture.role == TextureRole::Diffuse)
    }

    /// Moves everything out of `self`, leaving it empty.
    pub fn take(&mut self) -> GpuMesh {
        std::mem::take(self)
    }

    /// Binds the diffuse texture (if any), tells the shader about it and
    /// issues an indexed triangle draw. Empty meshes draw nothing.
    pub fn draw<D: RenderDevice + ?Sized>(&self, device: &mut D, program: ProgramHandle) {
        let Some(buffers) = &self.buffers else {
            return;
        };
        if self.index_count == 0 {
            return;
        }

        let diffuse = self.diffuse_texture();
        if let Some(texture) = diffuse {
            device.bind_texture(DIFFUSE_TEXTURE_UNIT, texture.handle);
        }
        device.use_program(program);
        device.set_uniform_bool(program, HAS_DIFFUSE_UNIFORM, diffuse.is_some());
        device.draw_indexed(buffers.layout, self.index_count);
    }

    /// Deletes the owned buffers and leaves the mesh empty. Calling it again
    /// is a no-op. Texture descriptors are dropped without touching the
    /// textures themselves.
    pub fn release<D: RenderDevice + ?Sized>(&mut self, device: &mut D) {
        if let Some(buffers) = self.buffers.take() {
            device.delete_buffer(buffers.index);
            device.delete_buffer(buffers.vertex);
            device.delete_vertex_layout(buffers.layout);
        }
        self.index_count = 0;
        self.textures.clear();
    }
}

impl Drop for GpuMesh {
    fn drop(&mut self) {
        if self.buffers.is_some() {
            log::warn!(
                "GPU mesh '{}' dropped without being released; its buffers leak until the device goes away",
                self.name
            );
        }
    }
}

/// The meshes currently shown, in importer order.
///
/// Only ever replaced as a whole: `replace` swaps in a complete set and
/// releases the old one, `clear` releases everything.
#[derive(Debug, Default)]
pub struct ModelSet {
    meshes: Vec<GpuMesh>,
}

impl ModelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn meshes(&self) -> &[GpuMesh] {
        &self.meshes
    }

    /// Installs `meshes` and releases the previous set.
    pub fn replace<D: RenderDevice + ?Sized>(&mut self, device: &mut D, meshes: Vec<GpuMesh>) {
        let mut old = std::mem::replace(&mut self.meshes, meshes);
        old.iter_mut().for_each(|mesh| mesh.release(device));
    }

    pub fn clear<D: RenderDevice + ?Sized>(&mut self, device: &mut D) {
        self.replace(device, Vec::new());
    }

    pub fn draw<D: RenderDevice + ?Sized>(&self, device: &mut D, program: ProgramHandle) {
        self.meshes
            .iter()
            .for_each(|mesh| mesh.draw(device, program));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_record_matches_layout() {
        assert_eq!(
            std::mem::size_of::<ModelVertex>(),
            FLOATS_PER_VERTEX * std::mem::size_of::<f32>()
        );
        let attrs = MODEL_VERTEX_LAYOUT.attributes;
        let widths: u32 = attrs.iter().map(|a| a.format.components()).sum();
        assert_eq!(widths, MODEL_VERTEX_LAYOUT.stride);
        let locations: Vec<u32> = attrs.iter().map(|a| a.location).collect();
        assert_eq!(locations, vec![0, 1, 2, 3]);
        let desc = ModelVertex::desc();
        for (wgpu_attr, attr) in desc.attributes.iter().zip(attrs) {
            assert_eq!(wgpu_attr.offset, attr.offset as u64 * 4);
            assert_eq!(wgpu_attr.shader_location, attr.location);
        }
    }

    #[test]
    fn records_view_the_flat_buffer() {
        let data = SubMeshData {
            vertices: (0..22).map(|f| f as f32).collect(),
            ..Default::default()
        };
        let records = data.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].position, [11.0, 12.0, 13.0]);
        assert_eq!(records[1].tex_coords, [20.0, 21.0]);
    }
}
