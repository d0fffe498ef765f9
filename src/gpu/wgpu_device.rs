//! [`RenderDevice`] on top of wgpu.
//!
//! Handles map onto wgpu objects kept in per-kind tables. Draw calls issued
//! through the trait are queued as [`DrawCommand`]s and replayed into a render
//! pass by [`WgpuDevice::replay`], since wgpu records work per pass rather than
//! through global bind state.

use std::collections::HashMap;

use image::{DynamicImage, GrayImage, RgbaImage, imageops::FilterType};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        model::{DIFFUSE_TEXTURE_UNIT, HAS_DIFFUSE_UNIFORM},
        texture::{DecodedImage, PixelFormat},
    },
    gpu::{
        BufferHandle, HandleAllocator, ProgramHandle, RenderDevice, TextureHandle, VertexLayout,
        VertexLayoutHandle,
    },
};

#[derive(Debug)]
struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

#[derive(Debug, Clone, Copy)]
struct LayoutBinding {
    vertex: BufferHandle,
    index: BufferHandle,
}

/// One queued indexed draw with the state that was bound when it was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    pub program: ProgramHandle,
    pub layout: VertexLayoutHandle,
    pub index_count: u32,
    pub texture: Option<TextureHandle>,
    pub has_diffuse: bool,
}

type MaterialKey = (Option<TextureHandle>, bool);

#[derive(Debug)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    ids: HandleAllocator,
    textures: HashMap<TextureHandle, GpuTexture>,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    layouts: HashMap<VertexLayoutHandle, LayoutBinding>,
    programs: HashMap<ProgramHandle, wgpu::RenderPipeline>,
    material_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    fallback: GpuTexture,
    /// `has_diffuse_texture` as a uniform, one buffer per value.
    flag_buffers: [wgpu::Buffer; 2],
    material_groups: HashMap<MaterialKey, wgpu::BindGroup>,
    current_program: Option<ProgramHandle>,
    bound_texture: Option<TextureHandle>,
    has_diffuse: bool,
    frame: Vec<DrawCommand>,
}

/// Bind group layout of group 0: diffuse texture, its sampler and the
/// `has_diffuse_texture` flag.
pub fn material_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

/// Shrinks `width` x `height` so neither side exceeds `max`, keeping the
/// aspect ratio. Sizes within the limit come back unchanged.
fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let largest = width.max(height);
    if max == 0 || largest <= max {
        return (width, height);
    }
    let scale = |side: u32| ((u64::from(side) * u64::from(max)) / u64::from(largest)).max(1) as u32;
    (scale(width), scale(height))
}

/// Builds the full mip chain of `image`, level 0 first, as wgpu-ready bytes.
/// RGB data is widened to RGBA since wgpu has no 24-bit formats. Images larger
/// than `max_dimension` are downscaled first.
fn mip_chain(
    image: &DecodedImage<'_>,
    max_dimension: u32,
) -> Option<(wgpu::TextureFormat, Vec<(u32, u32, Vec<u8>)>)> {
    let (width, height) = (image.width.max(1), image.height.max(1));
    let (format, mut base) = match image.format {
        PixelFormat::R8 => (
            wgpu::TextureFormat::R8Unorm,
            DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, image.pixels.to_vec())?),
        ),
        PixelFormat::Rgb8 => (
            wgpu::TextureFormat::Rgba8UnormSrgb,
            DynamicImage::ImageRgb8(image::RgbImage::from_raw(
                width,
                height,
                image.pixels.to_vec(),
            )?)
            .into_rgba8()
            .into(),
        ),
        PixelFormat::Rgba8 => (
            wgpu::TextureFormat::Rgba8UnormSrgb,
            DynamicImage::ImageRgba8(RgbaImage::from_raw(width, height, image.pixels.to_vec())?),
        ),
    };

    let (fit_width, fit_height) = fit_within(width, height, max_dimension);
    if (fit_width, fit_height) != (width, height) {
        log::warn!(
            "Texture of {width}x{height} exceeds the device limit of {max_dimension}, downscaling to {fit_width}x{fit_height}"
        );
        base = base.resize_exact(fit_width, fit_height, FilterType::Triangle);
    }
    let (width, height) = (fit_width, fit_height);
    let level_count = 32 - width.max(height).leading_zeros();

    let levels = (0..level_count)
        .map(|level| {
            let w = (width >> level).max(1);
            let h = (height >> level).max(1);
            let bytes = if level == 0 {
                base.as_bytes().to_vec()
            } else {
                base.resize_exact(w, h, FilterType::Triangle)
                    .as_bytes()
                    .to_vec()
            };
            (w, h, bytes)
        })
        .collect();
    Some((format, levels))
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let material_layout = material_bind_group_layout(&device);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Model Texture Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });
        let flag_buffers = [0u32, 1u32].map(|flag| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(HAS_DIFFUSE_UNIFORM),
                contents: bytemuck::cast_slice(&[flag, 0, 0, 0]),
                usage: wgpu::BufferUsages::UNIFORM,
            })
        });
        let fallback = upload(
            &device,
            &queue,
            "fallback white texture",
            wgpu::TextureFormat::Rgba8UnormSrgb,
            &[(1, 1, vec![255; 4])],
        );

        Self {
            device,
            queue,
            ids: HandleAllocator::default(),
            textures: HashMap::new(),
            buffers: HashMap::new(),
            layouts: HashMap::new(),
            programs: HashMap::new(),
            material_layout,
            sampler,
            fallback,
            flag_buffers,
            material_groups: HashMap::new(),
            current_program: None,
            bound_texture: None,
            has_diffuse: false,
            frame: Vec::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Layout pipelines must use for bind group 0.
    pub fn material_layout(&self) -> &wgpu::BindGroupLayout {
        &self.material_layout
    }

    /// Hands a compiled pipeline to the device and returns its program handle.
    pub fn register_program(&mut self, pipeline: wgpu::RenderPipeline) -> ProgramHandle {
        let program = ProgramHandle::new(self.ids.next());
        self.programs.insert(program, pipeline);
        program
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Draws queued since the last replay.
    pub fn queued_draws(&self) -> &[DrawCommand] {
        &self.frame
    }

    /// Records every queued draw into `pass` and clears the queue. Bind group 1
    /// (scene uniforms) must already be set by the caller.
    pub fn replay(&mut self, pass: &mut wgpu::RenderPass<'_>) {
        let frame = std::mem::take(&mut self.frame);
        for command in &frame {
            let Some(pipeline) = self.programs.get(&command.program) else {
                log::warn!("WgpuDevice: draw with unknown program {}", command.program);
                continue;
            };
            let Some(binding) = self.layouts.get(&command.layout) else {
                log::warn!("WgpuDevice: draw with unknown vertex layout {}", command.layout);
                continue;
            };
            let (Some(vertex), Some(index)) =
                (self.buffers.get(&binding.vertex), self.buffers.get(&binding.index))
            else {
                log::warn!("WgpuDevice: vertex layout {} lost its buffers", command.layout);
                continue;
            };
            let Some(material) = self
                .material_groups
                .get(&(command.texture, command.has_diffuse))
            else {
                continue;
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, material, &[]);
            pass.set_vertex_buffer(0, vertex.slice(..));
            pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..command.index_count, 0, 0..1);
        }
    }

    fn ensure_material_group(&mut self, key: MaterialKey) {
        if self.material_groups.contains_key(&key) {
            return;
        }
        let view = key
            .0
            .and_then(|texture| self.textures.get(&texture))
            .map_or(&self.fallback.view, |texture| &texture.view);
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.flag_buffers[key.1 as usize].as_entire_binding(),
                },
            ],
            label: Some("material_bind_group"),
        });
        self.material_groups.insert(key, group);
    }
}

fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    format: wgpu::TextureFormat,
    levels: &[(u32, u32, Vec<u8>)],
) -> GpuTexture {
    let (width, height) = levels.first().map_or((1, 1), |&(w, h, _)| (w, h));
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: levels.len().max(1) as u32,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let bytes_per_pixel = format.block_copy_size(None).unwrap_or(4);
    for (level, (w, h, bytes)) in levels.iter().enumerate() {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: level as u32,
                origin: wgpu::Origin3d::ZERO,
            },
            bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_pixel * w),
                rows_per_image: Some(*h),
            },
            wgpu::Extent3d {
                width: *w,
                height: *h,
                depth_or_array_layers: 1,
            },
        );
    }
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { texture, view }
}

impl RenderDevice for WgpuDevice {
    fn create_texture(&mut self, label: &str, image: &DecodedImage<'_>) -> TextureHandle {
        let handle = TextureHandle::new(self.ids.next());
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        let texture = match mip_chain(image, max_dimension) {
            Some((format, levels)) => upload(&self.device, &self.queue, label, format, &levels),
            None => {
                // Creation is infallible at this level; callers validate sizes
                // before uploading. Keep the handle usable with a white texel.
                log::error!(
                    "WgpuDevice: pixel data of '{label}' does not match {}x{} {:?}",
                    image.width,
                    image.height,
                    image.format
                );
                upload(
                    &self.device,
                    &self.queue,
                    label,
                    wgpu::TextureFormat::Rgba8UnormSrgb,
                    &[(1, 1, vec![255; 4])],
                )
            }
        };
        self.textures.insert(handle, texture);
        handle
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        match self.textures.remove(&texture) {
            Some(entry) => {
                entry.texture.destroy();
                self.material_groups.retain(|(bound, _), _| *bound != Some(texture));
                log::debug!("WgpuDevice: destroyed texture {texture}");
            }
            None => log::warn!("WgpuDevice: delete of unknown texture {texture}"),
        }
    }

    fn create_vertex_buffer(&mut self, label: &str, vertices: &[f32]) -> BufferHandle {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let handle = BufferHandle::new(self.ids.next());
        self.buffers.insert(handle, buffer);
        handle
    }

    fn create_index_buffer(&mut self, label: &str, indices: &[u32]) -> BufferHandle {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let handle = BufferHandle::new(self.ids.next());
        self.buffers.insert(handle, buffer);
        handle
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.remove(&buffer) {
            Some(entry) => {
                entry.destroy();
                log::debug!("WgpuDevice: destroyed buffer {buffer}");
            }
            None => log::warn!("WgpuDevice: delete of unknown buffer {buffer}"),
        }
    }

    fn create_vertex_layout(
        &mut self,
        _label: &str,
        layout: &VertexLayout,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
    ) -> VertexLayoutHandle {
        // The attribute wiring itself lives in the pipeline's vertex state.
        debug_assert_eq!(
            layout.stride_bytes(),
            std::mem::size_of::<crate::data_structures::model::ModelVertex>() as u64
        );
        let handle = VertexLayoutHandle::new(self.ids.next());
        self.layouts.insert(
            handle,
            LayoutBinding {
                vertex: vertex_buffer,
                index: index_buffer,
            },
        );
        handle
    }

    fn delete_vertex_layout(&mut self, layout: VertexLayoutHandle) {
        if self.layouts.remove(&layout).is_none() {
            log::warn!("WgpuDevice: delete of unknown vertex layout {layout}");
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
    }

    fn set_uniform_bool(&mut self, _program: ProgramHandle, name: &str, value: bool) {
        if name == HAS_DIFFUSE_UNIFORM {
            self.has_diffuse = value;
        } else {
            log::warn!("WgpuDevice: unknown uniform '{name}'");
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        if unit != DIFFUSE_TEXTURE_UNIT {
            log::warn!("WgpuDevice: texture unit {unit} is not wired to the shader");
            return;
        }
        self.bound_texture = Some(texture);
    }

    fn draw_indexed(&mut self, layout: VertexLayoutHandle, index_count: u32) {
        let Some(program) = self.current_program else {
            log::warn!("WgpuDevice: draw without a program");
            return;
        };
        let texture = self.bound_texture.filter(|_| self.has_diffuse);
        self.ensure_material_group((texture, self.has_diffuse));
        self.frame.push(DrawCommand {
            program,
            layout,
            index_count,
            texture,
            has_diffuse: self.has_diffuse,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[test]
    fn oversized_textures_shrink_to_the_limit() {
        assert_eq!(fit_within(512, 256, 1024), (512, 256));
        assert_eq!(fit_within(4096, 1024, 2048), (2048, 512));
        assert_eq!(fit_within(1, 9000, 100), (1, 100));
        assert_eq!(fit_within(3, 3, 0), (3, 3));
    }

    #[test]
    fn mip_chain_starts_at_the_downscaled_size() {
        let image = DecodedImage {
            width: 8,
            height: 4,
            format: PixelFormat::Rgb8,
            pixels: Cow::Owned(vec![200; 8 * 4 * 3]),
        };
        let (format, levels) = mip_chain(&image, 4).unwrap();
        assert_eq!(format, wgpu::TextureFormat::Rgba8UnormSrgb);
        let sizes: Vec<(u32, u32)> = levels.iter().map(|(w, h, _)| (*w, *h)).collect();
        assert_eq!(sizes, vec![(4, 2), (2, 1), (1, 1)]);
        assert_eq!(levels[0].2.len(), 4 * 2 * 4);
    }

    #[test]
    fn short_pixel_data_has_no_mip_chain() {
        let image = DecodedImage {
            width: 2,
            height: 2,
            format: PixelFormat::Rgba8,
            pixels: Cow::Owned(vec![0; 15]),
        };
        assert!(mip_chain(&image, 16).is_none());
    }
}
