//! Frame encoding for the model pipeline.
//!
//! [`ModelRenderer`] owns everything needed to draw the viewer that does not
//! depend on a window: the [`WgpuDevice`], the registered model program and the
//! scene uniforms. A frame is the model set's draw calls, queued through the
//! [`RenderDevice`](crate::gpu::RenderDevice) trait and replayed into one
//! render pass that clears colour and depth.

use crate::{
    camera::CameraUniform,
    config::LightConfig,
    gpu::{ProgramHandle, wgpu_device::WgpuDevice},
    pipelines::{basic::mk_model_pipeline, scene::SceneResources},
    viewer::ViewerState,
};

pub struct ModelRenderer {
    pub gpu: WgpuDevice,
    pub program: ProgramHandle,
    pub scene: SceneResources,
}

impl ModelRenderer {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        light: &LightConfig,
    ) -> Self {
        let mut gpu = WgpuDevice::new(device, queue);
        let scene = SceneResources::new(gpu.device(), light);
        let pipeline = mk_model_pipeline(
            gpu.device(),
            color_format,
            gpu.material_layout(),
            &scene.bind_group_layout,
        );
        let program = gpu.register_program(pipeline);
        Self {
            gpu,
            program,
            scene,
        }
    }

    /// Writes camera matrices and the model rotation for the next frame.
    pub fn update_scene(&mut self, camera: &CameraUniform, angle: f32) {
        self.scene.uniform.update(camera, angle);
        self.scene.write(self.gpu.queue());
    }

    /// Records one frame of `viewer` into a new encoder. The caller submits
    /// it, possibly after appending copies.
    pub fn encode_frame(
        &mut self,
        viewer: &ViewerState,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        clear_colour: wgpu::Color,
    ) -> wgpu::CommandEncoder {
        viewer.draw(&mut self.gpu, self.program);

        let mut encoder =
            self.gpu
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Render Encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            render_pass.set_bind_group(1, &self.scene.bind_group, &[]);
            self.gpu.replay(&mut render_pass);
        }
        encoder
    }
}

#[cfg(feature = "integration-tests")]
pub use offscreen::OffscreenTarget;

#[cfg(feature = "integration-tests")]
mod offscreen {
    use std::{iter, time::Duration};

    use anyhow::Context as _;

    use crate::data_structures::texture::DepthTexture;

    /// Colour and depth targets that are read back instead of presented.
    pub struct OffscreenTarget {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
        depth: DepthTexture,
        width: u32,
        height: u32,
    }

    impl OffscreenTarget {
        pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

        pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Offscreen Output Texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: Self::FORMAT,
                usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let depth = DepthTexture::new(device, [width, height], "offscreen_depth_texture");
            Self {
                texture,
                view,
                depth,
                width,
                height,
            }
        }

        pub fn color_view(&self) -> &wgpu::TextureView {
            &self.view
        }

        pub fn depth_view(&self) -> &wgpu::TextureView {
            &self.depth.view
        }

        /// Appends a copy of the colour target to `encoder`, submits it and
        /// waits for the pixels.
        pub async fn read_back(
            &self,
            device: &wgpu::Device,
            queue: &wgpu::Queue,
            mut encoder: wgpu::CommandEncoder,
        ) -> anyhow::Result<image::RgbaImage> {
            let unpadded = 4 * self.width;
            let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
            let padded = unpadded.div_ceil(align) * align;
            let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                size: (padded * self.height) as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                label: Some("Offscreen Readback Buffer"),
                mapped_at_creation: false,
            });
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &self.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &output_buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(padded),
                        rows_per_image: Some(self.height),
                    },
                },
                wgpu::Extent3d {
                    width: self.width,
                    height: self.height,
                    depth_or_array_layers: 1,
                },
            );
            queue.submit(iter::once(encoder.finish()));

            let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
            let buffer_slice = output_buffer.slice(..);
            buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
            device
                .poll(wgpu::PollType::Wait {
                    submission_index: None,
                    timeout: Some(Duration::from_secs(3)),
                })
                .context("waiting for the readback copy")?;
            rx.receive()
                .await
                .context("readback callback was dropped")?
                .context("mapping the readback buffer")?;

            let pixels = {
                let data = buffer_slice.get_mapped_range();
                data.chunks(padded as usize)
                    .flat_map(|row| &row[..unpadded as usize])
                    .copied()
                    .collect::<Vec<u8>>()
            };
            output_buffer.unmap();
            image::RgbaImage::from_raw(self.width, self.height, pixels)
                .context("readback size does not match the target")
        }
    }
}
