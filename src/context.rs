//! Window-bound GPU context: surface, depth buffer, camera and renderer.

use std::{iter, sync::Arc};

use anyhow::Context as _;
use winit::window::Window;

use crate::{
    camera::{CameraUniform, OrbitCamera, Projection},
    config::ViewerConfig,
    data_structures::texture::DepthTexture,
    render::ModelRenderer,
    viewer::ViewerState,
};

/// Picks an adapter (compatible with `surface` when given) and opens a device
/// on it.
pub async fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
) -> anyhow::Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .context("no suitable GPU adapter")?;
    log::info!("Using adapter {}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Viewer Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            ..Default::default()
        })
        .await
        .context("failed to open the GPU device")?;
    Ok((adapter, device, queue))
}

pub fn mk_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    })
}

pub struct Context {
    pub window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
    pub depth_texture: DepthTexture,
    pub renderer: ModelRenderer,
    pub camera: OrbitCamera,
    pub camera_uniform: CameraUniform,
    pub projection: Projection,
    pub clear_colour: wgpu::Color,
    is_surface_configured: bool,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer_config: &ViewerConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::debug!("WGPU setup");
        let instance = mk_instance();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create the window surface")?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface)).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colour and relies on an sRGB target.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface supports no formats")?;
        let present_mode = surface_caps
            .present_modes
            .first()
            .copied()
            .unwrap_or(wgpu::PresentMode::Fifo);
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        let is_surface_configured = size.width > 0 && size.height > 0;
        if is_surface_configured {
            surface.configure(&device, &config);
        }

        let depth_texture =
            DepthTexture::new(&device, [config.width, config.height], "depth_texture");
        let projection = Projection::new(
            config.width,
            config.height,
            cgmath::Deg(viewer_config.fovy_degrees),
            viewer_config.znear,
            viewer_config.zfar,
        );
        let camera = OrbitCamera::new();
        let mut camera_uniform = CameraUniform::new();
        camera_uniform.update_view_proj(&camera, &projection);

        let renderer = ModelRenderer::new(device, queue, surface_format, &viewer_config.light);

        Ok(Self {
            window,
            surface,
            config,
            depth_texture,
            renderer,
            camera,
            camera_uniform,
            projection,
            clear_colour: viewer_config.clear_colour,
            is_surface_configured,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.is_surface_configured = true;
            self.projection.resize(width, height);
            let device = self.renderer.gpu.device();
            self.surface.configure(device, &self.config);
            self.depth_texture = DepthTexture::new(device, [width, height], "depth_texture");
        }
    }

    /// Pushes the camera and the model rotation `angle` (radians about +Y)
    /// to the GPU.
    pub fn update_scene(&mut self, angle: f32) {
        self.camera_uniform
            .update_view_proj(&self.camera, &self.projection);
        self.renderer.update_scene(&self.camera_uniform, angle);
    }

    /// Draws `viewer` into the next surface texture and presents it.
    pub fn render(&mut self, viewer: &ViewerState) -> Result<(), wgpu::SurfaceError> {
        self.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self.renderer.encode_frame(
            viewer,
            &view,
            &self.depth_texture.view,
            self.clear_colour,
        );
        self.renderer
            .gpu
            .queue()
            .submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
