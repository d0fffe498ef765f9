//! Application event loop.
//!
//! [`run`] opens the window and drives the viewer with winit. Every frame:
//! 1. Load the pending dropped file, if any
//! 2. Update the window title
//! 3. Advance the auto-rotation
//! 4. Upload camera and model matrices, then draw and present
//!
//! Input is handled as events arrive: the orbit camera takes mouse events,
//! dropped files go to the pending slot, and ESC, Space and R are the
//! keyboard commands. On exit the meshes and textures are released before the
//! GPU context is dropped.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use instant::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    config::ViewerConfig, context::Context, resources::scene::FileSceneParser,
    viewer::ViewerState,
};

/// Keyboard commands of the viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Close,
    ToggleRotation,
    ResetCamera,
}

/// Maps a pressed key to its command. Space reacts to the initial press only,
/// R also to key repeat.
pub fn key_action(code: KeyCode, repeat: bool) -> Option<KeyAction> {
    match code {
        KeyCode::Escape => Some(KeyAction::Close),
        KeyCode::Space if !repeat => Some(KeyAction::ToggleRotation),
        KeyCode::KeyR => Some(KeyAction::ResetCamera),
        _ => None,
    }
}

pub(crate) struct AppState {
    pub(crate) ctx: Context,
    viewer: ViewerState,
}

impl AppState {
    async fn new(
        window: Arc<Window>,
        config: &ViewerConfig,
    ) -> anyhow::Result<Self> {
        let ctx = Context::new(window, config)
            .await
            .context("App initialization failed. Cannot create the main context")?;
        Ok(Self {
            ctx,
            viewer: ViewerState::new(config),
        })
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed {
            return;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        match key_action(code, event.repeat) {
            Some(KeyAction::Close) => {
                log::info!("Escape pressed, closing window");
                event_loop.exit();
            }
            Some(KeyAction::ToggleRotation) => {
                let enabled = self.viewer.toggle_auto_rotate();
                log::info!("Auto-rotation {}", if enabled { "enabled" } else { "disabled" });
            }
            Some(KeyAction::ResetCamera) => {
                self.ctx.camera.reset();
                log::info!("Camera reset");
            }
            None => {}
        }
    }

    /// Releases meshes first, then cached textures, while the device is
    /// still alive.
    fn shutdown(&mut self) {
        log::info!("Cleaning up resources");
        self.viewer.shutdown(&mut self.ctx.renderer.gpu);
    }
}

pub struct App {
    async_runtime: tokio::runtime::Runtime,
    config: ViewerConfig,
    initial_model: Option<PathBuf>,
    parser: FileSceneParser,
    state: Option<AppState>,
    title: String,
    last_time: Instant,
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: ViewerConfig, initial_model: Option<PathBuf>) -> anyhow::Result<Self> {
        let async_runtime =
            tokio::runtime::Runtime::new().context("failed to start the async runtime")?;
        Ok(Self {
            async_runtime,
            title: config.title.clone(),
            config,
            initial_model,
            parser: FileSceneParser,
            state: None,
            last_time: Instant::now(),
            error: None,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }

    fn redraw(&mut self) {
        let Some(state) = &mut self.state else {
            return;
        };
        let dt = self.last_time.elapsed();
        self.last_time = Instant::now();

        state
            .viewer
            .process_pending_drop(&self.parser, &mut state.ctx.renderer.gpu);

        let title = state.viewer.window_title(&self.config.title);
        if title != self.title {
            state.ctx.window.set_title(&title);
            self.title = title;
        }

        state.viewer.advance(dt.as_secs_f32());
        state.ctx.update_scene(state.viewer.rotation_angle());

        match state.ctx.render(&state.viewer) {
            Ok(()) => {}
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = state.ctx.window.inner_size();
                state.ctx.resize(size.width, size.height);
            }
            Err(e) => {
                log::error!("Unable to render {}", e);
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("failed to create the window"));
                return;
            }
        };

        let mut app_state = match self
            .async_runtime
            .block_on(AppState::new(window, &self.config))
        {
            Ok(app_state) => app_state,
            Err(e) => {
                self.fail(event_loop, e);
                return;
            }
        };

        if let Some(path) = self.initial_model.take() {
            app_state
                .viewer
                .load_initial(&self.parser, &mut app_state.ctx.renderer.gpu, &path);
        }
        app_state.ctx.window.request_redraw();
        self.last_time = Instant::now();
        self.state = Some(app_state);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        state.ctx.camera.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.ctx.resize(size.width, size.height),
            WindowEvent::DroppedFile(path) => {
                log::info!("File dropped: {}", path.display());
                state.viewer.pending.push(path);
            }
            WindowEvent::KeyboardInput { event, .. } => state.handle_key(event_loop, &event),
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            state.shutdown();
        }
    }
}

/// Initialises `env_logger` with an `info` default unless `RUST_LOG` is set.
pub fn init_logger() {
    let env = env_logger::Env::default().default_filter_or("info");
    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    }
}

/// Opens the viewer window and blocks until it is closed. `initial_model` is
/// loaded once the GPU context exists.
pub fn run(config: ViewerConfig, initial_model: Option<PathBuf>) -> anyhow::Result<()> {
    init_logger();

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, initial_model)?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
