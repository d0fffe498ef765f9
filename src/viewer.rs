//! Viewer state shared by the event loop and the renderer.
//!
//! All of it lives on the thread owning the GPU context: the model set, the
//! texture cache, the single pending-drop slot, the auto-rotation flag and the
//! status line shown in the window title.

use std::path::{Path, PathBuf};

use crate::{
    config::ViewerConfig,
    data_structures::model::ModelSet,
    gpu::{ProgramHandle, RenderDevice},
    resources::{load_model, scene::SceneParser, texture::TextureCache},
};

pub const INITIAL_STATUS: &str = "Drag & drop a model file to load.";
const LOADED_PREFIX: &str = "Loaded: ";

/// Holds at most one dropped path until the next frame picks it up. A newer
/// drop replaces an unconsumed one.
#[derive(Debug, Default)]
pub struct PendingDrop {
    path: Option<PathBuf>,
}

impl PendingDrop {
    pub fn push(&mut self, path: PathBuf) {
        if let Some(previous) = self.path.replace(path) {
            log::debug!("Discarding unprocessed drop {}", previous.display());
        }
    }

    /// Queues the first path of a multi-file drop and ignores the rest.
    pub fn offer<I: IntoIterator<Item = PathBuf>>(&mut self, paths: I) {
        let mut paths = paths.into_iter();
        if let Some(first) = paths.next() {
            let ignored = paths.count();
            if ignored > 0 {
                log::info!("Ignoring {ignored} additional dropped files");
            }
            self.push(first);
        }
    }

    pub fn take(&mut self) -> Option<PathBuf> {
        self.path.take()
    }

    pub fn is_pending(&self) -> bool {
        self.path.is_some()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug)]
pub struct ViewerState {
    pub models: ModelSet,
    pub textures: TextureCache,
    pub pending: PendingDrop,
    status: String,
    auto_rotate: bool,
    rotation_angle: f32,
    rotation_speed: f32,
    default_color: [f32; 3],
}

impl ViewerState {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            models: ModelSet::new(),
            textures: TextureCache::new(),
            pending: PendingDrop::default(),
            status: INITIAL_STATUS.to_string(),
            auto_rotate: true,
            rotation_angle: 0.0,
            rotation_speed: config.rotation_speed,
            default_color: config.default_color,
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn auto_rotate(&self) -> bool {
        self.auto_rotate
    }

    /// Flips auto-rotation and returns the new state.
    pub fn toggle_auto_rotate(&mut self) -> bool {
        self.auto_rotate = !self.auto_rotate;
        self.auto_rotate
    }

    /// Current rotation about +Y in radians.
    pub fn rotation_angle(&self) -> f32 {
        self.rotation_angle
    }

    /// Advances the rotation by `dt` seconds while a model is shown and
    /// auto-rotation is on.
    pub fn advance(&mut self, dt: f32) {
        if self.auto_rotate && !self.models.is_empty() {
            self.rotation_angle += self.rotation_speed * dt;
        }
    }

    pub fn window_title(&self, base: &str) -> String {
        if self.models.is_empty() {
            return format!("{base} - {}", self.status);
        }
        let mut title = base.to_string();
        if let Some(name) = self.status.strip_prefix(LOADED_PREFIX) {
            title.push_str(" - ");
            title.push_str(name);
        }
        if !self.auto_rotate {
            title.push_str(" (Paused)");
        }
        title
    }

    /// Loads the model given on the command line. On failure the model set
    /// stays empty.
    pub fn load_initial<P, D>(&mut self, parser: &P, device: &mut D, path: &Path) -> bool
    where
        P: SceneParser + ?Sized,
        D: RenderDevice + ?Sized,
    {
        log::info!("Attempting to load model from command line: {}", path.display());
        let meshes = load_model(parser, device, &mut self.textures, path, self.default_color);
        if meshes.is_empty() {
            self.status = format!("Error loading initial: {}. Drag & drop.", file_name(path));
            log::error!("{}", self.status);
            return false;
        }
        log::info!(
            "Successfully loaded initial model: {} ({} meshes)",
            path.display(),
            meshes.len()
        );
        self.models.replace(device, meshes);
        self.status = format!("{LOADED_PREFIX}{}", file_name(path));
        true
    }

    /// Loads the pending drop, if any. Success replaces the model set, failure
    /// clears it; either way the status names the dropped file. Returns
    /// whether a drop was processed.
    pub fn process_pending_drop<P, D>(&mut self, parser: &P, device: &mut D) -> bool
    where
        P: SceneParser + ?Sized,
        D: RenderDevice + ?Sized,
    {
        let Some(path) = self.pending.take() else {
            return false;
        };
        log::info!("Processing dropped file: {}", path.display());
        let meshes = load_model(parser, device, &mut self.textures, &path, self.default_color);
        if meshes.is_empty() {
            self.models.clear(device);
            self.status = format!("Error loading: {}. Drag & drop.", file_name(&path));
            log::error!("Failed to load model from dropped file: {}", path.display());
        } else {
            log::info!(
                "Successfully loaded model from: {} ({} meshes)",
                path.display(),
                meshes.len()
            );
            self.models.replace(device, meshes);
            self.status = format!("{LOADED_PREFIX}{}", file_name(&path));
        }
        true
    }

    pub fn draw<D: RenderDevice + ?Sized>(&self, device: &mut D, program: ProgramHandle) {
        self.models.draw(device, program);
    }

    /// Releases the meshes, then every cached texture. Must run before the
    /// device goes away.
    pub fn shutdown<D: RenderDevice + ?Sized>(&mut self, device: &mut D) {
        self.models.clear(device);
        self.textures.release_all(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gpu::recording::RecordingDevice,
        resources::scene::{ParseError, ParsedMesh, ParsedScene, PostProcessSteps},
    };

    /// Succeeds for paths ending in `.ok`, fails otherwise.
    struct SuffixParser;

    impl SceneParser for SuffixParser {
        fn read_file(&self, path: &Path, _: PostProcessSteps) -> Result<ParsedScene, ParseError> {
            if path.extension().is_some_and(|ext| ext == "ok") {
                Ok(ParsedScene {
                    meshes: vec![ParsedMesh {
                        positions: vec![[0.0; 3]; 3],
                        faces: vec![vec![0, 1, 2]],
                        ..Default::default()
                    }],
                    has_root_node: true,
                    ..Default::default()
                })
            } else {
                Err(ParseError::Format("nope".into()))
            }
        }
    }

    fn state() -> ViewerState {
        ViewerState::new(&ViewerConfig::default())
    }

    #[test]
    fn later_drops_replace_earlier_ones() {
        let mut pending = PendingDrop::default();
        pending.push("a.obj".into());
        pending.push("b.obj".into());
        assert_eq!(pending.take(), Some(PathBuf::from("b.obj")));
        assert!(!pending.is_pending());
    }

    #[test]
    fn batches_honour_their_first_path() {
        let mut pending = PendingDrop::default();
        pending.offer(vec![PathBuf::from("a.obj"), PathBuf::from("b.obj")]);
        assert_eq!(pending.take(), Some(PathBuf::from("a.obj")));
        pending.offer(Vec::new());
        assert!(pending.take().is_none());
    }

    #[test]
    fn title_follows_status_and_rotation() {
        let mut device = RecordingDevice::new();
        let mut viewer = state();
        assert_eq!(
            viewer.window_title("Model Viewer"),
            "Model Viewer - Drag & drop a model file to load."
        );

        viewer.pending.push("dir/cube.ok".into());
        assert!(viewer.process_pending_drop(&SuffixParser, &mut device));
        assert_eq!(viewer.window_title("Model Viewer"), "Model Viewer - cube.ok");
        viewer.toggle_auto_rotate();
        assert_eq!(viewer.window_title("Model Viewer"), "Model Viewer - cube.ok (Paused)");

        viewer.shutdown(&mut device);
    }

    #[test]
    fn failed_drop_clears_the_model_set() {
        let mut device = RecordingDevice::new();
        let mut viewer = state();
        assert!(viewer.load_initial(&SuffixParser, &mut device, Path::new("cube.ok")));
        assert_eq!(viewer.models.len(), 1);

        viewer.pending.push("broken.obj".into());
        viewer.process_pending_drop(&SuffixParser, &mut device);
        assert!(viewer.models.is_empty());
        assert_eq!(viewer.status(), "Error loading: broken.obj. Drag & drop.");
        assert!(device.is_clean());
        assert!(!viewer.process_pending_drop(&SuffixParser, &mut device));
    }

    #[test]
    fn failed_initial_load_keeps_an_empty_set() {
        let mut device = RecordingDevice::new();
        let mut viewer = state();
        assert!(!viewer.load_initial(&SuffixParser, &mut device, Path::new("/m/broken.obj")));
        assert!(viewer.models.is_empty());
        assert_eq!(viewer.status(), "Error loading initial: broken.obj. Drag & drop.");
    }

    #[test]
    fn rotation_advances_only_when_enabled_and_loaded() {
        let mut device = RecordingDevice::new();
        let mut viewer = state();
        viewer.advance(1.0);
        assert_eq!(viewer.rotation_angle(), 0.0);

        viewer.load_initial(&SuffixParser, &mut device, Path::new("cube.ok"));
        viewer.advance(2.0);
        assert!((viewer.rotation_angle() - 1.0).abs() < 1e-6);
        assert!(!viewer.toggle_auto_rotate());
        viewer.advance(2.0);
        assert!((viewer.rotation_angle() - 1.0).abs() < 1e-6);
        viewer.shutdown(&mut device);
    }

    #[test]
    fn reload_and_shutdown_release_everything() {
        let mut device = RecordingDevice::new();
        let mut viewer = state();
        viewer.load_initial(&SuffixParser, &mut device, Path::new("cube.ok"));
        viewer.pending.push("cube.ok".into());
        viewer.process_pending_drop(&SuffixParser, &mut device);
        assert_eq!(device.live_buffers(), 2);
        assert_eq!(device.deleted_buffers().len(), 2);

        viewer.shutdown(&mut device);
        assert!(device.is_clean());
        assert!(viewer.textures.is_empty());
    }
}
