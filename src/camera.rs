//! Orbit camera, projection and the camera uniform.
//!
//! The camera circles a target point: scrolling changes the distance,
//! left-dragging changes yaw and pitch, middle-dragging moves the target.
//! Angles are kept in degrees.

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const ZOOM_SPEED: f32 = 0.25;
const PAN_SPEED: f32 = 0.005;
const ROTATE_SPEED: f32 = 0.1;
const MIN_RADIUS: f32 = 0.01;
const MAX_RADIUS: f32 = 100.0;
const PITCH_LIMIT: f32 = 89.0;
/// Pixels per scroll line for touchpads reporting pixel deltas.
const PIXELS_PER_LINE: f32 = 20.0;

/// What a mouse drag currently does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Drag {
    Rotate,
    Pan,
    /// Any other button: tracked but without effect.
    Idle,
}

impl From<MouseButton> for Drag {
    fn from(button: MouseButton) -> Self {
        match button {
            MouseButton::Left => Drag::Rotate,
            MouseButton::Middle => Drag::Pan,
            _ => Drag::Idle,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Orbit {
    radius: f32,
    yaw: f32,
    pitch: f32,
    target: Point3<f32>,
}

impl Default for Orbit {
    fn default() -> Self {
        Self {
            radius: 1.0,
            yaw: -90.0,
            pitch: 0.0,
            target: Point3::new(0.0, 0.0, 0.0),
        }
    }
}

#[derive(Debug)]
pub struct OrbitCamera {
    orbit: Orbit,
    initial: Orbit,
    drag: Option<Drag>,
    cursor: PhysicalPosition<f64>,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl OrbitCamera {
    pub fn new() -> Self {
        let orbit = Orbit::default();
        Self {
            orbit,
            initial: orbit,
            drag: None,
            cursor: PhysicalPosition::new(0.0, 0.0),
        }
    }

    pub fn radius(&self) -> f32 {
        self.orbit.radius
    }

    pub fn yaw(&self) -> f32 {
        self.orbit.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.orbit.pitch
    }

    pub fn target(&self) -> Point3<f32> {
        self.orbit.target
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Unit vector from the target towards the camera.
    fn direction(&self) -> Vector3<f32> {
        let (yaw, pitch) = (self.orbit.yaw.to_radians(), self.orbit.pitch.to_radians());
        Vector3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos())
    }

    pub fn position(&self) -> Point3<f32> {
        self.orbit.target + self.direction() * self.orbit.radius
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position(), self.orbit.target, Vector3::unit_y())
    }

    /// Positive `lines` move closer.
    pub fn zoom(&mut self, lines: f32) {
        self.orbit.radius = (self.orbit.radius - lines * ZOOM_SPEED).clamp(MIN_RADIUS, MAX_RADIUS);
    }

    pub fn begin_drag(&mut self, drag: Drag) {
        self.drag = Some(drag);
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Feeds a cursor position. Only has an effect while dragging.
    pub fn cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        let dx = (position.x - self.cursor.x) as f32;
        let dy = (position.y - self.cursor.y) as f32;
        self.cursor = position;
        match self.drag {
            Some(Drag::Rotate) => self.rotate(dx, dy),
            Some(Drag::Pan) => self.pan(dx, dy),
            Some(Drag::Idle) | None => {}
        }
    }

    fn rotate(&mut self, dx: f32, dy: f32) {
        self.orbit.yaw += dx * ROTATE_SPEED;
        self.orbit.pitch = (self.orbit.pitch - dy * ROTATE_SPEED).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Grab-style panning: the scene follows the cursor.
    fn pan(&mut self, dx: f32, dy: f32) {
        let front = self.direction().normalize();
        let right = front.cross(Vector3::unit_y()).normalize();
        let up = right.cross(front).normalize();
        let step = PAN_SPEED * self.orbit.radius;
        self.orbit.target -= right * dx * step;
        self.orbit.target += up * dy * step;
    }

    /// Restores the state the camera was constructed with.
    pub fn reset(&mut self) {
        self.orbit = self.initial;
    }

    /// Applies scroll, button and cursor events. Returns `true` when the event
    /// was used.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
                };
                self.zoom(lines);
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                match state {
                    ElementState::Pressed => self.begin_drag((*button).into()),
                    ElementState::Released => self.end_drag(),
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                let dragging = self.is_dragging();
                self.cursor_moved(*position);
                dragging
            }
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: aspect(width, height),
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = aspect(width, height);
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

fn aspect(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &OrbitCamera, projection: &Projection) {
        self.view_position = camera.position().to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.view_matrix()).into();
    }
}
