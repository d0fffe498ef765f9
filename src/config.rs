//! Viewer settings and command line arguments.
//!
//! There is no configuration file; every value has a built-in default.

use std::path::PathBuf;

use clap::Parser;

/// Point light used by the model shader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightConfig {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub ambient_strength: f32,
    pub specular_strength: f32,
    pub shininess: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: [3.0, 3.0, 3.0],
            color: [1.0, 1.0, 1.0],
            ambient_strength: 0.15,
            specular_strength: 0.6,
            shininess: 64.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub clear_colour: wgpu::Color,
    /// Vertex colour for meshes without a colour set.
    pub default_color: [f32; 3],
    pub light: LightConfig,
    /// Radians per second.
    pub rotation_speed: f32,
    pub fovy_degrees: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Model Viewer".to_string(),
            width: 800,
            height: 600,
            clear_colour: wgpu::Color {
                r: 0.2,
                g: 0.25,
                b: 0.3,
                a: 1.0,
            },
            default_color: [0.8, 0.8, 0.8],
            light: LightConfig::default(),
            rotation_speed: 0.5,
            fovy_degrees: 45.0,
            znear: 0.1,
            zfar: 100.0,
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Model to open at startup (.obj, .gltf or .glb).
    #[arg(value_name = "MODEL")]
    pub model: Option<PathBuf>,

    /// Import MODEL without opening a window, print what was loaded and exit.
    #[arg(long, requires = "model")]
    pub headless: bool,
}
