//! mesh-viewer
//!
//! An interactive 3D model viewer: drop an OBJ, glTF or GLB file on the
//! window and it is imported, uploaded and shown under an orbit camera.
//! Textures go through a process-wide cache keyed by a canonical path, so a
//! texture shared by several meshes or models is decoded and uploaded once.
//!
//! High-level modules
//! - `gpu`: the `RenderDevice` seam with a wgpu and a recording backend
//! - `data_structures`: vertex records, sub-mesh data, GPU meshes, model set
//! - `resources`: scene parsers, texture cache and loader, material resolver
//!   and the scene importer
//! - `camera`: orbit camera, projection and camera uniform
//! - `viewer`: model set, texture cache, pending drop and status of a session
//! - `config`: viewer defaults and command line arguments
//! - `context`, `pipelines`, `render`, `flow`: window, pipeline and event loop
//! - `headless`: import a model without a window and summarize it
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod gpu;
pub mod headless;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod viewer;

// Re-exports commonly used types for convenience in downstream code.
pub use config::{Args, ViewerConfig};
pub use flow::run;
pub use viewer::ViewerState;
