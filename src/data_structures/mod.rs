//! Data handed between the importer, the meshes and the GPU.

pub mod model;
pub mod texture;
