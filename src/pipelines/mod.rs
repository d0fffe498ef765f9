//! Render pipelines and their uniform resources.

pub mod basic;
pub mod scene;
