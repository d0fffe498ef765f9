use std::process::ExitCode;

use clap::Parser;
use mesh_viewer::{
    config::{Args, ViewerConfig},
    flow,
    headless::inspect_model,
    resources::scene::FileSceneParser,
};

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let config = ViewerConfig::default();

    match args.model {
        Some(path) if args.headless => {
            flow::init_logger();
            let report = inspect_model(&FileSceneParser, &path, config.default_color);
            if report.meshes.is_empty() {
                log::error!("No meshes imported from {}", path.display());
                return Ok(ExitCode::FAILURE);
            }
            println!(
                "{}: {} meshes, {} textures",
                path.display(),
                report.meshes.len(),
                report.unique_textures
            );
            for mesh in &report.meshes {
                println!("  {mesh}");
            }
            Ok(ExitCode::SUCCESS)
        }
        model => {
            flow::run(config, model)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
