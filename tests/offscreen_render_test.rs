#[cfg(feature = "integration-tests")]
mod common;

#[test]
#[cfg(feature = "integration-tests")]
fn renders_clear_colour_then_the_model() {
    use mesh_viewer::{
        camera::{CameraUniform, OrbitCamera, Projection},
        config::ViewerConfig,
        context::{mk_instance, request_device},
        render::{ModelRenderer, OffscreenTarget},
        resources::scene::FileSceneParser,
        viewer::ViewerState,
    };

    const SIZE: u32 = 64;

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let instance = mk_instance();
    let (_adapter, device, queue) = runtime
        .block_on(request_device(&instance, None))
        .expect("a GPU adapter is required for this test");

    let config = ViewerConfig::default();
    let target = OffscreenTarget::new(&device, SIZE, SIZE);
    let mut renderer = ModelRenderer::new(device, queue, OffscreenTarget::FORMAT, &config.light);

    let camera = OrbitCamera::new();
    let projection = Projection::new(SIZE, SIZE, cgmath::Deg(config.fovy_degrees), config.znear, config.zfar);
    let mut camera_uniform = CameraUniform::new();
    camera_uniform.update_view_proj(&camera, &projection);
    renderer.update_scene(&camera_uniform, 0.0);

    let mut viewer = ViewerState::new(&config);
    let frame = |renderer: &mut ModelRenderer, viewer: &ViewerState| {
        let encoder =
            renderer.encode_frame(viewer, target.color_view(), target.depth_view(), wgpu::Color::BLACK);
        runtime
            .block_on(target.read_back(renderer.gpu.device(), renderer.gpu.queue(), encoder))
            .unwrap()
    };

    let empty = frame(&mut renderer, &viewer);
    assert!(empty.pixels().all(|p| p.0 == [0, 0, 0, 255]));

    let dir = tempfile::tempdir().unwrap();
    let obj = common::write_plain_obj(dir.path(), "tri.obj");
    assert!(viewer.load_initial(&FileSceneParser, &mut renderer.gpu, &obj));
    let lit = frame(&mut renderer, &viewer);
    assert!(lit.pixels().any(|p| p.0[0] > 0));
    assert!(renderer.gpu.queued_draws().is_empty());

    viewer.shutdown(&mut renderer.gpu);
    assert_eq!(renderer.gpu.live_buffers(), 0);
    assert_eq!(renderer.gpu.live_textures(), 0);
}
