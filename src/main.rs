use anyhow::Result;
use log::info;
use poly_engine::Engine;
use poly_engine::os::window::{ContextOptions, GraphicsRequest, WindowAttributes};
use poly_engine::render::vulkan::VulkanRenderer;

fn main() -> Result<()> {
    env_logger::init();

    let engine = Engine::new()?;

    let (window_id, _window) = engine.create_window(WindowAttributes {
        title: "Polychrome".to_string(),
        graphics: GraphicsRequest::OpenGl(ContextOptions::default()),
        ..Default::default()
    })?;
    info!("window_id: {:?}", window_id);

    let mut renderer = VulkanRenderer::new()?;

    let exit_code = engine.run(&mut renderer)?;

    // Tear down in reverse of construction before leaving the process.
    drop(renderer);
    drop(engine);

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
