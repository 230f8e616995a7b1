//! Renderer seam driven by the frame loop.

pub mod vulkan;

/// Per-frame hook, invoked once per message-loop pass. An error stops the
/// loop immediately.
pub trait Renderer {
    fn draw_frame(&mut self) -> anyhow::Result<()>;
}
