//! Platform interface & platform specific code

pub mod context;
pub mod window;

#[cfg(windows)]
mod windows;

use crate::ExitRequest;
use crate::os::window::{Window, WindowAttributes, WindowId};
use raw_window_handle::HasDisplayHandle;
use std::sync::Arc;

/// Generic access to platform specific functions.
/// Also requires [`raw_window_handle::HasDisplayHandle`] to be implemented.
pub trait Platform: HasDisplayHandle {
    /// Name of the running platform backend.
    fn name(&self) -> &'static str;

    fn create_window(
        &self,
        window_attributes: WindowAttributes,
        window_id: WindowId,
    ) -> anyhow::Result<Arc<dyn Window>>;

    /// Process OS events. Most operating systems require an explicit polling
    /// pass for windows to stay responsive; a queued quit event is recorded
    /// on [`OsLoopInputs::exit`] instead of being dispatched.
    fn process_events(&self, inputs: &OsLoopInputs);
}

pub fn new_platform() -> anyhow::Result<Arc<dyn Platform>> {
    #[cfg(windows)]
    {
        let platform: Arc<dyn Platform> = Arc::new(windows::WindowsPlatform::new()?);
        Ok(platform)
    }

    #[cfg(not(windows))]
    {
        anyhow::bail!("no windowing backend for this platform")
    }
}

/// State the event pump reports into while draining the queue.
pub struct OsLoopInputs {
    pub exit: Arc<ExitRequest>,
}
