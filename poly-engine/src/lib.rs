//! # PolyEngine
//!
//! Window shell engine: platform windowing, rendering-context negotiation,
//! and the frame loop driving presentation.

pub mod os;
pub mod render;

#[cfg(windows)]
pub extern crate windows;

use crate::os::window::{Window, WindowAttributes, WindowId, WindowManager};
use crate::os::{OsLoopInputs, Platform, new_platform};
use crate::render::Renderer;
use log::{debug, info};
use std::cell::Cell;
use std::sync::{Arc, Weak};

/// Records a request to leave the frame loop together with the process exit
/// code supplied by the platform's quit event. The first request wins.
#[derive(Default)]
pub struct ExitRequest(Cell<Option<i32>>);

impl ExitRequest {
    pub fn request(&self, code: i32) {
        if self.0.get().is_none() {
            self.0.set(Some(code));
        }
    }

    pub fn requested(&self) -> Option<i32> {
        self.0.get()
    }
}

pub struct Engine {
    platform: Arc<dyn Platform>,
    window_manager: Arc<WindowManager>,
    exit: Arc<ExitRequest>,
}

impl Engine {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::with_platform(new_platform()?))
    }

    /// Builds an engine over an explicit platform backend.
    pub fn with_platform(platform: Arc<dyn Platform>) -> Self {
        info!("platform: {}", platform.name());
        Self {
            platform,
            window_manager: Arc::new(WindowManager::new()),
            exit: Arc::new(ExitRequest::default()),
        }
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn window_manager(&self) -> &Arc<WindowManager> {
        &self.window_manager
    }

    pub fn create_window(
        &self,
        window_attributes: WindowAttributes,
    ) -> anyhow::Result<(WindowId, Weak<dyn Window>)> {
        self.window_manager
            .create_window(window_attributes, &self.platform)
    }

    /// Drives the shell until a quit is posted or presentation fails.
    ///
    /// Every pass drains the event queue without blocking, presents each
    /// live window once (whether or not the queue had anything in it), and
    /// invokes the renderer hook. A recorded quit ends the loop after that
    /// pass's presentation, mirroring the drain-present-check order of the
    /// underlying message pump; the posted exit code is returned.
    pub fn run(&self, renderer: &mut dyn Renderer) -> anyhow::Result<i32> {
        let inputs = OsLoopInputs {
            exit: self.exit.clone(),
        };

        loop {
            self.platform.process_events(&inputs);

            self.window_manager.present_all()?;
            renderer.draw_frame()?;

            if let Some(code) = self.exit.requested() {
                debug!("exit requested (code {code})");
                return Ok(code);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    };
    use std::cell::Cell;
    use std::rc::Rc;

    struct MockWindow {
        id: WindowId,
        presents: Rc<Cell<u32>>,
        fail_present: bool,
    }

    impl HasWindowHandle for MockWindow {
        fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
            Err(HandleError::Unavailable)
        }
    }

    impl Window for MockWindow {
        fn id(&self) -> WindowId {
            self.id
        }

        fn present(&self) -> anyhow::Result<()> {
            self.presents.set(self.presents.get() + 1);
            if self.fail_present {
                return Err(anyhow!("present failed"));
            }
            Ok(())
        }
    }

    /// Platform whose queue is always empty; it requests an exit once enough
    /// passes have run.
    struct MockPlatform {
        passes: Cell<u32>,
        quit_after: u32,
        exit_code: i32,
        presents: Rc<Cell<u32>>,
        fail_present: bool,
    }

    impl MockPlatform {
        fn new(quit_after: u32, exit_code: i32) -> Self {
            Self {
                passes: Cell::new(0),
                quit_after,
                exit_code,
                presents: Rc::new(Cell::new(0)),
                fail_present: false,
            }
        }
    }

    impl HasDisplayHandle for MockPlatform {
        fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
            Err(HandleError::Unavailable)
        }
    }

    impl Platform for MockPlatform {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn create_window(
            &self,
            _window_attributes: WindowAttributes,
            window_id: WindowId,
        ) -> anyhow::Result<Arc<dyn Window>> {
            Ok(Arc::new(MockWindow {
                id: window_id,
                presents: self.presents.clone(),
                fail_present: self.fail_present,
            }))
        }

        fn process_events(&self, inputs: &OsLoopInputs) {
            let pass = self.passes.get() + 1;
            self.passes.set(pass);
            if pass >= self.quit_after {
                inputs.exit.request(self.exit_code);
            }
        }
    }

    struct CountingRenderer {
        frames: u32,
    }

    impl Renderer for CountingRenderer {
        fn draw_frame(&mut self) -> anyhow::Result<()> {
            self.frames += 1;
            Ok(())
        }
    }

    #[test]
    fn test_run_returns_posted_exit_code() {
        let engine = Engine::with_platform(Arc::new(MockPlatform::new(1, 17)));
        let mut renderer = CountingRenderer { frames: 0 };

        let code = engine.run(&mut renderer).unwrap();
        assert_eq!(code, 17);
    }

    #[test]
    fn test_presents_once_per_pass_even_with_empty_queue() {
        let platform = Arc::new(MockPlatform::new(3, 0));
        let presents = platform.presents.clone();
        let engine = Engine::with_platform(platform);

        engine.create_window(WindowAttributes::default()).unwrap();

        let mut renderer = CountingRenderer { frames: 0 };
        engine.run(&mut renderer).unwrap();

        // The queue was empty on all three passes; presentation and the
        // renderer hook still ran exactly once per pass, including the
        // pass that saw the quit.
        assert_eq!(presents.get(), 3);
        assert_eq!(renderer.frames, 3);
    }

    #[test]
    fn test_run_stops_when_presentation_fails() {
        let mut platform = MockPlatform::new(u32::MAX, 0);
        platform.fail_present = true;
        let platform = Arc::new(platform);
        let presents = platform.presents.clone();
        let engine = Engine::with_platform(platform);

        engine.create_window(WindowAttributes::default()).unwrap();

        let mut renderer = CountingRenderer { frames: 0 };
        assert!(engine.run(&mut renderer).is_err());
        assert_eq!(presents.get(), 1);
        assert_eq!(renderer.frames, 0);
    }

    #[test]
    fn test_run_stops_when_renderer_fails() {
        struct FailingRenderer;
        impl Renderer for FailingRenderer {
            fn draw_frame(&mut self) -> anyhow::Result<()> {
                Err(anyhow!("device lost"))
            }
        }

        let engine = Engine::with_platform(Arc::new(MockPlatform::new(u32::MAX, 0)));
        assert!(engine.run(&mut FailingRenderer).is_err());
    }

    #[test]
    fn test_exit_request_first_wins() {
        let exit = ExitRequest::default();
        assert_eq!(exit.requested(), None);
        exit.request(3);
        exit.request(9);
        assert_eq!(exit.requested(), Some(3));
    }
}
