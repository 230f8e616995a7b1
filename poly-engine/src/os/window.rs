//! Platform generic windows

use crate::os::Platform;
use crate::os::context::{SurfaceConfig, SwapInterval};
use cgmath::Vector2;
use hashbrown::HashMap;
use raw_window_handle::HasWindowHandle;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/// Generic access to a window.
/// Also requires [`raw_window_handle::HasWindowHandle`] to be implemented.
pub trait Window: HasWindowHandle {
    fn id(&self) -> WindowId;

    /// Present the back buffer. A window without a rendering context treats
    /// this as a no-op.
    fn present(&self) -> anyhow::Result<()>;
}

/// Graphics acquired for a window at creation time.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GraphicsRequest {
    /// Plain window, no rendering context.
    #[default]
    None,
    /// Negotiate an OpenGL surface configuration and rendering context.
    OpenGl(ContextOptions),
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ContextOptions {
    pub config: SurfaceConfig,
    pub swap: SwapInterval,
}

/// Set of attributes that control how a window is created.
pub struct WindowAttributes {
    /// Window title (defaults to `"Window"`)
    pub title: String,

    /// Size of the window (default is platform-dependent)
    pub size: Option<Vector2<i32>>,

    /// Position of the window (default is platform-dependent)
    pub position: Option<Vector2<i32>>,

    /// Rendering context negotiated while the window is created. Creation
    /// fails as a whole if the negotiation fails.
    pub graphics: GraphicsRequest,
}

impl Default for WindowAttributes {
    fn default() -> Self {
        Self {
            title: "Window".to_string(),
            size: None,
            position: None,
            graphics: GraphicsRequest::None,
        }
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
#[repr(transparent)]
pub struct WindowId(u32);

/// Owns every live window, keyed by identity. Dropping a window's entry is
/// what triggers its teardown, so removal order is the teardown order.
pub struct WindowManager {
    window_id_counter: AtomicU32,
    windows: RefCell<HashMap<WindowId, Arc<dyn Window>>>, // interior mutability
}

impl WindowManager {
    pub fn new() -> Self {
        Self {
            window_id_counter: AtomicU32::new(0),
            windows: RefCell::new(HashMap::new()),
        }
    }

    pub fn create_window(
        &self,
        window_attributes: WindowAttributes,
        platform: &Arc<dyn Platform>,
    ) -> anyhow::Result<(WindowId, Weak<dyn Window>)> {
        let id = WindowId(self.window_id_counter.fetch_add(1, Ordering::SeqCst));

        let window = platform.create_window(window_attributes, id)?;

        let weakref = Arc::downgrade(&window);
        self.windows.borrow_mut().insert(id, window);

        Ok((id, weakref))
    }

    /// Drops the window, running its teardown unless outside references keep
    /// it alive. Returns whether the id was known.
    pub fn close_window(&self, id: WindowId) -> bool {
        self.windows.borrow_mut().remove(&id).is_some()
    }

    pub fn get_window(&self, id: WindowId) -> Option<Arc<dyn Window>> {
        self.windows.borrow().get(&id).cloned()
    }

    pub fn window_count(&self) -> usize {
        self.windows.borrow().len()
    }

    /// Present every live window once, stopping at the first failure.
    pub fn present_all(&self) -> anyhow::Result<()> {
        for window in self.windows.borrow().values() {
            window.present()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::OsLoopInputs;
    use raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    };
    use std::cell::Cell;
    use std::rc::Rc;

    struct MockWindow {
        id: WindowId,
        presents: Rc<Cell<u32>>,
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
            Ok(())
        }
    }

    struct MockPlatform {
        presents: Rc<Cell<u32>>,
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
            }))
        }

        fn process_events(&self, _inputs: &OsLoopInputs) {}
    }

    fn mock_platform() -> (Arc<dyn Platform>, Rc<Cell<u32>>) {
        let presents = Rc::new(Cell::new(0));
        let platform: Arc<dyn Platform> = Arc::new(MockPlatform {
            presents: presents.clone(),
        });
        (platform, presents)
    }

    #[test]
    fn test_create_window_assigns_unique_ids() {
        let (platform, _) = mock_platform();
        let manager = WindowManager::new();

        let (a, _) = manager
            .create_window(WindowAttributes::default(), &platform)
            .unwrap();
        let (b, _) = manager
            .create_window(WindowAttributes::default(), &platform)
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(manager.window_count(), 2);
        assert_eq!(manager.get_window(a).unwrap().id(), a);
        assert_eq!(manager.get_window(b).unwrap().id(), b);
    }

    #[test]
    fn test_close_window_drops_the_window() {
        let (platform, _) = mock_platform();
        let manager = WindowManager::new();

        let (id, weak) = manager
            .create_window(WindowAttributes::default(), &platform)
            .unwrap();

        assert!(manager.close_window(id));
        assert!(weak.upgrade().is_none());
        assert_eq!(manager.window_count(), 0);
        assert!(manager.get_window(id).is_none());
        assert!(!manager.close_window(id));
    }

    #[test]
    fn test_present_all_hits_every_window() {
        let (platform, presents) = mock_platform();
        let manager = WindowManager::new();

        for _ in 0..3 {
            manager
                .create_window(WindowAttributes::default(), &platform)
                .unwrap();
        }

        manager.present_all().unwrap();
        assert_eq!(presents.get(), 3);
    }

    #[test]
    fn test_default_attributes() {
        let attributes = WindowAttributes::default();
        assert_eq!(attributes.title, "Window");
        assert!(attributes.size.is_none());
        assert!(attributes.position.is_none());
        assert_eq!(attributes.graphics, GraphicsRequest::None);
    }
}
