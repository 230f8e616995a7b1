use crate::os::context::ContextError;
use crate::os::window::{ContextOptions, GraphicsRequest, Window, WindowAttributes, WindowId};
use crate::os::windows::wgl::{self, DcGuard, GlResources, WglCapabilities};
use crate::os::windows::{WINDOW_CLASS_NAME, WindowsPlatform};
use anyhow::Context as _;
use log::{debug, warn};
use raw_window_handle::{
    HandleError, HasWindowHandle, RawWindowHandle, Win32WindowHandle, WindowHandle,
};
use std::cell::RefCell;
use std::ffi::c_void;
use std::num::NonZeroIsize;
use std::rc::Rc;
use widestring::U16CString;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::OpenGL::SwapBuffers;
use windows::Win32::UI::WindowsAndMessaging::{
    CW_USEDEFAULT, CreateWindowExW, DestroyWindow, GWLP_USERDATA, HMENU, SW_NORMAL,
    SetWindowLongPtrW, ShowWindow, WS_EX_APPWINDOW, WS_EX_OVERLAPPEDWINDOW, WS_OVERLAPPEDWINDOW,
};
use windows::core::PCWSTR;

/// Shared between a [`WindowsWindow`] and the window procedure through the
/// `GWLP_USERDATA` slot, so the destroy transition can release the rendering
/// resources no matter which side runs first.
pub(super) struct WindowRef {
    pub(super) window_id: WindowId,
    pub(super) graphics: Rc<RefCell<Option<GlResources>>>,
}

pub(super) struct WindowsWindow {
    handle: HWND,
    id: WindowId,
    graphics: Rc<RefCell<Option<GlResources>>>,
    /// Owned storage behind the `GWLP_USERDATA` pointer. Must stay alive
    /// until `DestroyWindow` has run.
    _reference_block: Box<WindowRef>,
}

impl WindowsWindow {
    pub(super) fn new(
        platform: &WindowsPlatform,
        window_attributes: WindowAttributes,
        id: WindowId,
    ) -> anyhow::Result<Self> {
        let title =
            U16CString::from_str(&window_attributes.title).context("window title contains NUL")?;

        let graphics = Rc::new(RefCell::new(None));
        let reference_block = Box::new(WindowRef {
            window_id: id,
            graphics: graphics.clone(),
        });

        let (x, y) = window_attributes
            .position
            .map_or((CW_USEDEFAULT, CW_USEDEFAULT), |p| (p.x, p.y));
        let (width, height) = window_attributes
            .size
            .map_or((CW_USEDEFAULT, CW_USEDEFAULT), |s| (s.x, s.y));

        let handle = unsafe {
            CreateWindowExW(
                WS_EX_APPWINDOW | WS_EX_OVERLAPPEDWINDOW,
                WINDOW_CLASS_NAME,
                PCWSTR(title.as_ptr()),
                WS_OVERLAPPEDWINDOW,
                x,
                y,
                width,
                height,
                HWND::default(),
                HMENU::default(),
                platform.hinstance(),
                Some((&*reference_block as *const WindowRef) as *const c_void),
            )
            .context("window creation failed")?
        };

        let window = Self {
            handle,
            id,
            graphics,
            _reference_block: reference_block,
        };

        // Failure past this point drops `window`, which unwinds whatever was
        // acquired in reverse order and destroys the native window, so the
        // caller never sees a half-built one.
        if let GraphicsRequest::OpenGl(options) = window_attributes.graphics {
            window.acquire_graphics(platform.wgl(), &options)?;
        }

        unsafe {
            _ = ShowWindow(handle, SW_NORMAL);
        }

        Ok(window)
    }

    /// Surface, pixel format, context, make-current, swap interval, in that
    /// order. Each step aborts the whole acquisition on failure.
    fn acquire_graphics(
        &self,
        caps: &WglCapabilities,
        options: &ContextOptions,
    ) -> Result<(), ContextError> {
        let surface = DcGuard::acquire(self.handle)?;
        wgl::apply_pixel_format(caps, surface.hdc(), &options.config)?;

        let context = wgl::create_context(caps, surface.hdc(), None)?;
        wgl::make_current(surface.hdc(), &context)?;

        wgl::apply_swap_interval(caps, options.swap);

        *self.graphics.borrow_mut() = Some(GlResources { context, surface });
        Ok(())
    }
}

impl Drop for WindowsWindow {
    fn drop(&mut self) {
        // The reference block outlives DestroyWindow, but the procedure must
        // not run teardown a second time once this side has started it.
        unsafe {
            SetWindowLongPtrW(self.handle, GWLP_USERDATA, 0);
        }

        // Context first, then the surface, then the window itself.
        drop(self.graphics.borrow_mut().take());

        if let Err(e) = unsafe { DestroyWindow(self.handle) } {
            warn!("DestroyWindow failed: {e}");
        }
        debug!("window {:?} destroyed", self.id);
    }
}

impl HasWindowHandle for WindowsWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        let hwnd = NonZeroIsize::new(self.handle.0 as isize).ok_or(HandleError::Unavailable)?;
        Ok(unsafe { WindowHandle::borrow_raw(RawWindowHandle::Win32(Win32WindowHandle::new(hwnd))) })
    }
}

impl Window for WindowsWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn present(&self) -> anyhow::Result<()> {
        if let Some(resources) = self.graphics.borrow().as_ref() {
            unsafe { SwapBuffers(resources.surface.hdc()) }.context("SwapBuffers failed")?;
        }
        Ok(())
    }
}
