#![cfg(windows)]

mod wgl;
mod window;

use crate::os::window::{Window, WindowAttributes, WindowId};
use crate::os::windows::wgl::WglCapabilities;
use crate::os::windows::window::{WindowRef, WindowsWindow};
use crate::os::{OsLoopInputs, Platform};
use anyhow::{Context as _, bail};
use log::{debug, warn};
use raw_window_handle::{DisplayHandle, HandleError, HasDisplayHandle};
use std::sync::Arc;
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CREATESTRUCTW, CS_HREDRAW, CS_OWNDC, CS_VREDRAW, DefWindowProcW, DispatchMessageW,
    GWLP_USERDATA, GetWindowLongPtrW, MSG, PM_REMOVE, PeekMessageW, PostQuitMessage,
    RegisterClassExW, SetWindowLongPtrW, TranslateMessage, UnregisterClassW, WM_CLOSE, WM_CREATE,
    WM_DESTROY, WM_QUIT, WNDCLASSEXW,
};
use windows::core::{PCWSTR, w};

pub(super) const WINDOW_CLASS_NAME: PCWSTR = w!("PolychromeWindowClass");

pub(super) struct WindowsPlatform {
    hinstance: HINSTANCE,
    wgl: WglCapabilities,
}

impl WindowsPlatform {
    pub(super) fn new() -> anyhow::Result<Self> {
        let hinstance = HINSTANCE(unsafe { GetModuleHandleW(PCWSTR::null()) }?.0);

        let wc = WNDCLASSEXW {
            cbSize: size_of::<WNDCLASSEXW>() as u32,
            style: CS_OWNDC | CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(window_proc),
            hInstance: hinstance,
            lpszClassName: WINDOW_CLASS_NAME,
            ..Default::default()
        };

        if unsafe { RegisterClassExW(&wc) } == 0 {
            bail!(
                "window class registration failed: {}",
                windows::core::Error::from_win32()
            );
        }

        // One probe per process; the capability set never changes afterwards.
        let wgl = match wgl::probe(hinstance) {
            Ok(caps) => caps,
            Err(e) => {
                unsafe {
                    _ = UnregisterClassW(WINDOW_CLASS_NAME, hinstance);
                }
                return Err(e.context("WGL capability probe failed"));
            }
        };

        Ok(Self { hinstance, wgl })
    }

    pub(super) fn hinstance(&self) -> HINSTANCE {
        self.hinstance
    }

    pub(super) fn wgl(&self) -> &WglCapabilities {
        &self.wgl
    }
}

impl Drop for WindowsPlatform {
    fn drop(&mut self) {
        if let Err(e) = unsafe { UnregisterClassW(WINDOW_CLASS_NAME, self.hinstance) } {
            warn!("failed to unregister window class: {e}");
        }
    }
}

impl HasDisplayHandle for WindowsPlatform {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        Ok(DisplayHandle::windows())
    }
}

impl Platform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn create_window(
        &self,
        window_attributes: WindowAttributes,
        window_id: WindowId,
    ) -> anyhow::Result<Arc<dyn Window>> {
        let window = WindowsWindow::new(self, window_attributes, window_id)
            .context("window construction failed")?;
        Ok(Arc::new(window))
    }

    fn process_events(&self, inputs: &OsLoopInputs) {
        let mut msg = MSG::default();
        unsafe {
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    inputs.exit.request(msg.wParam.0 as i32);
                    continue;
                }

                _ = TranslateMessage(&msg);
                _ = DispatchMessageW(&msg);
            }
        }
    }
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let user_data = unsafe { GetWindowLongPtrW(hwnd, GWLP_USERDATA) };
    if user_data != 0 {
        let window_ref = user_data as *const WindowRef;
        match message {
            WM_CLOSE => {
                // Closing only asks the application to exit; the window and
                // its resources go away when their owner drops them.
                unsafe { PostQuitMessage(0) };
                return LRESULT(0);
            }
            WM_DESTROY => {
                // The window may die without ever having acquired a context;
                // take whatever is there and release it context-first.
                if let Some(window_ref) = unsafe { window_ref.as_ref() } {
                    if let Some(resources) = window_ref.graphics.borrow_mut().take() {
                        debug!(
                            "window {:?} destroyed with live context {:?}",
                            window_ref.window_id,
                            resources.context.hglrc()
                        );
                        drop(resources);
                    }
                }
                return LRESULT(0);
            }
            _ => {}
        }
    }

    match message {
        WM_CREATE => {
            let createstruct = lparam.0 as *const CREATESTRUCTW;
            if let Some(createstruct) = unsafe { createstruct.as_ref() } {
                if !createstruct.lpCreateParams.is_null() {
                    unsafe {
                        SetWindowLongPtrW(hwnd, GWLP_USERDATA, createstruct.lpCreateParams as isize);
                    }
                }
            }
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, message, wparam, lparam) },
    }
}
