//! WGL capability probing, pixel-format negotiation, and context creation.
//!
//! Everything optional lives behind [`WglCapabilities`], filled in exactly
//! once by [`probe`] and handed around immutably afterwards.

use crate::os::context::{self, ContextError, SurfaceConfig, SwapInterval};
use crate::os::windows::WINDOW_CLASS_NAME;
use anyhow::Context as _;
use log::{debug, warn};
use std::ffi::{CStr, c_char};
use windows::Win32::Foundation::{BOOL, GetLastError, HINSTANCE, HWND};
use windows::Win32::Graphics::Gdi::{GetDC, HDC, ReleaseDC};
use windows::Win32::Graphics::OpenGL::{
    ChoosePixelFormat, DescribePixelFormat, HGLRC, PFD_DOUBLEBUFFER, PFD_DRAW_TO_WINDOW,
    PFD_PIXEL_TYPE, PFD_SUPPORT_OPENGL, PFD_TYPE_RGBA, PIXELFORMATDESCRIPTOR, SetPixelFormat,
    wglCreateContext, wglDeleteContext, wglGetCurrentContext, wglGetProcAddress, wglMakeCurrent,
    wglShareLists,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CW_USEDEFAULT, CreateWindowExW, DestroyWindow, HMENU, WINDOW_EX_STYLE, WS_OVERLAPPEDWINDOW,
};
use windows::core::{PCSTR, s, w};

// WGL_ARB_pixel_format
const WGL_DRAW_TO_WINDOW_ARB: i32 = 0x2001;
const WGL_SUPPORT_OPENGL_ARB: i32 = 0x2010;
const WGL_DOUBLE_BUFFER_ARB: i32 = 0x2011;
const WGL_PIXEL_TYPE_ARB: i32 = 0x2013;
const WGL_COLOR_BITS_ARB: i32 = 0x2014;
const WGL_ALPHA_BITS_ARB: i32 = 0x201B;
const WGL_ACCUM_BITS_ARB: i32 = 0x201D;
const WGL_DEPTH_BITS_ARB: i32 = 0x2022;
const WGL_STENCIL_BITS_ARB: i32 = 0x2023;
const WGL_AUX_BUFFERS_ARB: i32 = 0x2024;
const WGL_TYPE_RGBA_ARB: i32 = 0x202B;
// WGL_ARB_multisample
const WGL_SAMPLE_BUFFERS_ARB: i32 = 0x2041;
const WGL_SAMPLES_ARB: i32 = 0x2042;
// WGL_ARB_create_context / WGL_ARB_create_context_profile
const WGL_CONTEXT_MAJOR_VERSION_ARB: i32 = 0x2091;
const WGL_CONTEXT_MINOR_VERSION_ARB: i32 = 0x2092;
const WGL_CONTEXT_FLAGS_ARB: i32 = 0x2094;
const WGL_CONTEXT_PROFILE_MASK_ARB: i32 = 0x9126;
const WGL_CONTEXT_DEBUG_BIT_ARB: i32 = 0x0001;
const WGL_CONTEXT_FORWARD_COMPATIBLE_BIT_ARB: i32 = 0x0002;
const WGL_CONTEXT_CORE_PROFILE_BIT_ARB: i32 = 0x0001;

const MAX_CANDIDATE_FORMATS: usize = 8;

type ChoosePixelFormatArbFn = unsafe extern "system" fn(
    hdc: HDC,
    attribs_i: *const i32,
    attribs_f: *const f32,
    max_formats: u32,
    formats: *mut i32,
    count: *mut u32,
) -> BOOL;
type CreateContextAttribsArbFn =
    unsafe extern "system" fn(hdc: HDC, share: HGLRC, attribs: *const i32) -> HGLRC;
type GetExtensionsStringArbFn = unsafe extern "system" fn(hdc: HDC) -> *const c_char;
type GetExtensionsStringExtFn = unsafe extern "system" fn() -> *const c_char;
type SwapIntervalExtFn = unsafe extern "system" fn(interval: i32) -> BOOL;

/// Optional WGL entry points and capability flags, resolved once at platform
/// construction and read-only for the rest of the process.
pub(super) struct WglCapabilities {
    choose_pixel_format: Option<ChoosePixelFormatArbFn>,
    multisample: bool,
    create_context_attribs: Option<CreateContextAttribsArbFn>,
    context_profile: bool,
    swap_interval: Option<SwapIntervalExtFn>,
    swap_interval_tear: bool,
}

/// Window DC released on drop.
pub(super) struct DcGuard {
    hwnd: HWND,
    hdc: HDC,
}

impl DcGuard {
    pub(super) fn acquire(hwnd: HWND) -> Result<Self, ContextError> {
        let hdc = unsafe { GetDC(hwnd) };
        if hdc.is_invalid() {
            return Err(ContextError::SurfaceUnavailable);
        }
        Ok(Self { hwnd, hdc })
    }

    pub(super) fn hdc(&self) -> HDC {
        self.hdc
    }
}

impl Drop for DcGuard {
    fn drop(&mut self) {
        if unsafe { ReleaseDC(self.hwnd, self.hdc) } == 0 {
            warn!("ReleaseDC failed (os error {:#x})", last_error());
        }
    }
}

/// Rendering context: detached if current, then deleted, on drop. Cleanup
/// runs to completion whatever the detach result was.
pub(super) struct GlContextGuard {
    hglrc: HGLRC,
}

impl GlContextGuard {
    pub(super) fn new(hglrc: HGLRC) -> Self {
        Self { hglrc }
    }

    pub(super) fn hglrc(&self) -> HGLRC {
        self.hglrc
    }
}

impl Drop for GlContextGuard {
    fn drop(&mut self) {
        unsafe {
            if wglGetCurrentContext() == self.hglrc {
                if let Err(e) = wglMakeCurrent(HDC::default(), HGLRC::default()) {
                    warn!("failed to detach current context: {e}");
                }
            }
            if let Err(e) = wglDeleteContext(self.hglrc) {
                warn!("wglDeleteContext failed: {e}");
            }
        }
    }
}

/// Everything a window owns for rendering. Declaration order is teardown
/// order: the context goes before the surface it was current on.
pub(super) struct GlResources {
    pub(super) context: GlContextGuard,
    pub(super) surface: DcGuard,
}

struct ProbeWindow(HWND);

impl Drop for ProbeWindow {
    fn drop(&mut self) {
        if let Err(e) = unsafe { DestroyWindow(self.0) } {
            warn!("failed to destroy probe window: {e}");
        }
    }
}

/// Queries the optional WGL capabilities through a throwaway invisible
/// window. Entry points can only be resolved with a context current, and a
/// context needs a surface with a pixel format applied, so the probe walks
/// the whole legacy bootstrap and tears it down in reverse before returning.
pub(super) fn probe(hinstance: HINSTANCE) -> anyhow::Result<WglCapabilities> {
    let hwnd = unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            WINDOW_CLASS_NAME,
            w!("wgl probe"),
            WS_OVERLAPPEDWINDOW,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            HWND::default(),
            HMENU::default(),
            hinstance,
            None,
        )
        .context("probe window creation failed")?
    };
    let _window = ProbeWindow(hwnd);

    let surface = DcGuard::acquire(hwnd)?;
    apply_legacy_pixel_format(surface.hdc(), &SurfaceConfig::default())?;

    let hglrc =
        unsafe { wglCreateContext(surface.hdc()) }.context("bootstrap context creation failed")?;
    let context = GlContextGuard::new(hglrc);
    unsafe { wglMakeCurrent(surface.hdc(), context.hglrc()) }
        .context("failed to make bootstrap context current")?;

    let extensions = query_extensions_string(surface.hdc());
    debug!(
        "WGL extensions: {}",
        if extensions.is_empty() {
            "(none)"
        } else {
            &extensions
        }
    );

    Ok(resolve_capabilities(&extensions))
}

fn query_extensions_string(hdc: HDC) -> String {
    unsafe {
        if let Some(get_arb) = load::<GetExtensionsStringArbFn>(s!("wglGetExtensionsStringARB")) {
            return cstr_to_owned(get_arb(hdc));
        }
        if let Some(get_ext) = load::<GetExtensionsStringExtFn>(s!("wglGetExtensionsStringEXT")) {
            return cstr_to_owned(get_ext());
        }
    }
    String::new()
}

fn resolve_capabilities(extensions: &str) -> WglCapabilities {
    let has = |name: &str| context::supports_extension(extensions, name);
    unsafe {
        WglCapabilities {
            choose_pixel_format: if has("WGL_ARB_pixel_format") {
                load(s!("wglChoosePixelFormatARB"))
            } else {
                None
            },
            multisample: has("WGL_ARB_multisample"),
            create_context_attribs: if has("WGL_ARB_create_context") {
                load(s!("wglCreateContextAttribsARB"))
            } else {
                None
            },
            context_profile: has("WGL_ARB_create_context_profile"),
            swap_interval: if has("WGL_EXT_swap_control") {
                load(s!("wglSwapIntervalEXT"))
            } else {
                None
            },
            swap_interval_tear: has("WGL_EXT_swap_control_tear"),
        }
    }
}

/// Resolves an extension entry point. The probed extension name fixes the
/// real signature behind the cast.
unsafe fn load<F>(name: PCSTR) -> Option<F> {
    let proc = unsafe { wglGetProcAddress(name) }?;
    Some(unsafe { std::mem::transmute_copy(&proc) })
}

unsafe fn cstr_to_owned(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Selects a pixel format for `hdc` (through `wglChoosePixelFormatARB` when
/// the probe found it, through the legacy chooser otherwise), validates it
/// with `DescribePixelFormat`, and applies it. Nothing is applied on failure.
pub(super) fn apply_pixel_format(
    caps: &WglCapabilities,
    hdc: HDC,
    config: &SurfaceConfig,
) -> Result<(), ContextError> {
    match caps.choose_pixel_format {
        Some(choose) => {
            let format = choose_extended_format(choose, hdc, config, caps.multisample)?;
            validate_and_apply(hdc, format)
        }
        None => apply_legacy_pixel_format(hdc, config),
    }
}

fn apply_legacy_pixel_format(hdc: HDC, config: &SurfaceConfig) -> Result<(), ContextError> {
    let format = unsafe { ChoosePixelFormat(hdc, &descriptor_for(config)) };
    if format == 0 {
        return Err(ContextError::NoMatchingPixelFormat);
    }
    validate_and_apply(hdc, format)
}

fn choose_extended_format(
    choose: ChoosePixelFormatArbFn,
    hdc: HDC,
    config: &SurfaceConfig,
    multisample: bool,
) -> Result<i32, ContextError> {
    let attribs = pixel_format_attribs(config, multisample);
    let mut formats = [0i32; MAX_CANDIDATE_FORMATS];
    let mut count = 0u32;

    let ok = unsafe {
        choose(
            hdc,
            attribs.as_ptr(),
            std::ptr::null(),
            formats.len() as u32,
            formats.as_mut_ptr(),
            &mut count,
        )
    };
    if !ok.as_bool() || count == 0 {
        return Err(ContextError::NoMatchingPixelFormat);
    }
    Ok(formats[0])
}

fn pixel_format_attribs(config: &SurfaceConfig, multisample: bool) -> Vec<i32> {
    let mut attribs = vec![
        WGL_DRAW_TO_WINDOW_ARB,
        1,
        WGL_SUPPORT_OPENGL_ARB,
        1,
        WGL_DOUBLE_BUFFER_ARB,
        1,
        WGL_PIXEL_TYPE_ARB,
        WGL_TYPE_RGBA_ARB,
        WGL_COLOR_BITS_ARB,
        config.color_bits as i32,
        WGL_ALPHA_BITS_ARB,
        config.alpha_bits as i32,
        WGL_ACCUM_BITS_ARB,
        config.accum_bits as i32,
        WGL_DEPTH_BITS_ARB,
        config.depth_bits as i32,
        WGL_STENCIL_BITS_ARB,
        config.stencil_bits as i32,
        WGL_AUX_BUFFERS_ARB,
        config.aux_buffers as i32,
    ];
    if multisample {
        attribs.extend_from_slice(&[
            WGL_SAMPLE_BUFFERS_ARB,
            1,
            WGL_SAMPLES_ARB,
            config.samples as i32,
        ]);
    }
    attribs.push(0);
    attribs
}

fn validate_and_apply(hdc: HDC, format: i32) -> Result<(), ContextError> {
    let mut descriptor = PIXELFORMATDESCRIPTOR::default();
    let described = unsafe {
        DescribePixelFormat(
            hdc,
            // The binding types this parameter as PFD_PIXEL_TYPE; it is the
            // one-based format index.
            PFD_PIXEL_TYPE(format as i8),
            size_of::<PIXELFORMATDESCRIPTOR>() as u32,
            Some(&mut descriptor),
        )
    };
    if described == 0 {
        return Err(ContextError::PixelFormatRejected(format, last_error()));
    }

    unsafe { SetPixelFormat(hdc, format, &descriptor) }
        .map_err(|e| ContextError::PixelFormatRejected(format, e.code().0 as u32))
}

fn descriptor_for(config: &SurfaceConfig) -> PIXELFORMATDESCRIPTOR {
    PIXELFORMATDESCRIPTOR {
        nSize: size_of::<PIXELFORMATDESCRIPTOR>() as u16,
        nVersion: 1,
        dwFlags: PFD_DRAW_TO_WINDOW | PFD_SUPPORT_OPENGL | PFD_DOUBLEBUFFER,
        iPixelType: PFD_TYPE_RGBA,
        cColorBits: config.color_bits,
        cAlphaBits: config.alpha_bits,
        cAccumBits: config.accum_bits,
        cDepthBits: config.depth_bits,
        cStencilBits: config.stencil_bits,
        cAuxBuffers: config.aux_buffers,
        ..Default::default()
    }
}

/// Creates a rendering context against `hdc`, preferring the attribute-based
/// path when the probe found it.
pub(super) fn create_context(
    caps: &WglCapabilities,
    hdc: HDC,
    share: Option<HGLRC>,
) -> Result<GlContextGuard, ContextError> {
    match caps.create_context_attribs {
        Some(create) => create_versioned_context(create, hdc, share, caps.context_profile),
        None => create_basic_context(hdc, share),
    }
}

/// Walks the version fallback table from the top, asking for a
/// forward-compatible context (debug-enabled in debug builds, core profile
/// when the profile extension is present), and keeps the first one the
/// driver accepts.
fn create_versioned_context(
    create: CreateContextAttribsArbFn,
    hdc: HDC,
    share: Option<HGLRC>,
    core_profile: bool,
) -> Result<GlContextGuard, ContextError> {
    let share = share.unwrap_or_default();
    let mut flags = WGL_CONTEXT_FORWARD_COMPATIBLE_BIT_ARB;
    if cfg!(debug_assertions) {
        flags |= WGL_CONTEXT_DEBUG_BIT_ARB;
    }

    let mut created = HGLRC::default();
    let accepted = context::negotiate_version(|major, minor| {
        let mut attribs = vec![
            WGL_CONTEXT_MAJOR_VERSION_ARB,
            major,
            WGL_CONTEXT_MINOR_VERSION_ARB,
            minor,
            WGL_CONTEXT_FLAGS_ARB,
            flags,
        ];
        if core_profile {
            attribs.extend_from_slice(&[
                WGL_CONTEXT_PROFILE_MASK_ARB,
                WGL_CONTEXT_CORE_PROFILE_BIT_ARB,
            ]);
        }
        attribs.push(0);

        created = unsafe { create(hdc, share, attribs.as_ptr()) };
        !created.is_invalid()
    });

    match accepted {
        Some((major, minor)) => {
            debug!("created OpenGL {major}.{minor} context");
            Ok(GlContextGuard::new(created))
        }
        None => Err(ContextError::CreationFailed(last_error())),
    }
}

fn create_basic_context(hdc: HDC, share: Option<HGLRC>) -> Result<GlContextGuard, ContextError> {
    let hglrc = unsafe { wglCreateContext(hdc) }
        .map_err(|e| ContextError::CreationFailed(e.code().0 as u32))?;
    let context = GlContextGuard::new(hglrc);

    if let Some(share) = share {
        // A context that silently failed to share would be worse than no
        // context at all; the guard deletes the fresh one before the error
        // gets out.
        unsafe { wglShareLists(share, context.hglrc()) }
            .map_err(|e| ContextError::ShareFailed(e.code().0 as u32))?;
    }

    Ok(context)
}

pub(super) fn make_current(hdc: HDC, context: &GlContextGuard) -> Result<(), ContextError> {
    unsafe { wglMakeCurrent(hdc, context.hglrc()) }
        .map_err(|e| ContextError::MakeCurrentFailed(e.code().0 as u32))
}

/// Best-effort swap interval request; absence of the extension or a refusal
/// from the driver never fails window creation.
pub(super) fn apply_swap_interval(caps: &WglCapabilities, swap: SwapInterval) {
    let Some(set_interval) = caps.swap_interval else {
        return;
    };
    let interval = swap.interval(caps.swap_interval_tear);
    if !unsafe { set_interval(interval) }.as_bool() {
        warn!(
            "wglSwapIntervalEXT({interval}) failed (os error {:#x})",
            last_error()
        );
    }
}

fn last_error() -> u32 {
    unsafe { GetLastError().0 }
}
