//! Platform-neutral context negotiation policy.
//!
//! The platform backends translate these values into native calls; keeping
//! the rules here as plain data means they stay checkable off the target
//! platform.

use thiserror::Error;

/// Desired bit depths and sampling for a window's drawing surface.
///
/// Chosen once at window-creation time and never mutated afterwards.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SurfaceConfig {
    pub color_bits: u8,
    pub alpha_bits: u8,
    pub accum_bits: u8,
    pub depth_bits: u8,
    pub stencil_bits: u8,
    pub aux_buffers: u8,
    pub samples: u8,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            color_bits: 24,
            alpha_bits: 8,
            accum_bits: 24,
            depth_bits: 16,
            stencil_bits: 8,
            aux_buffers: 0,
            samples: 4,
        }
    }
}

/// Swap-interval policy requested once a context is current.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SwapInterval {
    /// Present immediately, never wait for vertical blank.
    Immediate,
    /// Adaptive vsync (late swaps are allowed to tear) where the platform
    /// supports it, immediate otherwise.
    #[default]
    Adaptive,
}

impl SwapInterval {
    /// Native interval value, given whether tear-controlled swaps are
    /// available.
    pub fn interval(self, tear_supported: bool) -> i32 {
        match self {
            SwapInterval::Immediate => 0,
            SwapInterval::Adaptive => {
                if tear_supported {
                    -1
                } else {
                    0
                }
            }
        }
    }
}

/// Context versions tried by the attribute-based creation path, best first.
pub const FALLBACK_VERSIONS: [(i32, i32); 11] = [
    (4, 6),
    (4, 5),
    (4, 4),
    (4, 3),
    (4, 2),
    (4, 1),
    (4, 0),
    (3, 3),
    (3, 2),
    (3, 1),
    (3, 0),
];

/// Runs `try_version` over [`FALLBACK_VERSIONS`] in order and returns the
/// first version it accepts, without trying any later one.
pub fn negotiate_version(mut try_version: impl FnMut(i32, i32) -> bool) -> Option<(i32, i32)> {
    FALLBACK_VERSIONS
        .iter()
        .copied()
        .find(|&(major, minor)| try_version(major, minor))
}

/// Exact token match against a space-separated capability string.
///
/// Substring hits do not count: "WGL_ARB_pixel_formatX" never satisfies a
/// query for "WGL_ARB_pixel_format".
pub fn supports_extension(extensions: &str, name: &str) -> bool {
    extensions.split(' ').any(|token| token == name)
}

/// Failures raised while negotiating a surface configuration or rendering
/// context. OS error codes ride along where the platform produced one.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("drawing surface unavailable")]
    SurfaceUnavailable,
    #[error("no pixel format matches the requested configuration")]
    NoMatchingPixelFormat,
    #[error("pixel format {0} could not be applied (os error {1:#x})")]
    PixelFormatRejected(i32, u32),
    #[error("context creation failed (os error {0:#x})")]
    CreationFailed(u32),
    #[error("failed to make context current (os error {0:#x})")]
    MakeCurrentFailed(u32),
    #[error("display list sharing failed (os error {0:#x})")]
    ShareFailed(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_surface_config_bits() {
        let config = SurfaceConfig::default();
        assert_eq!(config.color_bits, 24);
        assert_eq!(config.alpha_bits, 8);
        assert_eq!(config.accum_bits, 24);
        assert_eq!(config.depth_bits, 16);
        assert_eq!(config.stencil_bits, 8);
        assert_eq!(config.aux_buffers, 0);
        assert_eq!(config.samples, 4);
    }

    #[test]
    fn test_extension_match_is_exact() {
        let list = "WGL_ARB_multisample WGL_ARB_pixel_format WGL_EXT_swap_control";
        assert!(supports_extension(list, "WGL_ARB_pixel_format"));
        assert!(supports_extension(list, "WGL_EXT_swap_control"));
        assert!(!supports_extension(list, "WGL_EXT_swap_control_tear"));
    }

    #[test]
    fn test_extension_match_rejects_longer_token() {
        // A longer token must not satisfy a query for its prefix.
        let list = "WGL_ARB_pixel_formatX WGL_ARB_multisample";
        assert!(!supports_extension(list, "WGL_ARB_pixel_format"));
        assert!(supports_extension(list, "WGL_ARB_pixel_formatX"));
    }

    #[test]
    fn test_extension_match_rejects_shorter_token() {
        let list = "WGL_ARB_pixel_format";
        assert!(!supports_extension(list, "WGL_ARB_pixel_formatX"));
        assert!(!supports_extension(list, "WGL_ARB"));
    }

    #[test]
    fn test_extension_match_empty_string() {
        assert!(!supports_extension("", "WGL_ARB_pixel_format"));
    }

    #[test]
    fn test_fallback_versions_strictly_descending() {
        for pair in FALLBACK_VERSIONS.windows(2) {
            assert!(pair[0] > pair[1], "{:?} must precede {:?}", pair[0], pair[1]);
        }
        assert_eq!(FALLBACK_VERSIONS.first(), Some(&(4, 6)));
        assert_eq!(FALLBACK_VERSIONS.last(), Some(&(3, 0)));
    }

    #[test]
    fn test_negotiate_version_stops_at_first_success() {
        let mut attempts = Vec::new();
        let accepted = negotiate_version(|major, minor| {
            attempts.push((major, minor));
            (major, minor) == (4, 3)
        });
        assert_eq!(accepted, Some((4, 3)));
        assert_eq!(attempts, [(4, 6), (4, 5), (4, 4), (4, 3)]);
    }

    #[test]
    fn test_negotiate_version_exhausts_table() {
        let mut attempts = 0;
        let accepted = negotiate_version(|_, _| {
            attempts += 1;
            false
        });
        assert_eq!(accepted, None);
        assert_eq!(attempts, FALLBACK_VERSIONS.len());
    }

    #[test]
    fn test_swap_interval_mapping() {
        assert_eq!(SwapInterval::Immediate.interval(false), 0);
        assert_eq!(SwapInterval::Immediate.interval(true), 0);
        assert_eq!(SwapInterval::Adaptive.interval(false), 0);
        assert_eq!(SwapInterval::Adaptive.interval(true), -1);
    }
}
