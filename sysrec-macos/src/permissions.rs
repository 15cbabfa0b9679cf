//! macOS version and Screen Recording permission checks.
//!
//! ScreenCaptureKit audio capture needs macOS 13 (Ventura) or later. Screen
//! Recording permission is required as well; without it content enumeration
//! fails, so a missing grant is only logged here.

use sysrec_core::models::error::CaptureError;

/// Oldest macOS release whose ScreenCaptureKit can deliver audio.
pub const MINIMUM_MACOS_VERSION: (u32, u32) = (13, 0);

/// Parse `sw_vers -productVersion` output such as `14.4.1` or `13.0`.
pub fn parse_product_version(output: &str) -> Option<(u32, u32, u32)> {
    let mut parts = output.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    Some((major, minor, patch))
}

pub fn meets_minimum(version: (u32, u32, u32)) -> bool {
    (version.0, version.1) >= MINIMUM_MACOS_VERSION
}

/// Reject `version` if it is older than [`MINIMUM_MACOS_VERSION`].
pub fn require_supported(version: Option<(u32, u32, u32)>) -> Result<(), CaptureError> {
    match version {
        Some(v) if meets_minimum(v) => Ok(()),
        Some((major, minor, patch)) => Err(CaptureError::UnsupportedPlatform(format!(
            "macOS {}.{}.{} is too old; system audio capture needs {}.{} or later",
            major, minor, patch, MINIMUM_MACOS_VERSION.0, MINIMUM_MACOS_VERSION.1
        ))),
        None => Err(CaptureError::UnsupportedPlatform(
            "could not determine the macOS version".into(),
        )),
    }
}

#[cfg(target_os = "macos")]
pub use self::macos::*;

#[cfg(target_os = "macos")]
mod macos {
    use std::process::Command;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ScreenCapturePermission {
        Granted,
        /// Denied, or never requested.
        Denied,
    }

    #[link(name = "CoreGraphics", kind = "framework")]
    extern "C" {
        /// Reads the current grant without prompting.
        fn CGPreflightScreenCaptureAccess() -> bool;
    }

    pub fn check_screen_capture_permission() -> ScreenCapturePermission {
        // SAFETY: read-only CoreGraphics query, available since macOS 10.15.
        let granted = unsafe { CGPreflightScreenCaptureAccess() };
        if granted {
            ScreenCapturePermission::Granted
        } else {
            ScreenCapturePermission::Denied
        }
    }

    /// Running macOS version, from `sw_vers`.
    pub fn macos_version() -> Option<(u32, u32, u32)> {
        let output = Command::new("sw_vers").arg("-productVersion").output().ok()?;
        parse_product_version(&String::from_utf8_lossy(&output.stdout))
    }

    /// Version gate plus a permission warning.
    pub fn check_platform() -> Result<(), CaptureError> {
        require_supported(macos_version())?;
        if check_screen_capture_permission() == ScreenCapturePermission::Denied {
            log::warn!(
                "Screen Recording permission not granted; enable it under \
                 System Settings > Privacy & Security > Screen Recording"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_and_short_versions() {
        assert_eq!(parse_product_version("14.4.1\n"), Some((14, 4, 1)));
        assert_eq!(parse_product_version("13.0"), Some((13, 0, 0)));
        assert_eq!(parse_product_version("15"), Some((15, 0, 0)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_product_version(""), None);
        assert_eq!(parse_product_version("fourteen"), None);
        assert_eq!(parse_product_version("14.x"), None);
    }

    #[test]
    fn ventura_is_the_floor() {
        assert!(meets_minimum((13, 0, 0)));
        assert!(meets_minimum((14, 2, 1)));
        assert!(!meets_minimum((12, 6, 9)));
    }

    #[test]
    fn old_or_unknown_versions_are_unsupported() {
        assert!(require_supported(Some((13, 1, 0))).is_ok());
        assert!(matches!(
            require_supported(Some((12, 7, 0))),
            Err(CaptureError::UnsupportedPlatform(_))
        ));
        assert!(matches!(require_supported(None), Err(CaptureError::UnsupportedPlatform(_))));
    }
}
