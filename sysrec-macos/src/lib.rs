//! # sysrec-macos
//!
//! macOS ScreenCaptureKit backend for sysrec.
//!
//! Provides:
//! - `ShareableDisplays`: display enumeration via `SCShareableContent`
//! - `ScreenCaptureAudioSource`: system audio streams via `SCStream`
//! - `permissions`: macOS version gate and Screen Recording check
//!
//! ## Platform Requirements
//! - macOS 13 (Ventura) or later
//! - Screen Recording permission for the hosting terminal or app
//!
//! ## Usage
//! ```ignore
//! use sysrec_core::{CaptureConfiguration, CaptureController};
//! use sysrec_macos::{ScreenCaptureAudioSource, ShareableDisplays};
//!
//! let controller = CaptureController::new(ShareableDisplays, ScreenCaptureAudioSource);
//! controller.start(&CaptureConfiguration::new("output.wav"))?;
//! ```

pub mod batch_layout;
pub mod permissions;
#[cfg(target_os = "macos")]
pub mod screencapturekit_source;

#[cfg(target_os = "macos")]
pub use screencapturekit_source::{ScreenCaptureAudioSource, ShareableDisplays};
