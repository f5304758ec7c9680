//! Camera capture.
//!
//! This module provides the capture side of the pipeline:
//! - Device catalogs and stream opening (`CameraBackend`)
//! - Synthetic `stub://` cameras (always available)
//! - V4L2 cameras (feature: capture-v4l2)
//! - The display surface a stream is attached to (`VideoSurface`)
//! - Session management (`CaptureController`)
//!
//! A surface is ready only after it has decoded a frame with non-zero dimensions.
//! An opened stream with a known negotiated format is not enough.

mod controller;
mod device;
mod error;
pub mod normalize;
mod surface;
pub mod synthetic;
#[cfg(feature = "capture-v4l2")]
pub mod v4l2;

pub use controller::{CaptureController, SessionId};
pub use device::{CameraBackend, CaptureSettings, DeviceInfo, VideoStream};
pub use error::AcquireError;
pub use surface::VideoSurface;
pub use synthetic::{SyntheticBackend, SyntheticStream};
#[cfg(feature = "capture-v4l2")]
pub use v4l2::{V4l2Backend, V4l2Stream};

/// Pick a backend for a device id: `stub://` ids are synthetic, anything else is V4L2.
pub fn backend_for_device(device_id: &str) -> anyhow::Result<Box<dyn CameraBackend>> {
    if device_id.starts_with("stub://") {
        return Ok(Box::new(SyntheticBackend::new()));
    }
    #[cfg(feature = "capture-v4l2")]
    {
        Ok(Box::new(V4l2Backend::new()?))
    }
    #[cfg(not(feature = "capture-v4l2"))]
    {
        anyhow::bail!(
            "device {} requires the capture-v4l2 feature",
            device_id
        )
    }
}
