use anyhow::Result;

use super::error::AcquireError;
use crate::frame::{Dimensions, Frame};

/// A selectable camera as reported by a catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub label: String,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Requested stream format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Target frame rate requested from the device (0 = device default).
    pub target_fps: u32,
    /// Synthetic streams only: pulls that return no decoded frame before the first image.
    pub warmup_frames: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            target_fps: 30,
            warmup_frames: 3,
        }
    }
}

/// A live device stream.
///
/// Streams report their negotiated format as soon as they open, but a surface is
/// only ready once `read_frame` has produced a decoded frame.
pub trait VideoStream {
    fn device_id(&self) -> &str;

    /// Format agreed with the device. Known before the first decoded frame.
    fn negotiated(&self) -> Dimensions;

    /// Pull the next decoded frame.
    ///
    /// `Ok(None)` means the stream is playing but nothing has been decoded yet.
    /// An error means the stream ended or the device went away.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Whether another decoded frame can be read right now without blocking.
    ///
    /// Streams that generate frames on demand have nothing queued.
    fn frame_pending(&mut self) -> Result<bool> {
        Ok(false)
    }

    /// Stop playback and release the device. Idempotent.
    fn stop(&mut self);

    fn is_stopped(&self) -> bool;
}

/// Device enumeration plus stream opening.
pub trait CameraBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Currently selectable cameras.
    fn devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Open exclusive access to `device`.
    fn open(
        &mut self,
        device: &DeviceInfo,
        settings: &CaptureSettings,
    ) -> std::result::Result<Box<dyn VideoStream>, AcquireError>;
}
