use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// External object-detection capability.
///
/// The loop treats a detector as an opaque, possibly slow, possibly failing call.
/// It never issues a second `detect` before the first returns.
///
/// Implementations must treat the frame as read-only and must not keep pixel data
/// beyond the call.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// Rectangles are returned in the frame's pixel coordinates. Errors are
    /// treated as transient by the caller.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, called once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
