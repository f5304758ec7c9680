use anyhow::{anyhow, Result};

use super::device::VideoStream;
use crate::frame::{Dimensions, Frame};

/// Upper bound on queued frames discarded in one refresh.
const MAX_DRAINED_FRAMES: usize = 16;

/// Display surface a stream is attached to.
///
/// The surface reports the dimensions of the last decoded frame, not the stream's
/// negotiated format: a surface with an attached but not-yet-decoding stream is
/// not ready.
#[derive(Default)]
pub struct VideoSurface {
    stream: Option<Box<dyn VideoStream>>,
    latest: Option<Frame>,
    decoded: Dimensions,
}

impl VideoSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a stream and begin playback. Any previous stream is stopped first.
    pub fn attach(&mut self, stream: Box<dyn VideoStream>) {
        self.detach();
        log::debug!(
            "surface: attached {} (negotiated {})",
            stream.device_id(),
            stream.negotiated()
        );
        self.stream = Some(stream);
    }

    /// Stop and drop the current stream; the surface reports zero dimensions.
    pub fn detach(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        self.latest = None;
        self.decoded = Dimensions::ZERO;
    }

    pub fn is_attached(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| !s.is_stopped())
    }

    pub fn device_id(&self) -> Option<&str> {
        self.stream.as_ref().map(|s| s.device_id())
    }

    /// Negotiated stream format, known before the first decoded frame.
    pub fn negotiated(&self) -> Dimensions {
        self.stream
            .as_ref()
            .map(|s| s.negotiated())
            .unwrap_or(Dimensions::ZERO)
    }

    /// Decoded frame dimensions; zero until a frame has been decoded.
    pub fn dimensions(&self) -> Dimensions {
        self.decoded
    }

    /// Advance to the newest decoded frame.
    ///
    /// Reads one frame, then keeps reading while the stream has more queued, so
    /// the surface holds the current image rather than the oldest buffered one.
    /// Errors when no stream is attached or the stream ended.
    pub fn refresh(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("no stream attached to surface"))?;

        let mut newest = stream.read_frame()?;
        let mut skipped = 0usize;
        while skipped < MAX_DRAINED_FRAMES && stream.frame_pending()? {
            match stream.read_frame()? {
                Some(frame) => {
                    if newest.replace(frame).is_some() {
                        skipped += 1;
                    }
                }
                None => break,
            }
        }
        if skipped > 0 {
            log::debug!("surface: skipped {} stale frame(s)", skipped);
        }

        if let Some(frame) = newest {
            self.decoded = frame.dimensions();
            self.latest = Some(frame);
        }
        Ok(())
    }

    /// Take the most recent decoded frame. Dimensions stay as last decoded.
    pub fn take_frame(&mut self) -> Option<Frame> {
        self.latest.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CameraBackend, CaptureSettings, DeviceInfo, SyntheticBackend};
    use std::collections::VecDeque;

    fn open_stream(warmup_frames: u32) -> Result<Box<dyn VideoStream>> {
        let cam = DeviceInfo::new("cam1", "Camera 1");
        let mut backend = SyntheticBackend::with_devices(vec![cam.clone()]);
        let settings = CaptureSettings {
            warmup_frames,
            ..CaptureSettings::default()
        };
        Ok(backend.open(&cam, &settings)?)
    }

    #[test]
    fn metadata_alone_is_not_readiness() -> Result<()> {
        let mut surface = VideoSurface::new();
        surface.attach(open_stream(1)?);

        assert_eq!(surface.negotiated(), Dimensions::new(640, 480));
        assert!(!surface.dimensions().is_valid());
        surface.refresh()?;
        assert!(!surface.dimensions().is_valid());
        surface.refresh()?;
        assert_eq!(surface.dimensions(), Dimensions::new(640, 480));
        assert!(surface.take_frame().is_some());
        assert!(surface.take_frame().is_none());
        Ok(())
    }

    /// Stream with a fixed backlog of decoded frames.
    struct BackloggedStream {
        queued: VecDeque<Frame>,
    }

    impl VideoStream for BackloggedStream {
        fn device_id(&self) -> &str {
            "backlog"
        }

        fn negotiated(&self) -> Dimensions {
            Dimensions::new(4, 2)
        }

        fn read_frame(&mut self) -> Result<Option<Frame>> {
            Ok(self.queued.pop_front())
        }

        fn frame_pending(&mut self) -> Result<bool> {
            Ok(!self.queued.is_empty())
        }

        fn stop(&mut self) {}

        fn is_stopped(&self) -> bool {
            false
        }
    }

    #[test]
    fn refresh_skips_to_newest_queued_frame() -> Result<()> {
        let queued = (1..=4).map(|seq| Frame::filled(4, 2, 0, seq)).collect();
        let mut surface = VideoSurface::new();
        surface.attach(Box::new(BackloggedStream { queued }));

        surface.refresh()?;
        let frame = surface.take_frame().expect("decoded frame");
        assert_eq!(frame.sequence, 4);

        // Backlog consumed; nothing new to hand out.
        surface.refresh()?;
        assert!(surface.take_frame().is_none());
        assert_eq!(surface.dimensions(), Dimensions::new(4, 2));
        Ok(())
    }

    #[test]
    fn detach_resets_dimensions() -> Result<()> {
        let mut surface = VideoSurface::new();
        surface.attach(open_stream(0)?);
        surface.refresh()?;
        assert!(surface.dimensions().is_valid());

        surface.detach();
        assert!(!surface.is_attached());
        assert_eq!(surface.dimensions(), Dimensions::ZERO);
        assert!(surface.refresh().is_err());
        Ok(())
    }
}
