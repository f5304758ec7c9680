//! V4L2 camera backend.
//!
//! Enumerates `/dev/video*` nodes and streams frames through memory-mapped buffers.
//! Frames are requested as RGB24 and converted from YUYV when the device refuses.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::device::{CameraBackend, CaptureSettings, DeviceInfo, VideoStream};
use super::error::AcquireError;
use super::normalize::{normalize_to_rgb, PixelFormat};
use crate::frame::{Dimensions, Frame};

const DEVICE_PATH_PATTERN: &str = r"^/dev/video[0-9]+$";
/// `POLLIN` from poll(2).
const POLL_READABLE: i16 = 0x0001;

/// Local V4L2 cameras.
pub struct V4l2Backend {
    path_pattern: Regex,
}

impl V4l2Backend {
    pub fn new() -> Result<Self> {
        Ok(Self {
            path_pattern: Regex::new(DEVICE_PATH_PATTERN)?,
        })
    }

    fn is_device_path(&self, id: &str) -> bool {
        self.path_pattern.is_match(id)
    }
}

impl CameraBackend for V4l2Backend {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let mut devices: Vec<DeviceInfo> = v4l::context::enum_devices()
            .into_iter()
            .filter_map(|node| {
                let id = node.path().to_string_lossy().into_owned();
                if !self.is_device_path(&id) {
                    return None;
                }
                let label = node
                    .name()
                    .unwrap_or_else(|| format!("Video device {}", node.index()));
                Some(DeviceInfo::new(id, label))
            })
            .collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(devices)
    }

    fn open(
        &mut self,
        device: &DeviceInfo,
        settings: &CaptureSettings,
    ) -> std::result::Result<Box<dyn VideoStream>, AcquireError> {
        if !self.is_device_path(&device.id) {
            return Err(AcquireError::NotFound(device.id.clone()));
        }
        let stream = V4l2Stream::open(&device.id, settings)?;
        Ok(Box::new(stream))
    }
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

/// Streaming V4L2 device.
pub struct V4l2Stream {
    device_id: String,
    state: Option<V4l2State>,
    /// Device handle kept outside the self-referencing state for readiness polls.
    handle: Option<Arc<v4l::device::Handle>>,
    size: Dimensions,
    format: PixelFormat,
    target_fps: u32,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl V4l2Stream {
    fn open(path: &str, settings: &CaptureSettings) -> std::result::Result<Self, AcquireError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device =
            v4l::Device::with_path(path).map_err(|err| AcquireError::from_io(path, &err))?;
        let mut format = device
            .format()
            .map_err(|err| AcquireError::from_io(path, &err))?;
        format.width = settings.width;
        format.height = settings.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Stream: failed to set RGB3 on {}: {}", path, err);
                format.fourcc = v4l::FourCC::new(b"YUYV");
                device
                    .set_format(&format)
                    .map_err(|err| AcquireError::from_io(path, &err))?
            }
        };
        let pixel_format = match &format.fourcc.repr {
            b"RGB3" => PixelFormat::Rgb24,
            b"YUYV" => PixelFormat::Yuyv,
            other => {
                return Err(AcquireError::Io {
                    device: path.to_string(),
                    message: format!(
                        "unsupported pixel format {}",
                        String::from_utf8_lossy(other)
                    ),
                })
            }
        };

        if settings.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(settings.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Stream: failed to set fps on {}: {}", path, err);
            }
        }

        let handle = device.handle();
        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
            },
        }
        .try_build()
        .map_err(|err| AcquireError::from_io(path, &err))?;

        log::info!(
            "V4l2Stream: opened {} ({}x{} {:?})",
            path,
            format.width,
            format.height,
            pixel_format
        );
        Ok(Self {
            device_id: path.to_string(),
            state: Some(state),
            handle: Some(handle),
            size: Dimensions::new(format.width, format.height),
            format: pixel_format,
            target_fps: settings.target_fps,
            frame_count: 0,
            last_frame_at: None,
        })
    }

    /// Gap after which a silent device is considered gone.
    fn stall_grace(&self) -> Duration {
        let base_ms = if self.target_fps == 0 {
            2_000
        } else {
            (1000 / self.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl VideoStream for V4l2Stream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn negotiated(&self) -> Dimensions {
        self.size
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let state = self
            .state
            .as_mut()
            .ok_or_else(|| anyhow!("v4l2 stream {} is stopped", self.device_id))?;
        let captured = state
            .with_stream_mut(|stream| -> std::io::Result<Vec<u8>> {
                let (buf, meta) = stream.next()?;
                let used = (meta.bytesused as usize).min(buf.len());
                Ok(buf[..used].to_vec())
            })
            .with_context(|| format!("capture v4l2 frame from {}", self.device_id))?;
        if captured.is_empty() {
            // Driver handed back an empty buffer; no decoded frame yet.
            if let Some(last) = self.last_frame_at {
                if last.elapsed() > self.stall_grace() {
                    return Err(anyhow!("v4l2 stream {} stalled", self.device_id));
                }
            }
            return Ok(None);
        }

        let rgb = normalize_to_rgb(&captured, self.size.width, self.size.height, self.format)?;
        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Ok(Some(Frame::new(
            rgb,
            self.size.width,
            self.size.height,
            self.frame_count,
        )))
    }

    fn frame_pending(&mut self) -> Result<bool> {
        let Some(handle) = self.handle.as_ref() else {
            return Ok(false);
        };
        let ready = handle
            .poll(POLL_READABLE, 0)
            .with_context(|| format!("poll v4l2 device {}", self.device_id))?;
        Ok(ready > 0)
    }

    fn stop(&mut self) {
        // The device fd closes once the last handle is gone.
        self.handle = None;
        if self.state.take().is_some() {
            log::info!(
                "V4l2Stream: stopped {} after {} frames",
                self.device_id,
                self.frame_count
            );
        }
    }

    fn is_stopped(&self) -> bool {
        self.state.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_path_pattern_matches_video_nodes() -> Result<()> {
        let backend = V4l2Backend::new()?;
        assert!(backend.is_device_path("/dev/video0"));
        assert!(backend.is_device_path("/dev/video12"));
        assert!(!backend.is_device_path("/dev/video"));
        assert!(!backend.is_device_path("stub://front_camera"));
        Ok(())
    }

    #[test]
    fn open_rejects_non_device_ids() -> Result<()> {
        let mut backend = V4l2Backend::new()?;
        let err = backend
            .open(&DeviceInfo::new("cam1", "Camera"), &CaptureSettings::default())
            .err();
        assert_eq!(err, Some(AcquireError::NotFound("cam1".to_string())));
        Ok(())
    }
}
