//! Synthetic camera backend.
//!
//! Serves `stub://` devices with generated frames. Used by tests and by the binary
//! when no real camera is configured. Each stream spends `warmup_frames` pulls
//! without a decoded frame, the way a freshly attached camera does, before it
//! starts producing images at the configured resolution.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::device::{CameraBackend, CaptureSettings, DeviceInfo, VideoStream};
use super::error::AcquireError;
use crate::frame::{Dimensions, Frame};

/// Synthetic camera catalog and opener.
pub struct SyntheticBackend {
    devices: Vec<DeviceInfo>,
    denied: HashSet<String>,
    busy: HashSet<String>,
    /// Streams opened and not yet stopped.
    active: Arc<AtomicUsize>,
    /// Frames each stream yields before ending (None = endless).
    frame_limit: Option<u64>,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self::with_devices(vec![
            DeviceInfo::new("stub://front_camera", "Synthetic front camera"),
            DeviceInfo::new("stub://desk_camera", "Synthetic desk camera"),
            DeviceInfo::new("stub://denied", "Synthetic camera (permission denied)"),
            DeviceInfo::new("stub://busy", "Synthetic camera (in use)"),
        ])
        .deny("stub://denied")
        .busy("stub://busy")
    }

    pub fn with_devices(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices,
            denied: HashSet::new(),
            busy: HashSet::new(),
            active: Arc::new(AtomicUsize::new(0)),
            frame_limit: None,
        }
    }

    /// Opening `id` fails with `PermissionDenied`.
    pub fn deny(mut self, id: &str) -> Self {
        self.denied.insert(id.to_string());
        self
    }

    /// Opening `id` fails with `Busy`.
    pub fn busy(mut self, id: &str) -> Self {
        self.busy.insert(id.to_string());
        self
    }

    /// Streams end after `frames` decoded frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Shared counter of streams that are open and not stopped.
    pub fn active_streams(&self) -> Arc<AtomicUsize> {
        self.active.clone()
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for SyntheticBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.devices.clone())
    }

    fn open(
        &mut self,
        device: &DeviceInfo,
        settings: &CaptureSettings,
    ) -> std::result::Result<Box<dyn VideoStream>, AcquireError> {
        if !self.devices.iter().any(|d| d.id == device.id) {
            return Err(AcquireError::NotFound(device.id.clone()));
        }
        if self.denied.contains(&device.id) {
            return Err(AcquireError::PermissionDenied(device.id.clone()));
        }
        if self.busy.contains(&device.id) {
            return Err(AcquireError::Busy(device.id.clone()));
        }
        if settings.width == 0 || settings.height == 0 {
            return Err(AcquireError::Io {
                device: device.id.clone(),
                message: format!(
                    "unsupported resolution {}x{}",
                    settings.width, settings.height
                ),
            });
        }

        self.active.fetch_add(1, Ordering::SeqCst);
        log::info!(
            "SyntheticBackend: opened {} ({}x{}, {} warm-up pulls)",
            device.id,
            settings.width,
            settings.height,
            settings.warmup_frames
        );
        Ok(Box::new(SyntheticStream {
            device_id: device.id.clone(),
            size: Dimensions::new(settings.width, settings.height),
            warmup_remaining: settings.warmup_frames,
            frame_count: 0,
            frame_limit: self.frame_limit,
            scene_state: 0,
            stopped: false,
            active: self.active.clone(),
        }))
    }
}

/// Generated stream for one synthetic device.
pub struct SyntheticStream {
    device_id: String,
    size: Dimensions,
    warmup_remaining: u32,
    frame_count: u64,
    frame_limit: Option<u64>,
    /// Simulated scene; changes occasionally to move the stub detections around.
    scene_state: u8,
    stopped: bool,
    active: Arc<AtomicUsize>,
}

impl SyntheticStream {
    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.size.width as usize) * (self.size.height as usize) * 3;

        if rand::random::<u8>() < 16 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 / 3 + self.scene_state as u64 * 37) % 256) as u8;
        }
        pixels
    }
}

impl VideoStream for SyntheticStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn negotiated(&self) -> Dimensions {
        self.size
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.stopped {
            return Err(anyhow!("stream {} is stopped", self.device_id));
        }
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return Ok(None);
        }
        if let Some(limit) = self.frame_limit {
            if self.frame_count >= limit {
                return Err(anyhow!(
                    "stream {} ended after {} frames",
                    self.device_id,
                    limit
                ));
            }
        }

        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Ok(Some(Frame::new(
            pixels,
            self.size.width,
            self.size.height,
            self.frame_count,
        )))
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.active.fetch_sub(1, Ordering::SeqCst);
            log::info!("SyntheticStream: stopped {}", self.device_id);
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}
