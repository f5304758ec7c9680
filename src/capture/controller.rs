use anyhow::Result;

use super::device::{CameraBackend, CaptureSettings, DeviceInfo};
use super::error::AcquireError;
use super::surface::VideoSurface;
use crate::publish::PublishedSet;

/// Identifier of one capture session. Increases with every successful acquire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Owns the camera backend, the device selection and the display surface.
///
/// At most one session is active. Acquiring again stops the previous stream and
/// clears published detections before the new device is opened.
pub struct CaptureController {
    backend: Box<dyn CameraBackend>,
    settings: CaptureSettings,
    selected: Option<DeviceInfo>,
    surface: VideoSurface,
    session: Option<SessionId>,
    sessions_started: u64,
}

impl CaptureController {
    pub fn new<B: CameraBackend + 'static>(backend: B, settings: CaptureSettings) -> Self {
        Self::from_boxed(Box::new(backend), settings)
    }

    pub fn from_boxed(backend: Box<dyn CameraBackend>, settings: CaptureSettings) -> Self {
        Self {
            backend,
            settings,
            selected: None,
            surface: VideoSurface::new(),
            session: None,
            sessions_started: 0,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Cameras the backend currently offers.
    pub fn devices(&self) -> Result<Vec<DeviceInfo>> {
        self.backend.devices()
    }

    /// Select a device by id. The id must be present in the catalog.
    pub fn select(&mut self, device_id: &str) -> std::result::Result<&DeviceInfo, AcquireError> {
        let devices = self.backend.devices().map_err(|e| AcquireError::Io {
            device: device_id.to_string(),
            message: format!("device enumeration failed: {}", e),
        })?;
        let device = devices
            .into_iter()
            .find(|d| d.id == device_id)
            .ok_or_else(|| AcquireError::NotFound(device_id.to_string()))?;
        log::info!("capture: selected {} ({})", device.id, device.label);
        Ok(self.selected.insert(device))
    }

    pub fn selected(&self) -> Option<&DeviceInfo> {
        self.selected.as_ref()
    }

    /// Acquire the selected device and attach it to the surface.
    ///
    /// Downstream state is reset first: the previous stream is stopped, the
    /// surface reports zero dimensions and `published` is cleared, so detections
    /// from an earlier device never outlive a switch.
    pub fn acquire(
        &mut self,
        published: &mut PublishedSet,
    ) -> std::result::Result<SessionId, AcquireError> {
        let device = self
            .selected
            .clone()
            .ok_or(AcquireError::NoDeviceSelected)?;

        self.release();
        published.clear();

        let stream = self.backend.open(&device, &self.settings).map_err(|e| {
            log::warn!("capture: {}", e);
            e
        })?;
        self.surface.attach(stream);

        self.sessions_started += 1;
        let session = SessionId(self.sessions_started);
        self.session = Some(session);
        log::info!("capture: {} started on {}", session, device.id);
        Ok(session)
    }

    /// Stop the active stream, if any.
    pub fn release(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("capture: {} released", session);
        }
        self.surface.detach();
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Session active and the surface has decoded a non-empty frame.
    pub fn is_ready(&self) -> bool {
        self.session.is_some() && self.surface.is_attached() && self.surface.dimensions().is_valid()
    }

    pub fn surface(&self) -> &VideoSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut VideoSurface {
        &mut self.surface
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.release();
    }
}
