//! Live object detection overlay.
//!
//! This crate runs an object detector against a live camera stream and keeps an
//! overlay of labeled boxes in sync with what the detector last saw.
//!
//! # Architecture
//!
//! Data flows one way: device → display surface → detection loop → overlay.
//!
//! 1. **Capture**: a `CaptureController` selects a device from a catalog, opens a
//!    stream and attaches it to a `VideoSurface`. The surface is ready only once it
//!    has decoded a frame with non-zero dimensions.
//! 2. **Detection loop**: once per display refresh, the `DetectionLoop` submits the
//!    current frame to an injected `Detector`, keeps detections scoring above the
//!    threshold and publishes them as one immutable set. A failed detection
//!    suspends the loop for a fixed backoff.
//! 3. **Overlay**: the `OverlayRenderer` turns each published set into a complete
//!    `OverlayFrame` that replaces the previous one.
//!
//! # Module Structure
//!
//! - `frame`: decoded frames and dimensions
//! - `capture`: camera backends, display surface, session control
//! - `detect`: detector trait, results, backend registry
//! - `publish`: single-producer detection hand-off
//! - `pipeline`: the detection loop state machine
//! - `overlay`: overlay rendering and sinks
//! - `config`: file + environment configuration

pub mod capture;
pub mod config;
pub mod detect;
pub mod frame;
pub mod overlay;
pub mod pipeline;
pub mod publish;
pub mod ui;

pub use capture::{
    AcquireError, CameraBackend, CaptureController, CaptureSettings, DeviceInfo, SessionId,
    SyntheticBackend, VideoSurface,
};
pub use config::LiveDetectConfig;
pub use detect::{BoundingBox, Detection, Detector, DetectorRegistry, StubDetector};
pub use frame::{Dimensions, Frame};
pub use overlay::{OverlayElement, OverlayFrame, OverlayLayer, OverlayRenderer, OverlaySink};
pub use pipeline::{
    CancelToken, DetectionLoop, LoopSettings, LoopState, ManualClock, RefreshClock, SystemClock,
    TickOutcome,
};
pub use publish::{PublishedSet, Snapshot};
