use std::time::{Duration, Instant};

use anyhow::Result;

use super::cancel::CancelToken;
use super::clock::{RefreshClock, SystemClock};
use crate::capture::{AcquireError, CaptureController, SessionId};
use crate::detect::{filter_confident, Detector, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::overlay::{OverlayRenderer, OverlaySink};
use crate::publish::{PublishedSet, Snapshot};

/// Fixed delay before retrying after a failed detection call.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
/// Display refresh period (~60 Hz).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(16);

/// Tunables for the detection loop.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopSettings {
    /// Detections must score strictly above this to be published.
    pub threshold: f32,
    pub refresh_interval: Duration,
    pub backoff: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// Where the loop is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// No active session.
    Idle,
    /// Session active, surface has not decoded a frame yet.
    Acquiring { session: SessionId },
    /// Surface ready; one detection per refresh.
    Running { session: SessionId },
    /// Last detection failed; nothing is submitted before `resume_at`.
    SuspendedRetry {
        session: SessionId,
        resume_at: Instant,
    },
}

impl LoopState {
    pub fn name(&self) -> &'static str {
        match self {
            LoopState::Idle => "idle",
            LoopState::Acquiring { .. } => "acquiring",
            LoopState::Running { .. } => "running",
            LoopState::SuspendedRetry { .. } => "suspended-retry",
        }
    }

    pub fn session(&self) -> Option<SessionId> {
        match *self {
            LoopState::Idle => None,
            LoopState::Acquiring { session }
            | LoopState::Running { session }
            | LoopState::SuspendedRetry { session, .. } => Some(session),
        }
    }
}

/// Result of one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do: no session, or the loop was cancelled.
    Idle,
    /// Surface has no decoded frame with non-zero size yet. Not a failure.
    NotReady,
    /// Surface is ready but no new frame was decoded since the last tick.
    NoFrame,
    /// A detection ran and `published` detections passed the threshold.
    Detected { published: usize, generation: u64 },
    /// The detection call failed; the loop is suspended until `resume_at`.
    Failed { resume_at: Instant },
    /// Still inside the backoff window.
    Backoff { until: Instant },
    /// The stream ended or the surface went away; the session was torn down.
    Ended,
}

/// Counters for health logging.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Detection calls issued, including failed ones.
    pub frames_submitted: u64,
    pub detection_failures: u64,
    pub consecutive_failures: u64,
    pub not_ready_ticks: u64,
    /// Size of the most recent published set.
    pub last_published: usize,
}

/// Capture → detect → publish loop.
///
/// Runs on one thread, one tick per display refresh. The detector is called
/// synchronously, so a new frame is never submitted while a call is pending and a
/// slow model throttles the loop instead of building a backlog.
pub struct DetectionLoop<C: RefreshClock = SystemClock> {
    capture: CaptureController,
    detector: Box<dyn Detector>,
    published: PublishedSet,
    settings: LoopSettings,
    clock: C,
    cancel: CancelToken,
    state: LoopState,
    stats: LoopStats,
    last_tick_at: Option<Instant>,
}

impl DetectionLoop<SystemClock> {
    pub fn new(
        capture: CaptureController,
        detector: Box<dyn Detector>,
        settings: LoopSettings,
    ) -> Self {
        Self::with_clock(capture, detector, settings, SystemClock)
    }
}

impl<C: RefreshClock> DetectionLoop<C> {
    pub fn with_clock(
        capture: CaptureController,
        detector: Box<dyn Detector>,
        settings: LoopSettings,
        clock: C,
    ) -> Self {
        Self {
            capture,
            detector,
            published: PublishedSet::new(),
            settings,
            clock,
            cancel: CancelToken::new(),
            state: LoopState::Idle,
            stats: LoopStats::default(),
            last_tick_at: None,
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn capture(&self) -> &CaptureController {
        &self.capture
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.published.snapshot()
    }

    pub fn published_generation(&self) -> u64 {
        self.published.generation()
    }

    /// Run the detector's warm-up hook once before the first session.
    pub fn warm_up_detector(&mut self) -> Result<()> {
        self.detector.warm_up()
    }

    /// Select `device_id` and acquire it. Idle → Acquiring.
    ///
    /// An already running session is stopped first. A cancellation left over from
    /// an earlier session is cleared, so holders of the token can cancel the new
    /// one. On failure the loop is Idle and the error is returned; acquisition is
    /// never retried here.
    pub fn start(&mut self, device_id: &str) -> std::result::Result<SessionId, AcquireError> {
        if self.state != LoopState::Idle {
            self.stop();
        }
        if self.cancel.rearm() {
            log::info!("loop: clearing cancellation from previous session");
        }
        self.capture.select(device_id)?;
        let session = self.capture.acquire(&mut self.published)?;
        self.state = LoopState::Acquiring { session };
        self.stats.consecutive_failures = 0;
        self.last_tick_at = None;
        Ok(session)
    }

    /// Tear down the session and clear published detections. Any state → Idle.
    pub fn stop(&mut self) {
        if self.state == LoopState::Idle {
            return;
        }
        log::info!("loop: {} -> idle", self.state.name());
        self.capture.release();
        self.published.clear();
        self.state = LoopState::Idle;
        self.last_tick_at = None;
    }

    /// Perform one step at the current clock time without waiting.
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now();
        self.last_tick_at = Some(now);

        if self.cancel.is_cancelled() {
            self.stop();
            return TickOutcome::Idle;
        }

        let session = match self.state {
            LoopState::Idle => return TickOutcome::Idle,
            LoopState::SuspendedRetry { resume_at, .. } if now < resume_at => {
                return TickOutcome::Backoff { until: resume_at };
            }
            LoopState::SuspendedRetry { session, .. } => {
                log::info!("loop: backoff elapsed, resuming {}", session);
                self.state = LoopState::Running { session };
                session
            }
            LoopState::Acquiring { session } | LoopState::Running { session } => session,
        };

        if let Err(err) = self.capture.surface_mut().refresh() {
            log::warn!("loop: {} ended: {:#}", session, err);
            self.stop();
            return TickOutcome::Ended;
        }

        let dimensions = self.capture.surface().dimensions();
        if !dimensions.is_valid() {
            self.stats.not_ready_ticks += 1;
            log::debug!("loop: surface not ready ({})", dimensions);
            return TickOutcome::NotReady;
        }
        if let LoopState::Acquiring { session } = self.state {
            log::info!("loop: {} surface ready at {}, running", session, dimensions);
            self.state = LoopState::Running { session };
        }

        let Some(frame) = self.capture.surface_mut().take_frame() else {
            return TickOutcome::NoFrame;
        };

        self.stats.frames_submitted += 1;
        log::debug!(
            "loop: submitting frame #{} ({}, {})",
            frame.sequence,
            frame.dimensions(),
            frame.digest_hex()
        );
        let result = self.detector.detect(&frame);
        drop(frame);

        if self.cancel.is_cancelled() {
            // Result arrived after teardown was requested; discard it.
            self.stop();
            return TickOutcome::Idle;
        }

        match result {
            Ok(detections) => {
                let kept = filter_confident(detections, self.settings.threshold);
                let published = kept.len();
                let generation = self.published.publish(kept);
                self.stats.consecutive_failures = 0;
                self.stats.last_published = published;
                TickOutcome::Detected {
                    published,
                    generation,
                }
            }
            Err(err) => {
                self.stats.detection_failures += 1;
                self.stats.consecutive_failures += 1;
                let resume_at = self.clock.now() + self.settings.backoff;
                log::warn!(
                    "loop: detection failed ({} in a row), retrying in {:?}: {:#}",
                    self.stats.consecutive_failures,
                    self.settings.backoff,
                    err
                );
                self.state = LoopState::SuspendedRetry { session, resume_at };
                TickOutcome::Failed { resume_at }
            }
        }
    }

    /// When the tick following `outcome` should run. `None` once the loop is idle.
    pub fn next_deadline(&self, outcome: &TickOutcome) -> Option<Instant> {
        match *outcome {
            TickOutcome::Idle | TickOutcome::Ended => None,
            TickOutcome::Failed { resume_at } => Some(resume_at),
            TickOutcome::Backoff { until } => Some(until),
            TickOutcome::NotReady | TickOutcome::NoFrame | TickOutcome::Detected { .. } => {
                let base = self.last_tick_at.unwrap_or_else(|| self.clock.now());
                Some(base + self.settings.refresh_interval)
            }
        }
    }

    /// Drive ticks until cancelled, the session ends, or `max_frames` detection
    /// calls have been issued. Each new published set is rendered into `sink`.
    pub fn run<S: OverlaySink + ?Sized>(
        &mut self,
        renderer: &OverlayRenderer,
        sink: &mut S,
        max_frames: Option<u64>,
    ) -> LoopStats {
        let mut rendered = self.published.generation();
        loop {
            let outcome = self.tick();

            if let Some(snapshot) = self.published.changed_since(rendered) {
                renderer.render_into(&snapshot.detections, sink);
                rendered = snapshot.generation;
            }

            if max_frames.is_some_and(|max| self.stats.frames_submitted >= max) {
                log::info!(
                    "loop: frame budget of {} reached",
                    self.stats.frames_submitted
                );
                break;
            }
            let Some(deadline) = self.next_deadline(&outcome) else {
                break;
            };
            self.clock.wait_until(deadline);
        }
        self.stats.clone()
    }
}

impl<C: RefreshClock> Drop for DetectionLoop<C> {
    fn drop(&mut self) {
        self.stop();
    }
}
