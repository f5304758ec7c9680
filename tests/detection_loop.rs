use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use live_detect::capture::{CaptureController, CaptureSettings, DeviceInfo, SyntheticBackend};
use live_detect::detect::{BoundingBox, Detection, Detector};
use live_detect::frame::{Dimensions, Frame};
use live_detect::overlay::{OverlayElement, OverlayLayer, OverlayRenderer};
use live_detect::pipeline::{
    CancelToken, DetectionLoop, LoopSettings, LoopState, ManualClock, RefreshClock, TickOutcome,
};

/// What a scripted detector saw on each call.
#[derive(Default)]
struct CallLog {
    calls: Vec<(Instant, Dimensions)>,
}

enum Step {
    Return(Vec<Detection>),
    Fail,
    /// Cancel the loop while "inference" is running, then return.
    CancelThenReturn(CancelToken, Vec<Detection>),
}

/// Detector that replays `steps` in order, repeating the last one.
struct ScriptedDetector {
    clock: ManualClock,
    latency: Duration,
    steps: Vec<Step>,
    log: Arc<Mutex<CallLog>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedDetector {
    fn new(clock: &ManualClock, steps: Vec<Step>) -> Self {
        Self {
            clock: clock.clone(),
            latency: Duration::ZERO,
            steps,
            log: Arc::new(Mutex::new(CallLog::default())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let index = {
            let mut log = self.log.lock().unwrap();
            log.calls.push((self.clock.now(), frame.dimensions()));
            (log.calls.len() - 1).min(self.steps.len() - 1)
        };
        self.clock.advance(self.latency);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.steps[index] {
            Step::Return(detections) => Ok(detections.clone()),
            Step::Fail => Err(anyhow!("model runtime error")),
            Step::CancelThenReturn(cancel, detections) => {
                cancel.cancel();
                Ok(detections.clone())
            }
        }
    }
}

fn cup(score: f32) -> Detection {
    Detection::new(BoundingBox::new(10.0, 20.0, 100.0, 50.0), "cup", score)
}

fn cam1_loop(
    clock: &ManualClock,
    detector: ScriptedDetector,
    warmup_frames: u32,
) -> DetectionLoop<ManualClock> {
    let backend = SyntheticBackend::with_devices(vec![DeviceInfo::new("cam1", "Camera 1")]);
    let settings = CaptureSettings {
        warmup_frames,
        ..CaptureSettings::default()
    };
    DetectionLoop::with_clock(
        CaptureController::new(backend, settings),
        Box::new(detector),
        LoopSettings::default(),
        clock.clone(),
    )
}

#[test]
fn first_detection_sees_a_full_resolution_frame() -> Result<()> {
    let clock = ManualClock::new();
    let detector = ScriptedDetector::new(&clock, vec![Step::Return(vec![])]);
    let log = detector.log.clone();
    let mut detection_loop = cam1_loop(&clock, detector, 0);

    assert_eq!(detection_loop.state(), LoopState::Idle);
    let session = detection_loop.start("cam1")?;
    assert_eq!(detection_loop.state(), LoopState::Acquiring { session });

    assert!(matches!(
        detection_loop.tick(),
        TickOutcome::Detected { published: 0, .. }
    ));
    assert_eq!(detection_loop.state(), LoopState::Running { session });

    let log = log.lock().unwrap();
    assert_eq!(log.calls.len(), 1);
    assert_eq!(log.calls[0].1, Dimensions::new(640, 480));
    Ok(())
}

#[test]
fn confident_cup_renders_one_label_and_highlight() -> Result<()> {
    let clock = ManualClock::new();
    let detector = ScriptedDetector::new(
        &clock,
        vec![Step::Return(vec![
            cup(0.9),
            Detection::new(BoundingBox::new(200.0, 200.0, 40.0, 40.0), "person", 0.5),
        ])],
    );
    let mut detection_loop = cam1_loop(&clock, detector, 0);
    detection_loop.start("cam1")?;

    let mut layer = OverlayLayer::new();
    detection_loop.run(&OverlayRenderer::new(), &mut layer, Some(1));

    let frame = layer.current();
    assert_eq!(
        frame.elements(),
        &[
            OverlayElement::Highlight {
                left: 10.0,
                top: 20.0,
                width: 100.0,
                height: 50.0,
            },
            OverlayElement::Label {
                left: 10.0,
                top: 10.0,
                width: 100.0,
                text: "cup - with 90% confidence.".to_string(),
            },
        ]
    );
    Ok(())
}

#[test]
fn no_detection_until_surface_decodes_a_frame() -> Result<()> {
    let clock = ManualClock::new();
    let detector = ScriptedDetector::new(&clock, vec![Step::Return(vec![cup(0.9)])]);
    let log = detector.log.clone();
    let mut detection_loop = cam1_loop(&clock, detector, 5);
    let session = detection_loop.start("cam1")?;

    for _ in 0..5 {
        assert_eq!(detection_loop.tick(), TickOutcome::NotReady);
        assert_eq!(detection_loop.capture().surface().dimensions(), Dimensions::ZERO);
        clock.advance(Duration::from_millis(16));
    }
    assert!(log.lock().unwrap().calls.is_empty());
    assert_eq!(detection_loop.state(), LoopState::Acquiring { session });
    assert_eq!(detection_loop.stats().not_ready_ticks, 5);

    assert!(matches!(detection_loop.tick(), TickOutcome::Detected { .. }));
    assert_eq!(log.lock().unwrap().calls.len(), 1);
    Ok(())
}

#[test]
fn failed_detection_waits_for_backoff_before_retrying() -> Result<()> {
    let clock = ManualClock::new();
    let detector = ScriptedDetector::new(
        &clock,
        vec![Step::Return(vec![cup(0.9)]), Step::Fail, Step::Return(vec![cup(0.8)])],
    );
    let log = detector.log.clone();
    let mut detection_loop = cam1_loop(&clock, detector, 0);
    detection_loop.start("cam1")?;

    let mut layer = OverlayLayer::new();
    let stats = detection_loop.run(&OverlayRenderer::new(), &mut layer, Some(3));
    assert_eq!(stats.frames_submitted, 3);
    assert_eq!(stats.detection_failures, 1);

    let log = log.lock().unwrap();
    let failed_at = log.calls[1].0;
    let retried_at = log.calls[2].0;
    assert!(retried_at.duration_since(failed_at) >= Duration::from_secs(1));

    // The overlay from before the failure stayed up until the retry replaced it.
    assert_eq!(layer.passes(), 2);
    assert!(layer
        .current()
        .labels()
        .any(|label| matches!(label, OverlayElement::Label { text, .. } if text == "cup - with 80% confidence.")));
    Ok(())
}

#[test]
fn slow_detector_never_overlaps_calls() -> Result<()> {
    let clock = ManualClock::new();
    let detector = ScriptedDetector::new(&clock, vec![Step::Return(vec![cup(0.9)])])
        .with_latency(Duration::from_millis(100));
    let max_in_flight = detector.max_in_flight.clone();
    let log = detector.log.clone();
    let mut detection_loop = cam1_loop(&clock, detector, 0);
    detection_loop.start("cam1")?;

    let start = clock.now();
    let stats = detection_loop.run(&OverlayRenderer::new(), &mut OverlayLayer::new(), Some(10));

    assert_eq!(stats.frames_submitted, 10);
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    // Ten 100ms calls cannot fit in less than a second of virtual time.
    assert!(clock.now().duration_since(start) >= Duration::from_millis(1000));
    let log = log.lock().unwrap();
    for pair in log.calls.windows(2) {
        assert!(pair[1].0.duration_since(pair[0].0) >= Duration::from_millis(100));
    }
    Ok(())
}

#[test]
fn scores_at_or_below_threshold_render_nothing() -> Result<()> {
    let clock = ManualClock::new();
    let detector = ScriptedDetector::new(
        &clock,
        vec![Step::Return(vec![cup(0.66), cup(0.3), cup(0.0)])],
    );
    let mut detection_loop = cam1_loop(&clock, detector, 0);
    detection_loop.start("cam1")?;

    let mut layer = OverlayLayer::new();
    let stats = detection_loop.run(&OverlayRenderer::new(), &mut layer, Some(2));
    assert_eq!(stats.last_published, 0);
    assert!(layer.current().is_empty());
    Ok(())
}

#[test]
fn result_arriving_after_cancel_is_discarded() -> Result<()> {
    let clock = ManualClock::new();
    let cancel = CancelToken::new();
    let detector = ScriptedDetector::new(
        &clock,
        vec![
            Step::Return(vec![cup(0.9)]),
            Step::CancelThenReturn(cancel.clone(), vec![cup(0.95), cup(0.99)]),
        ],
    );
    let backend = SyntheticBackend::with_devices(vec![DeviceInfo::new("cam1", "Camera 1")]);
    let active = backend.active_streams();
    let settings = CaptureSettings {
        warmup_frames: 0,
        ..CaptureSettings::default()
    };
    let mut detection_loop = DetectionLoop::with_clock(
        CaptureController::new(backend, settings),
        Box::new(detector),
        LoopSettings::default(),
        clock.clone(),
    )
    .with_cancel_token(cancel);
    detection_loop.start("cam1")?;

    let mut layer = OverlayLayer::new();
    let stats = detection_loop.run(&OverlayRenderer::new(), &mut layer, None);

    assert_eq!(stats.frames_submitted, 2);
    assert_eq!(detection_loop.state(), LoopState::Idle);
    assert!(detection_loop.snapshot().is_empty());
    assert_eq!(active.load(Ordering::SeqCst), 0);
    // The late two-cup result never reached the overlay; teardown cleared it.
    assert!(layer.current().is_empty());
    assert!(!layer
        .current()
        .labels()
        .any(|label| matches!(label, OverlayElement::Label { text, .. } if text.contains("99%"))));
    Ok(())
}

#[test]
fn switching_devices_clears_previous_overlay() -> Result<()> {
    let clock = ManualClock::new();
    let detector = ScriptedDetector::new(&clock, vec![Step::Return(vec![cup(0.9)])]);
    let backend = SyntheticBackend::with_devices(vec![
        DeviceInfo::new("cam1", "Camera 1"),
        DeviceInfo::new("cam2", "Camera 2"),
    ]);
    let active = backend.active_streams();
    let settings = CaptureSettings {
        warmup_frames: 1,
        ..CaptureSettings::default()
    };
    let mut detection_loop = DetectionLoop::with_clock(
        CaptureController::new(backend, settings),
        Box::new(detector),
        LoopSettings::default(),
        clock.clone(),
    );

    let first = detection_loop.start("cam1")?;
    detection_loop.tick();
    detection_loop.tick();
    assert_eq!(detection_loop.snapshot().len(), 1);

    let second = detection_loop.start("cam2")?;
    assert_ne!(first, second);
    assert_eq!(active.load(Ordering::SeqCst), 1);
    assert!(detection_loop.snapshot().is_empty());
    assert_eq!(detection_loop.state(), LoopState::Acquiring { session: second });
    Ok(())
}
