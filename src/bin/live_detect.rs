//! live_detect - camera object detection with a live overlay
//!
//! This binary:
//! 1. Loads configuration (file + environment, overridden by flags)
//! 2. Registers and warms up the selected detector
//! 3. Acquires the camera and runs the detection loop until Ctrl-C
//! 4. Logs every overlay change

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use live_detect::capture::{backend_for_device, CaptureController};
use live_detect::config::LiveDetectConfig;
use live_detect::detect::{DetectorRegistry, StubDetector};
use live_detect::overlay::{LogOverlay, OverlayRenderer};
use live_detect::pipeline::{CancelToken, DetectionLoop};
use live_detect::ui::{Ui, UiMode};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Camera id (e.g. /dev/video0 or stub://front_camera). Overrides LIVE_DETECT_DEVICE.
    #[arg(long)]
    device: Option<String>,
    /// List cameras offered by the backend for the configured device and exit.
    #[arg(long)]
    list_devices: bool,
    /// Detector backend name.
    #[arg(long)]
    backend: Option<String>,
    /// ONNX model path (tract backend).
    #[arg(long)]
    model: Option<PathBuf>,
    /// Confidence cut-off; detections must score above it.
    #[arg(long)]
    threshold: Option<f32>,
    /// Stop after this many detection calls.
    #[arg(long)]
    frames: Option<u64>,
    /// Progress output style.
    #[arg(long, value_enum, default_value_t = UiMode::Auto)]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = LiveDetectConfig::load()?;
    if let Some(device) = args.device {
        cfg.device = device;
    }
    if let Some(backend) = args.backend {
        cfg.detection.backend = backend;
    }
    if let Some(model) = args.model {
        cfg.detection.model_path = Some(model);
    }
    if let Some(threshold) = args.threshold {
        cfg.detection.threshold = threshold;
    }
    cfg.validate()?;

    let ui = Ui::new(
        args.ui,
        std::io::stderr().is_terminal(),
        !std::io::stdout().is_terminal(),
    );
    let capture =
        CaptureController::from_boxed(backend_for_device(&cfg.device)?, cfg.capture.clone());

    if args.list_devices {
        for device in capture.devices()? {
            println!("{}\t{}", device.id, device.label);
        }
        return Ok(());
    }

    let detector = {
        let stage = ui.stage("load detector");
        match build_registry(&cfg).and_then(|mut registry| {
            registry.set_default(&cfg.detection.backend)?;
            registry.take_default()
        }) {
            Ok(detector) => {
                drop(stage);
                detector
            }
            Err(err) => {
                stage.fail(&err.to_string());
                return Err(err);
            }
        }
    };

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;

    let mut detection_loop = DetectionLoop::new(capture, detector, cfg.loop_settings())
        .with_cancel_token(cancel.clone());
    detection_loop.warm_up_detector()?;
    if cancel.is_cancelled() {
        log::info!("live_detect: cancelled before the camera was acquired");
        return Ok(());
    }

    {
        let stage = ui.stage("acquire camera");
        if let Err(err) = detection_loop.start(&cfg.device) {
            stage.fail(&err.to_string());
            return Err(anyhow!(err));
        }
    }

    log::info!(
        "live_detect running: device={} detector={} threshold={} refresh={:?} backoff={:?}",
        cfg.device,
        detection_loop.detector_name(),
        cfg.detection.threshold,
        cfg.refresh_interval,
        cfg.backoff
    );

    let renderer = OverlayRenderer::new().with_label_offset(cfg.label_offset);
    let mut sink = LogOverlay::new();
    let stats = detection_loop.run(&renderer, &mut sink, args.frames);
    detection_loop.stop();

    log::info!(
        "live_detect stopped: frames={} failures={} not_ready_ticks={}",
        stats.frames_submitted,
        stats.detection_failures,
        stats.not_ready_ticks
    );
    Ok(())
}

fn build_registry(cfg: &LiveDetectConfig) -> Result<DetectorRegistry> {
    let mut registry = DetectorRegistry::new();
    registry.register(StubDetector::new());

    #[cfg(feature = "backend-tract")]
    {
        if let Some(model_path) = &cfg.detection.model_path {
            let detector = live_detect::detect::TractDetector::new(
                model_path,
                cfg.capture.width,
                cfg.capture.height,
            )?;
            registry.register(detector);
        }
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        if cfg.detection.model_path.is_some() {
            log::warn!("model path ignored: built without the backend-tract feature");
        }
    }

    if !registry.contains(&cfg.detection.backend) {
        return Err(anyhow!(
            "detector '{}' unavailable (registered: {})",
            cfg.detection.backend,
            registry.list().join(", ")
        ));
    }
    Ok(registry)
}
