use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::CaptureSettings;
use crate::detect::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::overlay::DEFAULT_LABEL_OFFSET;
use crate::pipeline::LoopSettings;

const DEFAULT_DEVICE: &str = "stub://front_camera";
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_WARMUP_FRAMES: u32 = 3;
const DEFAULT_REFRESH_MS: u64 = 16;
const DEFAULT_BACKOFF_MS: u64 = 1_000;

#[derive(Debug, Deserialize, Default)]
struct LiveDetectConfigFile {
    capture: Option<CaptureConfigFile>,
    detection: Option<DetectionConfigFile>,
    timing: Option<TimingConfigFile>,
    overlay: Option<OverlayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    warmup_frames: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct TimingConfigFile {
    refresh_ms: Option<u64>,
    backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    label_offset: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct LiveDetectConfig {
    pub device: String,
    pub capture: CaptureSettings,
    pub detection: DetectionSettings,
    pub refresh_interval: Duration,
    pub backoff: Duration,
    pub label_offset: f32,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    /// Registered detector name ("stub", "tract").
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub threshold: f32,
}

impl LiveDetectConfig {
    /// Defaults, then the file named by `LIVE_DETECT_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LIVE_DETECT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: LiveDetectConfigFile) -> Self {
        let capture = file.capture.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let timing = file.timing.unwrap_or_default();
        let overlay = file.overlay.unwrap_or_default();

        Self {
            device: capture
                .device
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            capture: CaptureSettings {
                width: capture.width.unwrap_or(DEFAULT_WIDTH),
                height: capture.height.unwrap_or(DEFAULT_HEIGHT),
                target_fps: capture.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
                warmup_frames: capture.warmup_frames.unwrap_or(DEFAULT_WARMUP_FRAMES),
            },
            detection: DetectionSettings {
                backend: detection
                    .backend
                    .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                model_path: detection.model_path,
                threshold: detection.threshold.unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            },
            refresh_interval: Duration::from_millis(
                timing.refresh_ms.unwrap_or(DEFAULT_REFRESH_MS),
            ),
            backoff: Duration::from_millis(timing.backoff_ms.unwrap_or(DEFAULT_BACKOFF_MS)),
            label_offset: overlay.label_offset.unwrap_or(DEFAULT_LABEL_OFFSET),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("LIVE_DETECT_DEVICE") {
            if !device.trim().is_empty() {
                self.device = device.trim().to_string();
            }
        }
        if let Ok(backend) = std::env::var("LIVE_DETECT_BACKEND") {
            if !backend.trim().is_empty() {
                self.detection.backend = backend.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("LIVE_DETECT_MODEL") {
            if !path.trim().is_empty() {
                self.detection.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(threshold) = std::env::var("LIVE_DETECT_THRESHOLD") {
            self.detection.threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("LIVE_DETECT_THRESHOLD must be a number between 0 and 1"))?;
        }
        if let Ok(refresh) = std::env::var("LIVE_DETECT_REFRESH_MS") {
            let ms: u64 = refresh.trim().parse().map_err(|_| {
                anyhow!("LIVE_DETECT_REFRESH_MS must be an integer number of milliseconds")
            })?;
            self.refresh_interval = Duration::from_millis(ms);
        }
        if let Ok(backoff) = std::env::var("LIVE_DETECT_BACKOFF_MS") {
            let ms: u64 = backoff.trim().parse().map_err(|_| {
                anyhow!("LIVE_DETECT_BACKOFF_MS must be an integer number of milliseconds")
            })?;
            self.backoff = Duration::from_millis(ms);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(anyhow!("capture device must not be empty"));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!(
                "capture resolution must be non-zero (got {}x{})",
                self.capture.width,
                self.capture.height
            ));
        }
        if !(0.0..=1.0).contains(&self.detection.threshold) {
            return Err(anyhow!(
                "detection threshold must be within 0..=1 (got {})",
                self.detection.threshold
            ));
        }
        if self.refresh_interval.is_zero() {
            return Err(anyhow!("refresh interval must be greater than zero"));
        }
        if self.backoff.is_zero() {
            return Err(anyhow!("retry backoff must be greater than zero"));
        }
        Ok(())
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            threshold: self.detection.threshold,
            refresh_interval: self.refresh_interval,
            backoff: self.backoff,
        }
    }
}

impl Default for LiveDetectConfig {
    fn default() -> Self {
        Self::from_file(LiveDetectConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<LiveDetectConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
