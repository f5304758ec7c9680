use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::Detector;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

const STUB_LABELS: &[&str] = &["person", "cup", "bottle", "cell phone", "book", "chair"];

/// Stub backend for demos and tests.
///
/// Derives one deterministic detection from a SHA-256 of the pixels: identical
/// frames always produce identical output. Scores land in 0.5..=1.0 so roughly
/// a third of frames fall under the default threshold.
pub struct StubDetector {
    calls: u64,
}

impl StubDetector {
    pub fn new() -> Self {
        Self { calls: 0 }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.calls += 1;
        if frame.width == 0 || frame.height == 0 {
            return Ok(Vec::new());
        }

        let hash: [u8; 32] = Sha256::digest(frame.pixels()).into();
        let label = STUB_LABELS[hash[0] as usize % STUB_LABELS.len()];
        let score = 0.5 + (hash[1] as f32 / 255.0) * 0.5;

        let width = frame.width as f32;
        let height = frame.height as f32;
        let box_w = width * (0.2 + (hash[2] as f32 / 255.0) * 0.3);
        let box_h = height * (0.2 + (hash[3] as f32 / 255.0) * 0.3);
        let x = (width - box_w) * (hash[4] as f32 / 255.0);
        let y = (height - box_h) * (hash[5] as f32 / 255.0);

        Ok(vec![Detection::new(
            BoundingBox::new(x.floor(), y.floor(), box_w.floor(), box_h.floor()),
            label,
            score,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_detector_is_deterministic() -> Result<()> {
        let mut detector = StubDetector::new();
        let a = detector.detect(&Frame::filled(64, 48, 3, 1))?;
        let b = detector.detect(&Frame::filled(64, 48, 3, 2))?;
        assert_eq!(a, b);
        assert_eq!(detector.calls(), 2);
        Ok(())
    }

    #[test]
    fn stub_detection_stays_inside_frame() -> Result<()> {
        let mut detector = StubDetector::new();
        for value in 0..32u8 {
            let frame = Frame::filled(640, 480, value, value as u64);
            let detections = detector.detect(&frame)?;
            assert_eq!(detections.len(), 1);
            let d = &detections[0];
            assert!(d.bbox.x >= 0.0 && d.bbox.y >= 0.0);
            assert!(d.bbox.x + d.bbox.width <= 640.0);
            assert!(d.bbox.y + d.bbox.height <= 480.0);
            assert!((0.5..=1.0).contains(&d.score));
        }
        Ok(())
    }

    #[test]
    fn stub_detector_ignores_empty_frames() -> Result<()> {
        let mut detector = StubDetector::new();
        let detections = detector.detect(&Frame::new(Vec::new(), 0, 0, 0))?;
        assert!(detections.is_empty());
        Ok(())
    }
}
