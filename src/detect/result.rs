/// Default confidence cut-off. Detections must score strictly above it.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.66;

/// Axis-aligned rectangle in surface pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from the `[x, y, width, height]` layout detectors commonly return.
    pub fn from_xywh(bbox: [f32; 4]) -> Self {
        Self::new(bbox[0], bbox[1], bbox[2], bbox[3])
    }
}

/// One labeled rectangle produced by a detector for a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: String,
    /// Confidence in 0.0..=1.0.
    pub score: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, label: impl Into<String>, score: f32) -> Self {
        Self {
            bbox,
            label: label.into(),
            score,
        }
    }

    /// Rounded confidence percentage used for labels.
    pub fn percent(&self) -> u32 {
        (self.score.clamp(0.0, 1.0) * 100.0).round() as u32
    }
}

/// Keep detections scoring strictly above `threshold`, preserving order.
///
/// NaN scores never pass.
pub fn filter_confident(detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.score > threshold)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, score: f32) -> Detection {
        Detection::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), label, score)
    }

    #[test]
    fn filter_is_strictly_greater_than_threshold() {
        let kept = filter_confident(
            vec![det("a", 0.66), det("b", 0.661), det("c", 0.2), det("d", 1.0)],
            DEFAULT_CONFIDENCE_THRESHOLD,
        );
        let labels: Vec<_> = kept.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "d"]);
    }

    #[test]
    fn filter_drops_nan_scores() {
        let kept = filter_confident(vec![det("nan", f32::NAN)], 0.0);
        assert!(kept.is_empty());
    }

    #[test]
    fn percent_rounds_to_nearest() {
        assert_eq!(det("cup", 0.9).percent(), 90);
        assert_eq!(det("cup", 0.876).percent(), 88);
        assert_eq!(det("cup", 1.4).percent(), 100);
    }

    #[test]
    fn bbox_from_xywh_keeps_order() {
        let bbox = BoundingBox::from_xywh([10.0, 20.0, 100.0, 50.0]);
        assert_eq!(bbox, BoundingBox::new(10.0, 20.0, 100.0, 50.0));
    }
}
