#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::Detector;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

/// COCO label map as used by TensorFlow SSD exports (1-based ids, with gaps).
const COCO_LABELS: [&str; 91] = [
    "background", "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train",
    "truck", "boat", "traffic light", "fire hydrant", "N/A", "stop sign", "parking meter",
    "bench", "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "N/A", "backpack", "umbrella", "N/A", "N/A", "handbag", "tie", "suitcase",
    "frisbee", "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "N/A", "wine glass", "cup", "fork",
    "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange", "broccoli", "carrot",
    "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant", "bed", "N/A",
    "dining table", "N/A", "N/A", "toilet", "N/A", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "N/A",
    "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Tract-based SSD detector.
///
/// Expects an SSD-style ONNX export taking a `u8[1, H, W, 3]` image and producing
/// `boxes[1, N, 4]` (normalized ymin, xmin, ymax, xmax), `classes[1, N]` and
/// `scores[1, N]` as its first three outputs. Boxes are scaled back to frame pixels.
pub struct TractDetector {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
    max_detections: usize,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference at a fixed input size.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    u8::datum_type(),
                    tvec!(1, height as usize, width as usize, 3),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            max_detections: 20,
        })
    }

    /// Cap the number of detections read from the model output.
    pub fn with_max_detections(mut self, max: usize) -> Self {
        self.max_detections = max;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.width != self.width || frame.height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width,
                frame.height,
                self.width,
                self.height
            ));
        }

        let expected_len = (frame.width as usize)
            .checked_mul(frame.height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if frame.byte_len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                frame.byte_len()
            ));
        }

        let input = tract_ndarray::Array4::from_shape_vec(
            (1, frame.height as usize, frame.width as usize, 3),
            frame.pixels().to_vec(),
        )
        .context("failed to shape input tensor")?;
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>> {
        if outputs.len() < 3 {
            return Err(anyhow!(
                "model produced {} outputs, expected boxes/classes/scores",
                outputs.len()
            ));
        }
        let boxes = outputs[0]
            .to_array_view::<f32>()
            .context("boxes output was not f32")?;
        let classes = outputs[1]
            .to_array_view::<f32>()
            .context("classes output was not f32")?;
        let scores = outputs[2]
            .to_array_view::<f32>()
            .context("scores output was not f32")?;

        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let classes: Vec<f32> = classes.iter().copied().collect();
        let scores: Vec<f32> = scores.iter().copied().collect();

        let count = scores
            .len()
            .min(classes.len())
            .min(boxes.len() / 4)
            .min(self.max_detections);
        let width = frame.width as f32;
        let height = frame.height as f32;

        let mut detections = Vec::with_capacity(count);
        for i in 0..count {
            let ymin = boxes[i * 4].clamp(0.0, 1.0);
            let xmin = boxes[i * 4 + 1].clamp(0.0, 1.0);
            let ymax = boxes[i * 4 + 2].clamp(0.0, 1.0);
            let xmax = boxes[i * 4 + 3].clamp(0.0, 1.0);
            let label = COCO_LABELS
                .get(classes[i].max(0.0) as usize)
                .copied()
                .unwrap_or("unknown");
            detections.push(Detection::new(
                BoundingBox::new(
                    xmin * width,
                    ymin * height,
                    (xmax - xmin).max(0.0) * width,
                    (ymax - ymin).max(0.0) * height,
                ),
                label,
                scores[i],
            ));
        }
        Ok(detections)
    }
}

impl Detector for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::filled(self.width, self.height, 0, 0);
        self.detect(&blank).map(|_| ())
    }
}
