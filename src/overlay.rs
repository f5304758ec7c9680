//! Overlay rendering.
//!
//! The renderer turns a published detection set into an `OverlayFrame`: one label
//! and one highlight per detection, positioned in surface pixels. A sink receives
//! each frame as a full replacement of whatever it showed before. There is no
//! incremental add/remove path, so shrinking or changing sets cannot leave stale
//! elements behind.

use crate::detect::Detection;

/// Default vertical offset of a label above its box, in pixels.
pub const DEFAULT_LABEL_OFFSET: f32 = 10.0;

/// One positioned overlay element.
#[derive(Clone, Debug, PartialEq)]
pub enum OverlayElement {
    /// Text caption anchored above a box.
    Label {
        left: f32,
        top: f32,
        width: f32,
        text: String,
    },
    /// Box outline over the detected object.
    Highlight {
        left: f32,
        top: f32,
        width: f32,
        height: f32,
    },
}

/// Full ordered element list for one render pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayFrame {
    elements: Vec<OverlayElement>,
}

impl OverlayFrame {
    pub fn elements(&self) -> &[OverlayElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn highlights(&self) -> impl Iterator<Item = &OverlayElement> {
        self.elements
            .iter()
            .filter(|e| matches!(e, OverlayElement::Highlight { .. }))
    }

    pub fn labels(&self) -> impl Iterator<Item = &OverlayElement> {
        self.elements
            .iter()
            .filter(|e| matches!(e, OverlayElement::Label { .. }))
    }
}

/// Receives complete overlay frames.
pub trait OverlaySink {
    /// Replace everything currently shown with `frame`.
    fn replace(&mut self, frame: OverlayFrame);
}

/// Builds overlay frames from detections.
#[derive(Clone, Debug)]
pub struct OverlayRenderer {
    label_offset: f32,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self {
            label_offset: DEFAULT_LABEL_OFFSET,
        }
    }

    pub fn with_label_offset(mut self, offset: f32) -> Self {
        self.label_offset = offset;
        self
    }

    /// One highlight + label pair per detection, in input order.
    pub fn render(&self, detections: &[Detection]) -> OverlayFrame {
        let mut elements = Vec::with_capacity(detections.len() * 2);
        for detection in detections {
            let bbox = detection.bbox;
            elements.push(OverlayElement::Highlight {
                left: bbox.x,
                top: bbox.y,
                width: bbox.width,
                height: bbox.height,
            });
            elements.push(OverlayElement::Label {
                left: bbox.x,
                top: bbox.y - self.label_offset,
                width: bbox.width,
                text: label_text(detection),
            });
        }
        OverlayFrame { elements }
    }

    /// Render and hand the result to a sink.
    pub fn render_into<S: OverlaySink + ?Sized>(&self, detections: &[Detection], sink: &mut S) {
        sink.replace(self.render(detections));
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Caption text for a detection, e.g. `cup - with 90% confidence.`
pub fn label_text(detection: &Detection) -> String {
    format!(
        "{} - with {}% confidence.",
        detection.label,
        detection.percent()
    )
}

/// In-memory overlay layer holding the elements of the latest pass.
#[derive(Debug, Default)]
pub struct OverlayLayer {
    current: OverlayFrame,
    passes: u64,
}

impl OverlayLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &OverlayFrame {
        &self.current
    }

    /// Number of render passes received.
    pub fn passes(&self) -> u64 {
        self.passes
    }
}

impl OverlaySink for OverlayLayer {
    fn replace(&mut self, frame: OverlayFrame) {
        self.current = frame;
        self.passes += 1;
    }
}

/// Sink that logs each pass whose content differs from the previous one.
#[derive(Debug, Default)]
pub struct LogOverlay {
    last: OverlayFrame,
}

impl LogOverlay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverlaySink for LogOverlay {
    fn replace(&mut self, frame: OverlayFrame) {
        if frame == self.last {
            return;
        }
        if frame.is_empty() {
            log::info!("overlay cleared");
        }
        for element in frame.labels() {
            if let OverlayElement::Label {
                left, top, text, ..
            } = element
            {
                log::info!("overlay: {} at ({:.0}, {:.0})", text, left, top);
            }
        }
        self.last = frame;
    }
}
