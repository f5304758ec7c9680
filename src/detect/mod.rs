mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::Detector;
pub use backends::StubDetector;
#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
pub use registry::DetectorRegistry;
pub use result::{filter_confident, BoundingBox, Detection, DEFAULT_CONFIDENCE_THRESHOLD};
