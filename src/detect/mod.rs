mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{CameraFrame, DetectionCapability, DetectionInput, DetectorClient};
#[cfg(feature = "http")]
pub use backends::{HttpDetector, HttpDetectorConfig};
pub use backends::{StubDetector, StubReply};
pub use registry::{DetectorRegistry, SharedDetector};
pub use result::{BoundingBox, DetectedObject, DetectionResult, UNKNOWN_ERROR};
