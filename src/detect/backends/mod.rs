#[cfg(feature = "http")]
pub mod http;
pub mod stub;

#[cfg(feature = "http")]
pub use http::{HttpDetector, HttpDetectorConfig};
pub use stub::{sample_result, StubDetector, StubReply};
