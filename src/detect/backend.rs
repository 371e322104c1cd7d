use anyhow::Result;

use crate::detect::result::DetectionResult;
use crate::geometry::ContentSize;

/// Detection capabilities a client may offer.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionCapability {
    /// Encoded image bytes (JPEG, PNG) uploaded by the caller.
    EncodedImage,
    /// An image URL the service fetches itself.
    RemoteUrl,
    /// Raw RGB camera frames.
    LiveFrames,
}

/// A single uncompressed camera frame.
#[derive(Clone, Debug)]
pub struct CameraFrame {
    /// Packed RGB8 pixels, `width * height * 3` bytes.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Milliseconds since the live run started.
    pub timestamp_ms: u64,
}

impl CameraFrame {
    pub fn size(&self) -> ContentSize {
        ContentSize::new(self.width, self.height)
    }
}

/// What gets sent to a detector.
#[derive(Clone, Debug)]
pub enum DetectionInput {
    Encoded(Vec<u8>),
    RemoteUrl(String),
    Frame(CameraFrame),
}

impl DetectionInput {
    pub fn capability(&self) -> DetectionCapability {
        match self {
            DetectionInput::Encoded(_) => DetectionCapability::EncodedImage,
            DetectionInput::RemoteUrl(_) => DetectionCapability::RemoteUrl,
            DetectionInput::Frame(_) => DetectionCapability::LiveFrames,
        }
    }
}

/// Detector client trait.
///
/// Implementations talk to the external detection service. `Err` is reserved
/// for transport or processing failures; a service that answers with its own
/// failure reports `Ok` with `success == false`.
///
/// Clients are shared across worker threads and `detect` takes `&self`, so
/// concurrent calls never queue behind each other.
pub trait DetectorClient: Send + Sync {
    /// Client identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the client supports a capability.
    fn supports(&self, capability: DetectionCapability) -> bool;

    /// Run detection. Blocks until the service answers.
    fn detect(&self, input: &DetectionInput) -> Result<DetectionResult>;

    /// Optional warm-up hook.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}
