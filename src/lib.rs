//! Detection Overlay
//!
//! Shows the results of an external object-detection service on top of the
//! image (or camera frame) that was analysed.
//!
//! # Architecture
//!
//! The image is drawn fit-center inside a viewport. Detector boxes come back
//! in the image's own pixel space, so before drawing they are projected
//! through the same fit-center transform the image went through:
//!
//! 1. `geometry`: where the image lands inside the viewport.
//! 2. `overlay`: detector boxes scaled and offset into viewport space.
//! 3. `listing`: detections ordered by descending confidence, with summary.
//!
//! A request has two independent completions (image size, detector result)
//! that may arrive in either order. `session::DetectionSession` joins them
//! and discards completions from superseded requests by generation.
//! `pipeline::Pipeline` runs the loaders on worker threads and feeds their
//! events back to the owning thread. `live` does the same per camera frame.
//!
//! # Module Structure
//!
//! - `detect`: detection result model, detector clients and registry
//! - `ingest`: still-image and camera sources
//! - `config`: file and environment configuration

pub mod config;
pub mod detect;
pub mod error;
pub mod geometry;
pub mod ingest;
pub mod listing;
pub mod live;
pub mod overlay;
pub mod pipeline;
pub mod session;

pub use config::{AppConfig, DetectorBackend};
pub use detect::{
    BoundingBox, CameraFrame, DetectedObject, DetectionCapability, DetectionInput,
    DetectionResult, DetectorClient, DetectorRegistry, SharedDetector, StubDetector,
};
pub use error::PipelineError;
pub use geometry::{
    compute_display_geometry, ContentSize, DisplayGeometry, InvalidGeometry, ViewportSize,
};
pub use ingest::{CameraFacing, CameraSource, ContentSource, ImageRequest};
pub use listing::{order_by_confidence_descending, ResultList, ResultSummary};
pub use live::{LiveDetection, LiveEvent, LiveHandle, LiveSession, LiveStatus, LiveTicket};
pub use overlay::{label_color, project_detections, OverlayBox, OverlayRenderer, ViewRect};
pub use pipeline::Pipeline;
pub use session::{
    Applied, DetectionOutcome, DetectionSession, PipelineEvent, Presentation, RequestState,
    RequestTicket,
};
