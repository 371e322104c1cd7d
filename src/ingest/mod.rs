//! Image and camera sources.
//!
//! - `ContentSource` loads still images from local files or `http(s)` URLs
//!   (remote loading needs the `http` feature).
//! - `CameraSource` produces live frames; only the synthetic `stub://`
//!   camera is built in.

pub mod camera;
pub mod content;

pub use camera::{CameraConfig, CameraFacing, CameraSource, CameraStats};
pub use content::{probe_size, ContentSource, ImageRequest};
