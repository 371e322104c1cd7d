use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::ContentSize;

/// Fallback message when a failed detection carries no error text.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Axis-aligned box in content pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
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
}

/// A labeled detection reported by the detector client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub label: String,
    /// Score in `0.0..=1.0`.
    pub confidence: f32,
    #[serde(rename = "bbox", alias = "bounding_box")]
    pub bounding_box: BoundingBox,
}

impl DetectedObject {
    pub fn new(label: impl Into<String>, confidence: f32, bounding_box: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bounding_box,
        }
    }

    /// Confidence rendered as a whole percentage, e.g. `93%`.
    pub fn confidence_percent(&self) -> String {
        format!("{:.0}%", self.confidence * 100.0)
    }
}

/// Result of one detection call.
///
/// `error` is present iff `success` is false. `objects` are in the order the
/// detector produced them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub success: bool,
    #[serde(default)]
    pub objects: Vec<DetectedObject>,
    #[serde(default)]
    pub processing_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Size of the image the detector actually analysed, when it reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_size: Option<ContentSize>,
}

impl DetectionResult {
    pub fn success(objects: Vec<DetectedObject>, processing_time_ms: u64) -> Self {
        Self {
            success: true,
            objects,
            processing_time_ms,
            error: None,
            frame_size: None,
        }
    }

    /// A failed result. A missing or blank message becomes [`UNKNOWN_ERROR`].
    pub fn failure(error: Option<String>, processing_time_ms: u64) -> Self {
        let error = error
            .filter(|msg| !msg.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
        Self {
            success: false,
            objects: Vec::new(),
            processing_time_ms,
            error: Some(error),
            frame_size: None,
        }
    }

    pub fn with_frame_size(mut self, size: ContentSize) -> Self {
        self.frame_size = Some(size);
        self
    }

    /// Error text for a failed result.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or(UNKNOWN_ERROR)
    }

    /// Check the result against the detector contract.
    pub fn validate(&self) -> Result<()> {
        if self.success && self.error.is_some() {
            return Err(anyhow!("successful detection result carries an error"));
        }
        if !self.success && self.error.is_none() {
            return Err(anyhow!("failed detection result carries no error"));
        }
        if let Some(size) = self.frame_size {
            if size.is_empty() {
                return Err(anyhow!(
                    "reported frame size {}x{} is empty",
                    size.width,
                    size.height
                ));
            }
        }
        for object in &self.objects {
            if !object.confidence.is_finite() || !(0.0..=1.0).contains(&object.confidence) {
                return Err(anyhow!(
                    "confidence {} for '{}' out of bounds",
                    object.confidence,
                    object.label
                ));
            }
            let b = object.bounding_box;
            let finite = [b.x, b.y, b.width, b.height].iter().all(|v| v.is_finite());
            if !finite || b.width < 0.0 || b.height < 0.0 {
                return Err(anyhow!(
                    "invalid bounding box for '{}': {:?}",
                    object.label,
                    b
                ));
            }
        }
        Ok(())
    }
}
