//! Overlay projection.
//!
//! Detector boxes arrive in content pixel space. The overlay is drawn in
//! viewport space, so each box is scaled by the displayed/intrinsic ratio of
//! its axis and shifted by the fit-center offset.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::detect::{DetectedObject, DetectionResult};
use crate::geometry::{ContentSize, DisplayGeometry};

/// A rectangle in viewport pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ViewRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// sRGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LabelColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl LabelColor {
    /// `#rrggbb`
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A drawable detection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OverlayBox {
    pub label: String,
    pub confidence: f32,
    pub rect: ViewRect,
    pub color: LabelColor,
}

impl OverlayBox {
    /// Caption drawn next to the box, e.g. `person 94%`.
    pub fn caption(&self) -> String {
        format!("{} {:.0}%", self.label, self.confidence * 100.0)
    }
}

/// Project every detection of `result` into viewport space.
///
/// Returns nothing when the content size is empty: there is nothing to draw yet.
pub fn project_detections(
    result: &DetectionResult,
    content: ContentSize,
    geometry: &DisplayGeometry,
) -> Vec<OverlayBox> {
    if content.is_empty() {
        return Vec::new();
    }
    result
        .objects
        .iter()
        .map(|object| project_object(object, content, geometry))
        .collect()
}

fn project_object(
    object: &DetectedObject,
    content: ContentSize,
    geometry: &DisplayGeometry,
) -> OverlayBox {
    let cw = f64::from(content.width);
    let ch = f64::from(content.height);
    let dw = f64::from(geometry.displayed_width);
    let dh = f64::from(geometry.displayed_height);
    let b = object.bounding_box;

    // Multiply before dividing so full-extent boxes land exactly on the displayed edge.
    let sx = |v: f32| f64::from(v) * dw / cw;
    let sy = |v: f32| f64::from(v) * dh / ch;

    OverlayBox {
        label: object.label.clone(),
        confidence: object.confidence,
        rect: ViewRect {
            x: (f64::from(geometry.offset_x) + sx(b.x)) as f32,
            y: (f64::from(geometry.offset_y) + sy(b.y)) as f32,
            width: sx(b.width) as f32,
            height: sy(b.height) as f32,
        },
        color: label_color(&object.label),
    }
}

/// Stable color for a label, derived from a hash of its text.
///
/// Hue covers the full wheel; saturation and value stay in `0.8..=1.0` so
/// boxes remain bright on photos.
pub fn label_color(label: &str) -> LabelColor {
    let digest = Sha256::digest(label.as_bytes());
    let hue = f32::from(u16::from_be_bytes([digest[0], digest[1]])) / 65536.0 * 360.0;
    let saturation = 0.8 + f32::from(digest[2]) / 255.0 * 0.2;
    let value = 0.8 + f32::from(digest[3]) / 255.0 * 0.2;
    hsv_to_rgb(hue, saturation, value)
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> LabelColor {
    let c = value * saturation;
    let h = (hue % 360.0) / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = value - c;
    let channel = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    LabelColor {
        r: channel(r),
        g: channel(g),
        b: channel(b),
    }
}

/// Holds the boxes currently on screen.
///
/// Every render replaces the whole set; there is no incremental diffing.
#[derive(Debug, Default)]
pub struct OverlayRenderer {
    boxes: Vec<OverlayBox>,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the drawn set with `result` projected through `geometry`.
    ///
    /// A missing or empty content size leaves the current set untouched.
    pub fn render(
        &mut self,
        result: &DetectionResult,
        content: Option<ContentSize>,
        geometry: &DisplayGeometry,
    ) -> bool {
        let Some(content) = content.filter(|size| !size.is_empty()) else {
            log::debug!("overlay render skipped: no content size yet");
            return false;
        };
        self.boxes = project_detections(result, content, geometry);
        true
    }

    pub fn clear(&mut self) {
        self.boxes.clear();
    }

    pub fn boxes(&self) -> &[OverlayBox] {
        &self.boxes
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}
