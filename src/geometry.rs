//! Fit-center geometry.
//!
//! Maps a content rectangle (image or camera frame) into a viewport under an
//! aspect-preserving "fit within, centered" policy. The content is never
//! cropped; the unused viewport area is split evenly on the unconstrained axis.
//!
//! Aspect comparisons and floors are evaluated with integer cross-multiplication
//! so that equal aspect ratios always compare equal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Intrinsic pixel size of a decoded image or camera frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentSize {
    pub width: u32,
    pub height: u32,
}

impl ContentSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Pixel size of the display region. Zero until layout has completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True once both dimensions are non-zero.
    pub fn is_laid_out(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Parse a `WIDTHxHEIGHT` string such as `1080x1920`.
    pub fn parse(value: &str) -> Option<Self> {
        let (w, h) = value.trim().split_once(['x', 'X'])?;
        let width = w.trim().parse().ok()?;
        let height = h.trim().parse().ok()?;
        Some(Self { width, height })
    }
}

/// The rectangle the content occupies inside the viewport.
///
/// Only valid for the content/viewport pair it was computed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayGeometry {
    pub displayed_width: u32,
    pub displayed_height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

/// A content or viewport dimension was zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error(
    "invalid geometry: content {}x{}, viewport {}x{}",
    .content.width,
    .content.height,
    .viewport.width,
    .viewport.height
)]
pub struct InvalidGeometry {
    pub content: ContentSize,
    pub viewport: ViewportSize,
}

/// Which axis limited the scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitAxis {
    /// Content is relatively wider than the viewport; bands above and below.
    Width,
    /// Content is relatively taller, or the aspect ratios match; bands left and right.
    Height,
}

impl DisplayGeometry {
    pub fn fit_axis(&self, viewport: ViewportSize) -> FitAxis {
        if self.displayed_height == viewport.height {
            FitAxis::Height
        } else {
            FitAxis::Width
        }
    }
}

/// Compute the fit-center rectangle of `content` inside `viewport`.
///
/// Equal aspect ratios take the height-limited branch, so `offset_y` is zero
/// when the content exactly matches the viewport's shape.
pub fn compute_display_geometry(
    content: ContentSize,
    viewport: ViewportSize,
) -> Result<DisplayGeometry, InvalidGeometry> {
    if content.is_empty() || !viewport.is_laid_out() {
        return Err(InvalidGeometry { content, viewport });
    }

    let cw = u64::from(content.width);
    let ch = u64::from(content.height);
    let vw = u64::from(viewport.width);
    let vh = u64::from(viewport.height);

    // cw/ch > vw/vh  <=>  cw*vh > vw*ch
    let geometry = if cw * vh > vw * ch {
        // vw / (cw/ch) = vw*ch/cw, strictly below vh on this branch.
        let displayed_height = (vw * ch / cw) as u32;
        DisplayGeometry {
            displayed_width: viewport.width,
            displayed_height,
            offset_x: 0,
            offset_y: (viewport.height - displayed_height) / 2,
        }
    } else {
        // vh * (cw/ch) = vh*cw/ch, at most vw on this branch.
        let displayed_width = (vh * cw / ch) as u32;
        DisplayGeometry {
            displayed_width,
            displayed_height: viewport.height,
            offset_x: (viewport.width - displayed_width) / 2,
            offset_y: 0,
        }
    };
    Ok(geometry)
}
