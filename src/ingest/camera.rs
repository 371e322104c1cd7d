//! Camera frame source for live detection.
//!
//! Only the synthetic `stub://` camera ships with this crate. It produces
//! packed RGB frames at the configured size, paced to the target frame rate.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::detect::CameraFrame;
use crate::geometry::ContentSize;

/// Which camera a live run uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

impl CameraFacing {
    pub fn other(self) -> Self {
        match self {
            CameraFacing::Back => CameraFacing::Front,
            CameraFacing::Front => CameraFacing::Back,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraFacing::Back => "back",
            CameraFacing::Front => "front",
        }
    }
}

impl fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraFacing {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "back" | "rear" => Ok(CameraFacing::Back),
            "front" | "user" => Ok(CameraFacing::Front),
            other => Err(anyhow!("unknown camera facing {:?} (expected back or front)", other)),
        }
    }
}

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Camera locator, e.g. `stub://camera`.
    pub source: String,
    pub facing: CameraFacing,
    /// Target frame rate. Zero disables pacing.
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: "stub://camera".to_string(),
            facing: CameraFacing::Back,
            target_fps: 5,
            width: 1920,
            height: 1080,
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub source: String,
    pub facing: CameraFacing,
}

pub struct CameraSource {
    config: CameraConfig,
    frame_count: u64,
    scene_state: u8,
    connected_at: Option<Instant>,
    last_frame_at: Option<Instant>,
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if !config.source.starts_with("stub://") {
            return Err(anyhow!(
                "unsupported camera source {:?}; only stub:// cameras are available",
                config.source
            ));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "camera frame size must be non-zero (got {}x{})",
                config.width,
                config.height
            ));
        }
        Ok(Self {
            config,
            frame_count: 0,
            scene_state: 0,
            connected_at: None,
            last_frame_at: None,
        })
    }

    pub fn connect(&mut self) -> Result<()> {
        log::info!(
            "CameraSource: connected to {} ({} camera, synthetic)",
            self.config.source,
            self.config.facing
        );
        self.connected_at = Some(Instant::now());
        Ok(())
    }

    /// Capture the next frame, sleeping as needed to hold the target rate.
    pub fn next_frame(&mut self) -> Result<CameraFrame> {
        let connected_at = self
            .connected_at
            .ok_or_else(|| anyhow!("camera source not connected; call connect() first"))?;

        let min_interval = frame_interval(self.config.target_fps);
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                std::thread::sleep(min_interval - elapsed);
            }
        }

        let now = Instant::now();
        self.frame_count += 1;
        self.last_frame_at = Some(now);
        let pixels = self.generate_synthetic_pixels();

        Ok(CameraFrame {
            pixels,
            width: self.config.width,
            height: self.config.height,
            timestamp_ms: now.duration_since(connected_at).as_millis() as u64,
        })
    }

    pub fn facing(&self) -> CameraFacing {
        self.config.facing
    }

    pub fn frame_size(&self) -> ContentSize {
        ContentSize::new(self.config.width, self.config.height)
    }

    pub fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            source: self.config.source.clone(),
            facing: self.config.facing,
        }
    }

    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count = self.config.width as usize * self.config.height as usize * 3;
        if self.frame_count.is_multiple_of(50) {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        // Front camera pattern runs the other way so the two are distinguishable.
        let seed = self.frame_count + u64::from(self.scene_state);
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            let position = match self.config.facing {
                CameraFacing::Back => i as u64,
                CameraFacing::Front => (pixel_count - i) as u64,
            };
            *pixel = ((position + seed) % 256) as u8;
        }
        pixels
    }
}

pub(crate) fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(facing: CameraFacing) -> CameraConfig {
        CameraConfig {
            facing,
            target_fps: 0,
            width: 4,
            height: 2,
            ..CameraConfig::default()
        }
    }

    #[test]
    fn synthetic_frames_have_configured_size() {
        let mut camera = CameraSource::new(small(CameraFacing::Back)).unwrap();
        assert!(camera.next_frame().is_err());
        camera.connect().unwrap();

        let first = camera.next_frame().unwrap();
        let second = camera.next_frame().unwrap();
        assert_eq!(first.pixels.len(), 4 * 2 * 3);
        assert_eq!(first.size(), camera.frame_size());
        assert_eq!(camera.facing(), CameraFacing::Back);
        assert!(second.timestamp_ms >= first.timestamp_ms);
        assert_ne!(first.pixels, second.pixels);
        assert_eq!(camera.stats().frames_captured, 2);
    }

    #[test]
    fn facings_produce_different_frames() {
        let mut back = CameraSource::new(small(CameraFacing::Back)).unwrap();
        let mut front = CameraSource::new(small(CameraFacing::Front)).unwrap();
        back.connect().unwrap();
        front.connect().unwrap();
        assert_ne!(back.next_frame().unwrap().pixels, front.next_frame().unwrap().pixels);
    }

    #[test]
    fn rejects_non_stub_and_empty_sources() {
        let err = CameraSource::new(CameraConfig {
            source: "rtsp://10.0.0.2/stream".into(),
            ..CameraConfig::default()
        })
        .err()
        .unwrap();
        assert!(err.to_string().contains("stub://"));

        assert!(CameraSource::new(CameraConfig {
            width: 0,
            ..CameraConfig::default()
        })
        .is_err());
    }

    #[test]
    fn facing_parsing_and_pacing() {
        assert_eq!("Front".parse::<CameraFacing>().unwrap(), CameraFacing::Front);
        assert_eq!("rear".parse::<CameraFacing>().unwrap(), CameraFacing::Back);
        assert!("sideways".parse::<CameraFacing>().is_err());
        assert_eq!(CameraFacing::Back.other(), CameraFacing::Front);

        assert_eq!(frame_interval(0), Duration::ZERO);
        assert_eq!(frame_interval(5), Duration::from_millis(200));
        assert_eq!(frame_interval(5000), Duration::from_millis(1));
    }
}
