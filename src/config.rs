use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::detect::{DetectorRegistry, StubDetector};
use crate::geometry::{ContentSize, ViewportSize};
use crate::ingest::{CameraConfig, CameraFacing};

const DEFAULT_API_URL: &str = "https://object-detection-api-production.up.railway.app";
const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_VIEWPORT_WIDTH: u32 = 1080;
const DEFAULT_VIEWPORT_HEIGHT: u32 = 1920;
const DEFAULT_CAMERA_URL: &str = "stub://camera";
const DEFAULT_CAMERA_FPS: u32 = 5;
const DEFAULT_FRAME_WIDTH: u32 = 1920;
const DEFAULT_FRAME_HEIGHT: u32 = 1080;

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    detector: Option<DetectorConfigFile>,
    viewport: Option<ViewportConfigFile>,
    live: Option<LiveConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    api_url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ViewportConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct LiveConfigFile {
    source: Option<String>,
    facing: Option<String>,
    target_fps: Option<u32>,
    frame_width: Option<u32>,
    frame_height: Option<u32>,
}

/// Which detector client requests go to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorBackend {
    Http,
    Stub,
}

impl FromStr for DetectorBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(DetectorBackend::Http),
            "stub" => Ok(DetectorBackend::Stub),
            other => Err(anyhow!(
                "unknown detector backend '{}' (expected http or stub)",
                other
            )),
        }
    }
}

impl fmt::Display for DetectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorBackend::Http => f.write_str("http"),
            DetectorBackend::Stub => f.write_str("stub"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub detector: DetectorSettings,
    pub viewport: ViewportSize,
    pub live: LiveSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: DetectorBackend,
    pub api_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LiveSettings {
    pub source: String,
    pub facing: CameraFacing,
    pub target_fps: u32,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl LiveSettings {
    pub fn frame_size(&self) -> ContentSize {
        ContentSize::new(self.frame_width, self.frame_height)
    }
}

impl AppConfig {
    /// Defaults, then the file named by `DETECT_OVERLAY_CONFIG`, then
    /// `DETECT_OVERLAY_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DETECT_OVERLAY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Result<Self> {
        let backend = match file.detector.as_ref().and_then(|d| d.backend.as_deref()) {
            Some(backend) => backend.parse()?,
            None => DetectorBackend::Http,
        };
        let detector = DetectorSettings {
            backend,
            api_url: file
                .detector
                .as_ref()
                .and_then(|d| d.api_url.clone())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            timeout: Duration::from_millis(
                file.detector
                    .as_ref()
                    .and_then(|d| d.timeout_ms)
                    .unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
        };
        let viewport = ViewportSize::new(
            file.viewport
                .as_ref()
                .and_then(|v| v.width)
                .unwrap_or(DEFAULT_VIEWPORT_WIDTH),
            file.viewport
                .as_ref()
                .and_then(|v| v.height)
                .unwrap_or(DEFAULT_VIEWPORT_HEIGHT),
        );
        let facing = match file.live.as_ref().and_then(|l| l.facing.as_deref()) {
            Some(facing) => facing.parse()?,
            None => CameraFacing::Back,
        };
        let live = LiveSettings {
            source: file
                .live
                .as_ref()
                .and_then(|l| l.source.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            facing,
            target_fps: file
                .live
                .as_ref()
                .and_then(|l| l.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
            frame_width: file
                .live
                .as_ref()
                .and_then(|l| l.frame_width)
                .unwrap_or(DEFAULT_FRAME_WIDTH),
            frame_height: file
                .live
                .and_then(|l| l.frame_height)
                .unwrap_or(DEFAULT_FRAME_HEIGHT),
        };
        Ok(Self {
            detector,
            viewport,
            live,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("DETECT_OVERLAY_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.parse()?;
            }
        }
        if let Ok(url) = std::env::var("DETECT_OVERLAY_API_URL") {
            if !url.trim().is_empty() {
                self.detector.api_url = url.trim().to_string();
            }
        }
        if let Ok(timeout) = std::env::var("DETECT_OVERLAY_TIMEOUT_MS") {
            let millis: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("DETECT_OVERLAY_TIMEOUT_MS must be an integer number of milliseconds")
            })?;
            self.detector.timeout = Duration::from_millis(millis);
        }
        if let Ok(viewport) = std::env::var("DETECT_OVERLAY_VIEWPORT") {
            self.viewport = ViewportSize::parse(&viewport).ok_or_else(|| {
                anyhow!("DETECT_OVERLAY_VIEWPORT must look like WIDTHxHEIGHT, got '{}'", viewport)
            })?;
        }
        if let Ok(url) = std::env::var("DETECT_OVERLAY_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.live.source = url;
            }
        }
        if let Ok(facing) = std::env::var("DETECT_OVERLAY_FACING") {
            if !facing.trim().is_empty() {
                self.live.facing = facing.parse()?;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.detector.backend == DetectorBackend::Http {
            let parsed = url::Url::parse(&self.detector.api_url)
                .with_context(|| format!("invalid detector api_url '{}'", self.detector.api_url))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(anyhow!(
                    "detector api_url must use http or https, got '{}'",
                    parsed.scheme()
                ));
            }
            self.detector.api_url = self.detector.api_url.trim_end_matches('/').to_string();
        }
        if self.detector.timeout.is_zero() {
            return Err(anyhow!("detector timeout must be greater than zero"));
        }
        if !self.viewport.is_laid_out() {
            return Err(anyhow!(
                "viewport must be non-zero (got {}x{})",
                self.viewport.width,
                self.viewport.height
            ));
        }
        if self.live.frame_size().is_empty() {
            return Err(anyhow!(
                "live frame size must be non-zero (got {}x{})",
                self.live.frame_width,
                self.live.frame_height
            ));
        }
        Ok(())
    }

    /// Registry holding the configured detector client.
    pub fn detector_registry(&self) -> Result<DetectorRegistry> {
        let mut registry = DetectorRegistry::new();
        match self.detector.backend {
            #[cfg(feature = "http")]
            DetectorBackend::Http => {
                registry.register(crate::detect::HttpDetector::new(
                    crate::detect::HttpDetectorConfig {
                        api_url: self.detector.api_url.clone(),
                        timeout: self.detector.timeout,
                    },
                )?);
            }
            #[cfg(not(feature = "http"))]
            DetectorBackend::Http => {
                return Err(anyhow!("the http detector backend requires the http feature"));
            }
            DetectorBackend::Stub => registry.register(StubDetector::new()),
        }
        Ok(registry)
    }

    pub fn camera_config(&self, facing: CameraFacing) -> CameraConfig {
        CameraConfig {
            source: self.live.source.clone(),
            facing,
            target_fps: self.live.target_fps,
            width: self.live.frame_width,
            height: self.live.frame_height,
        }
    }
}

/// JSON by default; TOML when the file name ends in `.toml`.
fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
