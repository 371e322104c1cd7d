#![cfg(feature = "http")]

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use serde::Deserialize;
use url::Url;

use crate::detect::backend::{CameraFrame, DetectionCapability, DetectionInput, DetectorClient};
use crate::detect::result::{DetectedObject, DetectionResult};
use crate::geometry::ContentSize;

const JPEG_QUALITY: u8 = 80;
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Configuration for the HTTP detection API.
#[derive(Clone, Debug)]
pub struct HttpDetectorConfig {
    /// Service base URL, e.g. `https://detector.example.com`.
    pub api_url: String,
    pub timeout: Duration,
}

/// Client for a remote object-detection HTTP API.
///
/// Endpoints, relative to the base URL:
/// - `POST /detect` with encoded image bytes (uploads and live frames)
/// - `POST /detect/url` with `{"url": "..."}`
pub struct HttpDetector {
    agent: ureq::Agent,
    detect_url: String,
    detect_remote_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, alias = "detected_objects", alias = "detections")]
    objects: Vec<DetectedObject>,
    #[serde(default, alias = "processingTimeMs")]
    processing_time_ms: Option<f64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    image_width: Option<u32>,
    #[serde(default)]
    image_height: Option<u32>,
}

impl HttpDetector {
    pub fn new(config: HttpDetectorConfig) -> Result<Self> {
        let base = Url::parse(&config.api_url)
            .with_context(|| format!("parse detection api url '{}'", config.api_url))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported detection api scheme '{}'; expected http(s)",
                base.scheme()
            ));
        }
        let root = config.api_url.trim_end_matches('/');
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self {
            agent,
            detect_url: format!("{root}/detect"),
            detect_remote_url: format!("{root}/detect/url"),
        })
    }

    fn post(&self, url: &str, content_type: &str, body: &[u8]) -> Result<DetectionResult> {
        let response = match self
            .agent
            .post(url)
            .set("Content-Type", content_type)
            .set("Accept", "application/json")
            .send_bytes(body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(anyhow!(
                    "detection api returned HTTP {}: {}",
                    code,
                    error_text(&body)
                ));
            }
            Err(err) => {
                return Err(anyhow::Error::new(err).context(format!("post to {}", url)));
            }
        };
        let body = response
            .into_string()
            .context("read detection api response")?;
        parse_response(&body)
    }
}

impl DetectorClient for HttpDetector {
    fn name(&self) -> &'static str {
        "http"
    }

    fn supports(&self, _capability: DetectionCapability) -> bool {
        true
    }

    fn detect(&self, input: &DetectionInput) -> Result<DetectionResult> {
        match input {
            DetectionInput::Encoded(bytes) => {
                let content_type = image::guess_format(bytes)
                    .map(|format| format.to_mime_type())
                    .unwrap_or("application/octet-stream");
                self.post(&self.detect_url, content_type, bytes)
            }
            DetectionInput::RemoteUrl(url) => {
                let body = serde_json::to_vec(&serde_json::json!({ "url": url }))?;
                self.post(&self.detect_remote_url, "application/json", &body)
            }
            DetectionInput::Frame(frame) => {
                let jpeg = encode_frame(frame)?;
                let mut result = self.post(&self.detect_url, "image/jpeg", &jpeg)?;
                if result.success && result.frame_size.is_none() {
                    result.frame_size = Some(frame.size());
                }
                Ok(result)
            }
        }
    }
}

/// Decode and validate a detection API response body.
pub fn parse_response(body: &str) -> Result<DetectionResult> {
    let api: ApiResponse =
        serde_json::from_str(body).context("invalid detection api response")?;
    let success = api.success.unwrap_or(api.error.is_none());
    let processing_time_ms = api
        .processing_time_ms
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(|ms| ms.round() as u64)
        .unwrap_or(0);

    let mut result = if success {
        DetectionResult::success(api.objects, processing_time_ms)
    } else {
        DetectionResult::failure(api.error, processing_time_ms)
    };
    if let (Some(width), Some(height)) = (api.image_width, api.image_height) {
        result.frame_size = Some(ContentSize::new(width, height));
    }
    result.validate()?;
    Ok(result)
}

fn encode_frame(frame: &CameraFrame) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .write_image(
            &frame.pixels,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )
        .context("encode camera frame as jpeg")?;
    Ok(out)
}

fn error_text(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
    }
    if let Ok(ErrorBody { error: Some(error) }) = serde_json::from_str::<ErrorBody>(body) {
        return error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response".to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_successful_response() {
        let body = r#"{
            "success": true,
            "objects": [
                {"label": "cat", "confidence": 0.91, "bbox": {"x": 10, "y": 20, "width": 30, "height": 40}}
            ],
            "processing_time_ms": 123.4,
            "image_width": 640,
            "image_height": 480
        }"#;
        let result = parse_response(body).unwrap();
        assert!(result.success);
        assert_eq!(result.processing_time_ms, 123);
        assert_eq!(result.objects.len(), 1);
        assert_eq!(result.objects[0].label, "cat");
        assert_eq!(result.objects[0].bounding_box.height, 40.0);
        assert_eq!(result.frame_size, Some(ContentSize::new(640, 480)));
    }

    #[test]
    fn error_field_implies_failure() {
        let result = parse_response(r#"{"error": "model unavailable"}"#).unwrap();
        assert!(!result.success);
        assert_eq!(result.error_message(), "model unavailable");

        let result = parse_response(r#"{"success": false}"#).unwrap();
        assert_eq!(result.error_message(), "Unknown error");
    }

    #[test]
    fn invalid_objects_are_rejected() {
        let body = r#"{"success": true, "objects": [
            {"label": "cat", "confidence": 3.0, "bbox": {"x": 0, "y": 0, "width": 1, "height": 1}}
        ]}"#;
        assert!(parse_response(body).is_err());
        assert!(parse_response("not json").is_err());
    }

    #[test]
    fn error_text_prefers_json_error() {
        assert_eq!(error_text(r#"{"error": "quota exceeded"}"#), "quota exceeded");
        assert_eq!(error_text("  "), "empty response");
        assert_eq!(error_text("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let config = HttpDetectorConfig {
            api_url: "ftp://detector.local".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(HttpDetector::new(config).is_err());
    }
}
