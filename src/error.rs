use thiserror::Error;

use crate::detect::UNKNOWN_ERROR;

/// Failures reported to the user for one request.
///
/// Geometry errors are not listed: they are recovered by waiting for layout.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The image could not be fetched or decoded.
    #[error("content load failed: {0}")]
    ContentLoadFailed(String),
    /// The detector reported failure or could not be reached.
    #[error("detection failed: {0}")]
    DetectionFailed(String),
}

impl PipelineError {
    pub fn detection(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            PipelineError::DetectionFailed(UNKNOWN_ERROR.to_string())
        } else {
            PipelineError::DetectionFailed(message)
        }
    }

    /// Text shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::ContentLoadFailed(_) => "Failed to load image".to_string(),
            PipelineError::DetectionFailed(message) => format!("Detection failed: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_detection_message_uses_fallback() {
        assert_eq!(
            PipelineError::detection("").user_message(),
            "Detection failed: Unknown error"
        );
        assert_eq!(
            PipelineError::detection("timeout").user_message(),
            "Detection failed: timeout"
        );
        assert_eq!(
            PipelineError::ContentLoadFailed("404".into()).user_message(),
            "Failed to load image"
        );
    }
}
