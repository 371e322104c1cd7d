use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::backend::{DetectionCapability, DetectionInput, DetectorClient};
use crate::detect::result::{BoundingBox, DetectedObject, DetectionResult};

/// One scripted answer.
#[derive(Clone, Debug)]
pub enum StubReply {
    Result(DetectionResult),
    /// Simulated transport failure.
    TransportError(String),
}

/// Offline detector for tests and demos.
///
/// Replies are consumed from a script in order; once the script is empty the
/// fallback reply is returned for every call. The latency sleep happens
/// outside the script lock, so overlapping calls run side by side.
pub struct StubDetector {
    script: Mutex<VecDeque<StubReply>>,
    fallback: StubReply,
    latency: Duration,
    calls: AtomicU64,
}

impl StubDetector {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: StubReply::Result(sample_result()),
            latency: Duration::ZERO,
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_script(mut self, replies: impl IntoIterator<Item = StubReply>) -> Self {
        self.script
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(replies);
        self
    }

    pub fn with_fallback(mut self, reply: StubReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Sleep this long inside every `detect` call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorClient for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports(&self, _capability: DetectionCapability) -> bool {
        true
    }

    fn detect(&self, input: &DetectionInput) -> Result<DetectionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let reply = self
            .script
            .lock()
            .map_err(|_| anyhow!("stub script lock poisoned"))?
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            StubReply::Result(result) => {
                let mut result = result;
                if let DetectionInput::Frame(frame) = input {
                    if result.success && result.frame_size.is_none() {
                        result.frame_size = Some(frame.size());
                    }
                }
                Ok(result)
            }
            StubReply::TransportError(msg) => Err(anyhow!(msg)),
        }
    }
}

/// Fixed two-object answer used by the demo binaries.
pub fn sample_result() -> DetectionResult {
    DetectionResult::success(
        vec![
            DetectedObject::new("dog", 0.71, BoundingBox::new(820.0, 410.0, 560.0, 520.0)),
            DetectedObject::new("person", 0.94, BoundingBox::new(240.0, 120.0, 420.0, 900.0)),
        ],
        42,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backend::CameraFrame;
    use crate::geometry::ContentSize;

    #[test]
    fn stub_replays_script_then_fallback() {
        let detector = StubDetector::new()
            .with_script([
                StubReply::Result(DetectionResult::failure(Some("busy".into()), 3)),
                StubReply::TransportError("connection reset".into()),
            ])
            .with_fallback(StubReply::Result(DetectionResult::success(Vec::new(), 7)));
        let input = DetectionInput::RemoteUrl("https://example.com/cat.jpg".into());

        let r1 = detector.detect(&input).unwrap();
        assert!(!r1.success);
        assert_eq!(r1.error_message(), "busy");

        let err = detector.detect(&input).unwrap_err();
        assert_eq!(err.to_string(), "connection reset");

        let r3 = detector.detect(&input).unwrap();
        assert!(r3.success);
        assert_eq!(r3.processing_time_ms, 7);
        assert_eq!(detector.calls(), 3);
    }

    #[test]
    fn stub_reports_frame_size_for_live_frames() {
        let detector = StubDetector::new();
        let frame = CameraFrame {
            pixels: vec![0; 4 * 2 * 3],
            width: 4,
            height: 2,
            timestamp_ms: 0,
        };
        let result = detector.detect(&DetectionInput::Frame(frame)).unwrap();
        assert_eq!(result.frame_size, Some(ContentSize::new(4, 2)));
    }

    #[test]
    fn overlapping_calls_do_not_serialize() {
        let detector = StubDetector::new().with_latency(Duration::from_millis(300));
        let input = DetectionInput::RemoteUrl("https://example.com/cat.jpg".into());
        let started = std::time::Instant::now();
        std::thread::scope(|scope| {
            for _ in 0..3 {
                scope.spawn(|| detector.detect(&input).unwrap());
            }
        });
        assert_eq!(detector.calls(), 3);
        assert!(started.elapsed() < Duration::from_millis(800));
    }
}
