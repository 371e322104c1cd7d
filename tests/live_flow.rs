use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use detection_overlay::detect::{SharedDetector, StubReply};
use detection_overlay::ingest::CameraConfig;
use detection_overlay::live::FrameApplied;
use detection_overlay::{
    CameraFacing, CameraSource, ContentSize, DetectionResult, LiveDetection, LiveSession,
    LiveStatus, StubDetector, ViewportSize,
};

fn camera(facing: CameraFacing) -> CameraSource {
    CameraSource::new(CameraConfig {
        source: "stub://test".into(),
        facing,
        target_fps: 50,
        width: 64,
        height: 36,
    })
    .expect("stub camera")
}

fn shared(detector: StubDetector) -> SharedDetector {
    Arc::new(detector)
}

#[test]
fn live_run_renders_frames_until_stopped() {
    let stub = Arc::new(StubDetector::new());
    let detector: SharedDetector = stub.clone();
    let mut session = LiveSession::new(CameraFacing::Back);
    session.layout_ready(ViewportSize::new(360, 640));

    let (tx, rx) = mpsc::channel();
    let ticket = session.start(CameraFacing::Back);
    assert_eq!(session.status(), &LiveStatus::Starting);
    let handle = LiveDetection::spawn(camera(CameraFacing::Back), detector.clone(), ticket, tx)
        .expect("spawn live worker");
    assert_eq!(handle.ticket(), ticket);

    let mut rendered = 0;
    while rendered < 3 {
        let event = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("live frame event");
        assert_eq!(event.frame_size, Some(ContentSize::new(64, 36)));
        if session.frame_result(event) == FrameApplied::Rendered {
            rendered += 1;
        }
    }
    handle.stop().expect("stop live worker");

    assert_eq!(session.status().to_string(), "Detected 2 objects (42 ms)");
    // 64x36 frame in a 360x640 viewport
    let geometry = session.geometry().unwrap();
    assert_eq!(geometry.displayed_width, 360);
    assert_eq!(geometry.displayed_height, 202);
    assert_eq!(session.overlay().len(), 2);
    assert!(stub.calls() >= 3);

    session.stop();
    assert!(session.overlay().is_empty());
    assert_eq!(session.status().to_string(), "Detection stopped");

    // anything still queued from the stopped run is stale
    while let Ok(event) = rx.try_recv() {
        assert_eq!(session.frame_result(event), FrameApplied::Stale);
    }
}

#[test]
fn switching_camera_discards_previous_run() {
    let detector = shared(StubDetector::new());
    let mut session = LiveSession::new(CameraFacing::Back);
    session.layout_ready(ViewportSize::new(1080, 1920));

    let (tx, rx) = mpsc::channel();
    let back = session.start(CameraFacing::Back);
    let handle = LiveDetection::spawn(camera(CameraFacing::Back), detector.clone(), back, tx.clone())
        .unwrap();
    let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    handle.stop().unwrap();

    let front = session.switch_camera().expect("session was running");
    assert_ne!(back, front);
    assert_eq!(session.facing(), CameraFacing::Front);
    assert_eq!(session.frame_result(first), FrameApplied::Stale);
    // drain frames the back camera produced before it stopped
    while let Ok(event) = rx.try_recv() {
        assert_eq!(session.frame_result(event), FrameApplied::Stale);
    }

    let handle = LiveDetection::spawn(camera(CameraFacing::Front), detector, front, tx).unwrap();
    let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(event.ticket, front);
    assert_eq!(session.frame_result(event), FrameApplied::Rendered);
    handle.stop().unwrap();
}

#[test]
fn detector_errors_become_status_lines() {
    let detector = shared(StubDetector::new().with_script([
        StubReply::Result(DetectionResult::failure(Some("rate limited".into()), 0)),
        StubReply::TransportError("connection reset".into()),
    ]));
    let mut session = LiveSession::new(CameraFacing::Back);
    session.layout_ready(ViewportSize::new(1080, 1920));

    let (tx, rx) = mpsc::channel();
    let ticket = session.start(CameraFacing::Back);
    let handle = LiveDetection::spawn(camera(CameraFacing::Back), detector, ticket, tx).unwrap();

    let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(session.frame_result(event), FrameApplied::Failed);
    assert_eq!(session.status().to_string(), "Detection error: rate limited");

    let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(session.frame_result(event), FrameApplied::Failed);
    assert_eq!(session.status().to_string(), "Error: connection reset");

    let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(session.frame_result(event), FrameApplied::Rendered);
    handle.stop().unwrap();
}
