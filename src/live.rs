//! Live camera detection.
//!
//! `LiveSession` is the owner-side state of the live screen. `LiveDetection`
//! runs the capture/detect loop on a worker thread and reports each frame as
//! a `LiveEvent`. Starting, stopping, or switching cameras bumps the
//! generation, so results from a previous run are ignored.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Context, Result};

use crate::detect::{DetectionInput, DetectionResult, SharedDetector};
use crate::geometry::{compute_display_geometry, ContentSize, DisplayGeometry, ViewportSize};
use crate::ingest::{CameraFacing, CameraSource};
use crate::listing::ResultSummary;
use crate::overlay::{OverlayBox, OverlayRenderer};
use crate::session::DetectionOutcome;

/// Frame size assumed when neither the service nor the camera reports one.
pub const FALLBACK_FRAME_SIZE: ContentSize = ContentSize {
    width: 1920,
    height: 1080,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LiveTicket(u64);

impl LiveTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Status line of the live screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiveStatus {
    Idle,
    Starting,
    Detected(ResultSummary),
    /// The service answered with a failure.
    DetectionError(String),
    /// The service could not be reached.
    TransportError(String),
    Stopped,
}

impl fmt::Display for LiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiveStatus::Idle => f.write_str("Ready"),
            LiveStatus::Starting => f.write_str("Starting detection..."),
            LiveStatus::Detected(summary) => write!(f, "{summary}"),
            LiveStatus::DetectionError(error) => write!(f, "Detection error: {error}"),
            LiveStatus::TransportError(message) => write!(f, "Error: {message}"),
            LiveStatus::Stopped => f.write_str("Detection stopped"),
        }
    }
}

/// One processed camera frame.
#[derive(Clone, Debug)]
pub struct LiveEvent {
    pub ticket: LiveTicket,
    pub frame_timestamp_ms: u64,
    /// Size of the frame that was sent, when known.
    pub frame_size: Option<ContentSize>,
    pub outcome: DetectionOutcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameApplied {
    Stale,
    /// The viewport has not been laid out; the frame was dropped.
    AwaitingLayout,
    Rendered,
    Failed,
}

#[derive(Debug)]
pub struct LiveSession {
    generation: u64,
    active: bool,
    facing: CameraFacing,
    fallback_frame: ContentSize,
    viewport: Option<ViewportSize>,
    geometry: Option<DisplayGeometry>,
    renderer: OverlayRenderer,
    status: LiveStatus,
    last_result: Option<(DetectionResult, ContentSize)>,
    last_frame_ms: Option<u64>,
}

impl LiveSession {
    pub fn new(facing: CameraFacing) -> Self {
        Self {
            generation: 0,
            active: false,
            facing,
            fallback_frame: FALLBACK_FRAME_SIZE,
            viewport: None,
            geometry: None,
            renderer: OverlayRenderer::new(),
            status: LiveStatus::Idle,
            last_result: None,
            last_frame_ms: None,
        }
    }

    pub fn with_fallback_frame(mut self, size: ContentSize) -> Self {
        if !size.is_empty() {
            self.fallback_frame = size;
        }
        self
    }

    pub fn start(&mut self, facing: CameraFacing) -> LiveTicket {
        self.generation += 1;
        self.active = true;
        self.facing = facing;
        self.reset_frame_state();
        self.status = LiveStatus::Starting;
        log::info!("live run {} started ({} camera)", self.generation, facing);
        LiveTicket(self.generation)
    }

    pub fn stop(&mut self) {
        if self.active {
            log::info!("live run {} stopped", self.generation);
        }
        // In-flight frames from the stopped run become stale.
        self.generation += 1;
        self.active = false;
        self.reset_frame_state();
        self.status = LiveStatus::Stopped;
    }

    /// Start when stopped, stop when running. Returns the new run's ticket.
    pub fn toggle(&mut self) -> Option<LiveTicket> {
        if self.active {
            self.stop();
            None
        } else {
            Some(self.start(self.facing))
        }
    }

    /// Flip between back and front camera, restarting a running session.
    pub fn switch_camera(&mut self) -> Option<LiveTicket> {
        let facing = self.facing.other();
        if self.active {
            self.stop();
            Some(self.start(facing))
        } else {
            self.facing = facing;
            None
        }
    }

    /// Viewport laid out or resized. Re-renders the last frame's boxes.
    pub fn layout_ready(&mut self, viewport: ViewportSize) {
        self.viewport = Some(viewport);
        if let Some((result, frame)) = self.last_result.take() {
            match compute_display_geometry(frame, viewport) {
                Ok(geometry) => {
                    self.renderer.render(&result, Some(frame), &geometry);
                    self.geometry = Some(geometry);
                }
                Err(err) => {
                    log::debug!("live overlay hidden: {}", err);
                    self.renderer.clear();
                    self.geometry = None;
                }
            }
            self.last_result = Some((result, frame));
        }
    }

    pub fn frame_result(&mut self, event: LiveEvent) -> FrameApplied {
        if !self.active || event.ticket.0 != self.generation {
            log::debug!(
                "discarding live frame from run {} (current {})",
                event.ticket.0,
                self.generation
            );
            return FrameApplied::Stale;
        }
        if self
            .last_frame_ms
            .is_some_and(|last| event.frame_timestamp_ms < last)
        {
            log::debug!(
                "discarding out-of-order frame at {} ms",
                event.frame_timestamp_ms
            );
            return FrameApplied::Stale;
        }

        let result = match event.outcome {
            Ok(result) if result.success => result,
            Ok(result) => {
                let message = result.error_message().to_string();
                log::warn!("live detection error: {}", message);
                self.status = LiveStatus::DetectionError(message);
                return FrameApplied::Failed;
            }
            Err(message) => {
                log::warn!("live detection transport error: {}", message);
                self.status = LiveStatus::TransportError(message);
                return FrameApplied::Failed;
            }
        };

        let frame = result
            .frame_size
            .filter(|size| !size.is_empty())
            .or(event.frame_size.filter(|size| !size.is_empty()))
            .unwrap_or(self.fallback_frame);

        let geometry = match self.viewport.map(|v| compute_display_geometry(frame, v)) {
            Some(Ok(geometry)) => geometry,
            Some(Err(err)) => {
                log::debug!("live frame skipped: {}", err);
                return FrameApplied::AwaitingLayout;
            }
            None => {
                log::debug!("live frame skipped: viewport not laid out");
                return FrameApplied::AwaitingLayout;
            }
        };

        self.last_frame_ms = Some(event.frame_timestamp_ms);
        self.renderer.render(&result, Some(frame), &geometry);
        self.geometry = Some(geometry);
        self.status = LiveStatus::Detected(ResultSummary::of(&result));
        self.last_result = Some((result, frame));
        FrameApplied::Rendered
    }

    pub fn status(&self) -> &LiveStatus {
        &self.status
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    pub fn current_ticket(&self) -> Option<LiveTicket> {
        self.active.then_some(LiveTicket(self.generation))
    }

    pub fn geometry(&self) -> Option<DisplayGeometry> {
        self.geometry
    }

    pub fn overlay(&self) -> &[OverlayBox] {
        self.renderer.boxes()
    }

    fn reset_frame_state(&mut self) {
        self.renderer.clear();
        self.geometry = None;
        self.last_result = None;
        self.last_frame_ms = None;
    }
}

/// Capture/detect loop for one live run.
pub struct LiveDetection;

impl LiveDetection {
    /// Spawn the worker. Frames are captured and detected one at a time;
    /// each result is sent to `events` tagged with `ticket`.
    pub fn spawn(
        mut camera: CameraSource,
        detector: SharedDetector,
        ticket: LiveTicket,
        events: Sender<LiveEvent>,
    ) -> Result<LiveHandle> {
        camera.connect()?;
        let size = camera.frame_size();
        log::info!(
            "live run {}: {} camera, {}x{} frames",
            ticket.0,
            camera.facing(),
            size.width,
            size.height
        );
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::Builder::new()
            .name(format!("live-detect-{}", ticket.0))
            .spawn(move || {
                if let Err(err) = run_live(&mut camera, &detector, ticket, &events, &shutdown_thread)
                {
                    log::error!("live detection stopped: {:#}", err);
                }
                let stats = camera.stats();
                log::info!(
                    "live run {}: {} frames from {} ({} camera)",
                    ticket.0,
                    stats.frames_captured,
                    stats.source,
                    stats.facing
                );
            })
            .context("spawn live detection worker")?;

        Ok(LiveHandle {
            ticket,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_live(
    camera: &mut CameraSource,
    detector: &SharedDetector,
    ticket: LiveTicket,
    events: &Sender<LiveEvent>,
    shutdown: &AtomicBool,
) -> Result<()> {
    while !shutdown.load(Ordering::SeqCst) {
        let frame = camera.next_frame()?;
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let frame_timestamp_ms = frame.timestamp_ms;
        let frame_size = Some(frame.size());
        let input = DetectionInput::Frame(frame);
        let outcome = detector
            .detect(&input)
            .map_err(|err| format!("{err:#}"));

        let event = LiveEvent {
            ticket,
            frame_timestamp_ms,
            frame_size,
            outcome,
        };
        if events.send(event).is_err() {
            log::debug!("live run {}: receiver gone", ticket.0);
            break;
        }
    }
    Ok(())
}

/// Handle to a running live worker.
pub struct LiveHandle {
    ticket: LiveTicket,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl LiveHandle {
    pub fn ticket(&self) -> LiveTicket {
        self.ticket
    }

    /// Signal the worker and wait for its current frame to finish.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("live detection thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, DetectedObject};

    fn frame_event(ticket: LiveTicket, at: u64, outcome: DetectionOutcome) -> LiveEvent {
        LiveEvent {
            ticket,
            frame_timestamp_ms: at,
            frame_size: Some(ContentSize::new(1280, 720)),
            outcome,
        }
    }

    fn one_person(ms: u64) -> DetectionResult {
        DetectionResult::success(
            vec![DetectedObject::new(
                "person",
                0.9,
                BoundingBox::new(0.0, 0.0, 640.0, 360.0),
            )],
            ms,
        )
    }

    #[test]
    fn status_lines() {
        assert_eq!(LiveStatus::Starting.to_string(), "Starting detection...");
        assert_eq!(LiveStatus::Stopped.to_string(), "Detection stopped");
        assert_eq!(
            LiveStatus::DetectionError("busy".into()).to_string(),
            "Detection error: busy"
        );
        assert_eq!(
            LiveStatus::TransportError("timeout".into()).to_string(),
            "Error: timeout"
        );
    }

    #[test]
    fn frame_size_prefers_result_then_sent_frame_then_fallback() {
        let mut session = LiveSession::new(CameraFacing::Back);
        session.layout_ready(ViewportSize::new(1080, 1920));
        let ticket = session.start(CameraFacing::Back);

        let reported = one_person(10).with_frame_size(ContentSize::new(640, 480));
        assert_eq!(
            session.frame_result(frame_event(ticket, 1, Ok(reported))),
            FrameApplied::Rendered
        );
        // 640x480 in 1080x1920 -> 1080x810
        assert_eq!(session.geometry().unwrap().displayed_height, 810);

        session.frame_result(frame_event(ticket, 2, Ok(one_person(11))));
        // 1280x720 -> 1080x607
        assert_eq!(session.geometry().unwrap().displayed_height, 607);
        assert_eq!(session.overlay()[0].rect.width, 540.0);

        let mut no_size = frame_event(ticket, 3, Ok(one_person(12)));
        no_size.frame_size = None;
        session.frame_result(no_size);
        // fallback 1920x1080 -> 1080x607 as well, box is a quarter of width
        assert_eq!(session.overlay()[0].rect.width, 360.0);
        assert_eq!(session.status().to_string(), "Detected 1 objects (12 ms)");
    }

    #[test]
    fn frames_before_layout_are_skipped() {
        let mut session = LiveSession::new(CameraFacing::Back);
        let ticket = session.start(CameraFacing::Back);
        assert_eq!(
            session.frame_result(frame_event(ticket, 1, Ok(one_person(5)))),
            FrameApplied::AwaitingLayout
        );
        assert!(session.overlay().is_empty());
        assert_eq!(session.status(), &LiveStatus::Starting);
    }

    #[test]
    fn stop_and_switch_discard_in_flight_frames() {
        let mut session = LiveSession::new(CameraFacing::Back);
        session.layout_ready(ViewportSize::new(1080, 1920));
        let first = session.start(CameraFacing::Back);
        session.frame_result(frame_event(first, 1, Ok(one_person(5))));
        assert_eq!(session.overlay().len(), 1);

        let second = session.switch_camera().unwrap();
        assert_eq!(session.facing(), CameraFacing::Front);
        assert!(session.overlay().is_empty());
        assert_eq!(
            session.frame_result(frame_event(first, 2, Ok(one_person(6)))),
            FrameApplied::Stale
        );

        session.stop();
        assert_eq!(session.status().to_string(), "Detection stopped");
        assert_eq!(
            session.frame_result(frame_event(second, 3, Ok(one_person(7)))),
            FrameApplied::Stale
        );
        assert!(session.overlay().is_empty());

        assert!(session.toggle().is_some());
        assert!(session.is_active());
        assert!(session.toggle().is_none());
        assert!(!session.is_active());
    }

    #[test]
    fn failures_update_status_only() {
        let mut session = LiveSession::new(CameraFacing::Back);
        session.layout_ready(ViewportSize::new(1080, 1920));
        let ticket = session.start(CameraFacing::Back);
        session.frame_result(frame_event(ticket, 1, Ok(one_person(5))));

        let applied = session.frame_result(frame_event(
            ticket,
            2,
            Ok(DetectionResult::failure(Some("model busy".into()), 0)),
        ));
        assert_eq!(applied, FrameApplied::Failed);
        assert_eq!(session.status().to_string(), "Detection error: model busy");
        assert_eq!(session.overlay().len(), 1);

        session.frame_result(frame_event(ticket, 3, Err("connection refused".into())));
        assert_eq!(session.status().to_string(), "Error: connection refused");
    }

    #[test]
    fn resize_rerenders_last_frame() {
        let mut session = LiveSession::new(CameraFacing::Back);
        session.layout_ready(ViewportSize::new(1080, 1920));
        let ticket = session.start(CameraFacing::Back);
        session.frame_result(frame_event(ticket, 1, Ok(one_person(5))));
        session.layout_ready(ViewportSize::new(2560, 1440));
        assert_eq!(session.geometry().unwrap().displayed_width, 2560);
        assert_eq!(session.overlay()[0].rect.width, 1280.0);
    }

    #[test]
    fn collapsed_viewport_hides_overlay_until_laid_out() {
        let mut session = LiveSession::new(CameraFacing::Back);
        session.layout_ready(ViewportSize::new(1080, 1920));
        let ticket = session.start(CameraFacing::Back);
        session.frame_result(frame_event(ticket, 1, Ok(one_person(5))));
        assert_eq!(session.overlay().len(), 1);

        session.layout_ready(ViewportSize::new(0, 0));
        assert!(session.geometry().is_none());
        assert!(session.overlay().is_empty());

        session.layout_ready(ViewportSize::new(1080, 1920));
        assert_eq!(session.geometry().unwrap().displayed_height, 607);
        assert_eq!(session.overlay().len(), 1);
    }
}
