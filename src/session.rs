//! Per-request presentation state.
//!
//! A request has two independent completions: the image source reports the
//! content size and the detector reports a result. They may arrive in either
//! order. Geometry, overlay and list are produced once both are present and
//! the viewport has been laid out.
//!
//! Every request is tagged with a generation. Completions carrying an older
//! generation are discarded without touching state.

use serde::Serialize;

use crate::detect::DetectionResult;
use crate::error::PipelineError;
use crate::geometry::{compute_display_geometry, ContentSize, DisplayGeometry, ViewportSize};
use crate::listing::ResultList;
use crate::overlay::{OverlayBox, OverlayRenderer};

/// Identifies one request. Only a session can issue tickets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Detector completion: `Err` carries a transport or processing failure.
pub type DetectionOutcome = Result<DetectionResult, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RequestState {
    Idle,
    AwaitingContent,
    AwaitingResult,
    /// Content and result are both in; the viewport has no size yet.
    AwaitingLayout,
    Rendered,
    Failed,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Rendered | RequestState::Failed)
    }
}

/// What applying a completion did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Applied {
    /// The completion belongs to a superseded request and was ignored.
    Stale,
    /// Still waiting on something.
    Pending(RequestState),
    Rendered,
    /// The request failed. Reported exactly once.
    Failed(PipelineError),
    /// The request had already finished; nothing changed.
    Settled,
}

/// Completion events delivered to the owning thread.
#[derive(Clone, Debug)]
pub enum PipelineEvent {
    ContentLoaded {
        ticket: RequestTicket,
        size: ContentSize,
    },
    ContentFailed {
        ticket: RequestTicket,
        reason: String,
    },
    DetectionFinished {
        ticket: RequestTicket,
        outcome: DetectionOutcome,
    },
}

impl PipelineEvent {
    pub fn ticket(&self) -> RequestTicket {
        match self {
            PipelineEvent::ContentLoaded { ticket, .. }
            | PipelineEvent::ContentFailed { ticket, .. }
            | PipelineEvent::DetectionFinished { ticket, .. } => *ticket,
        }
    }
}

/// Everything the result screen draws for a rendered request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Presentation {
    pub content: ContentSize,
    pub viewport: ViewportSize,
    pub geometry: DisplayGeometry,
    pub list: ResultList,
    pub overlay: Vec<OverlayBox>,
}

/// State of the static-image result screen.
#[derive(Debug)]
pub struct DetectionSession {
    generation: u64,
    state: RequestState,
    content: Option<ContentSize>,
    result: Option<DetectionResult>,
    viewport: Option<ViewportSize>,
    geometry: Option<DisplayGeometry>,
    renderer: OverlayRenderer,
    list: Option<ResultList>,
    error: Option<PipelineError>,
}

impl DetectionSession {
    pub fn new() -> Self {
        Self {
            generation: 0,
            state: RequestState::Idle,
            content: None,
            result: None,
            viewport: None,
            geometry: None,
            renderer: OverlayRenderer::new(),
            list: None,
            error: None,
        }
    }

    /// Start a new request, discarding everything from the previous one.
    pub fn begin_request(&mut self) -> RequestTicket {
        self.generation += 1;
        self.state = RequestState::AwaitingContent;
        self.content = None;
        self.result = None;
        self.geometry = None;
        self.renderer.clear();
        self.list = None;
        self.error = None;
        log::info!("detection request {} started", self.generation);
        RequestTicket(self.generation)
    }

    /// Apply a completion event.
    pub fn apply(&mut self, event: PipelineEvent) -> Applied {
        match event {
            PipelineEvent::ContentLoaded { ticket, size } => self.content_ready(ticket, size),
            PipelineEvent::ContentFailed { ticket, reason } => self.content_failed(ticket, reason),
            PipelineEvent::DetectionFinished { ticket, outcome } => {
                self.detection_finished(ticket, outcome)
            }
        }
    }

    pub fn content_ready(&mut self, ticket: RequestTicket, size: ContentSize) -> Applied {
        if let Some(applied) = self.reject(ticket, "content") {
            return applied;
        }
        if size.is_empty() {
            log::debug!(
                "request {}: content size {}x{} has nothing to draw",
                ticket.0,
                size.width,
                size.height
            );
            return Applied::Pending(self.state);
        }
        self.content = Some(size);
        self.advance()
    }

    pub fn content_failed(&mut self, ticket: RequestTicket, reason: impl Into<String>) -> Applied {
        if let Some(applied) = self.reject(ticket, "content failure") {
            return applied;
        }
        self.fail(PipelineError::ContentLoadFailed(reason.into()))
    }

    pub fn detection_finished(&mut self, ticket: RequestTicket, outcome: DetectionOutcome) -> Applied {
        if let Some(applied) = self.reject(ticket, "detection") {
            return applied;
        }
        match outcome {
            Ok(result) if result.success => {
                self.result = Some(result);
                self.advance()
            }
            Ok(result) => self.fail(PipelineError::detection(result.error_message())),
            Err(message) => self.fail(PipelineError::detection(message)),
        }
    }

    /// Layout-ready signal. Also call it on every viewport resize.
    pub fn layout_ready(&mut self, viewport: ViewportSize) -> Applied {
        self.viewport = Some(viewport);
        match self.state {
            RequestState::AwaitingLayout | RequestState::Rendered => self.advance(),
            state => Applied::Pending(state),
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Ticket of the request in flight, if any.
    pub fn current_ticket(&self) -> Option<RequestTicket> {
        (self.state != RequestState::Idle).then_some(RequestTicket(self.generation))
    }

    pub fn content_size(&self) -> Option<ContentSize> {
        self.content
    }

    pub fn viewport(&self) -> Option<ViewportSize> {
        self.viewport
    }

    pub fn geometry(&self) -> Option<DisplayGeometry> {
        self.geometry
    }

    pub fn overlay(&self) -> &[OverlayBox] {
        self.renderer.boxes()
    }

    pub fn result_list(&self) -> Option<&ResultList> {
        self.list.as_ref()
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    pub fn presentation(&self) -> Option<Presentation> {
        if self.state != RequestState::Rendered {
            return None;
        }
        Some(Presentation {
            content: self.content?,
            viewport: self.viewport?,
            geometry: self.geometry?,
            list: self.list.clone()?,
            overlay: self.renderer.boxes().to_vec(),
        })
    }

    fn reject(&self, ticket: RequestTicket, what: &str) -> Option<Applied> {
        if self.state == RequestState::Idle || ticket.0 != self.generation {
            log::debug!(
                "discarding stale {} completion for request {} (current {})",
                what,
                ticket.0,
                self.generation
            );
            return Some(Applied::Stale);
        }
        if self.state.is_terminal() {
            log::debug!("request {} already settled; {} ignored", ticket.0, what);
            return Some(Applied::Settled);
        }
        None
    }

    fn advance(&mut self) -> Applied {
        let (Some(content), Some(result)) = (self.content, self.result.as_ref()) else {
            self.state = if self.content.is_none() {
                RequestState::AwaitingContent
            } else {
                RequestState::AwaitingResult
            };
            return Applied::Pending(self.state);
        };
        let Some(viewport) = self.viewport else {
            self.state = RequestState::AwaitingLayout;
            return Applied::Pending(self.state);
        };
        let geometry = match compute_display_geometry(content, viewport) {
            Ok(geometry) => geometry,
            Err(err) => {
                log::debug!("request {}: deferring render, {}", self.generation, err);
                // boxes and list were projected for the previous viewport
                self.geometry = None;
                self.renderer.clear();
                self.list = None;
                self.state = RequestState::AwaitingLayout;
                return Applied::Pending(self.state);
            }
        };

        self.geometry = Some(geometry);
        self.renderer.render(result, Some(content), &geometry);
        self.list = Some(ResultList::compose(result));
        self.state = RequestState::Rendered;
        log::info!(
            "request {}: rendered {} objects into {}x{} at ({}, {})",
            self.generation,
            result.objects.len(),
            geometry.displayed_width,
            geometry.displayed_height,
            geometry.offset_x,
            geometry.offset_y
        );
        Applied::Rendered
    }

    fn fail(&mut self, error: PipelineError) -> Applied {
        log::warn!("request {} failed: {}", self.generation, error);
        self.state = RequestState::Failed;
        self.geometry = None;
        self.renderer.clear();
        self.list = None;
        self.error = Some(error.clone());
        Applied::Failed(error)
    }
}

impl Default for DetectionSession {
    fn default() -> Self {
        Self::new()
    }
}
