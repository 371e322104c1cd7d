//! Background execution of still-image requests.
//!
//! `submit` starts a request on the session and spawns two workers: one loads
//! the image to learn its size, the other runs detection. Both report back
//! over a channel; the owning thread applies the events to its session in
//! arrival order.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::detect::{DetectionInput, DetectorRegistry};
use crate::ingest::{ContentSource, ImageRequest};
use crate::session::{Applied, DetectionSession, PipelineEvent, RequestState, RequestTicket};

pub struct Pipeline {
    registry: Arc<DetectorRegistry>,
    load_timeout: Duration,
    tx: Sender<PipelineEvent>,
    rx: Receiver<PipelineEvent>,
}

impl Pipeline {
    pub fn new(registry: DetectorRegistry, load_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            registry: Arc::new(registry),
            load_timeout,
            tx,
            rx,
        }
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    /// Start `request` on `session`, superseding whatever it was showing.
    pub fn submit(
        &self,
        session: &mut DetectionSession,
        request: ImageRequest,
    ) -> Result<RequestTicket> {
        let ticket = session.begin_request();
        log::info!(
            "request {}: loading {}",
            ticket.generation(),
            request.describe()
        );

        let loader_tx = self.tx.clone();
        let loader_request = request.clone();
        let timeout = self.load_timeout;
        thread::Builder::new()
            .name(format!("content-loader-{}", ticket.generation()))
            .spawn(move || {
                let event = match load_content_size(&loader_request, timeout) {
                    Ok(size) => PipelineEvent::ContentLoaded { ticket, size },
                    Err(err) => PipelineEvent::ContentFailed {
                        ticket,
                        reason: format!("{err:#}"),
                    },
                };
                let _ = loader_tx.send(event);
            })
            .context("spawn content loader")?;

        let detector_tx = self.tx.clone();
        let registry = Arc::clone(&self.registry);
        thread::Builder::new()
            .name(format!("detector-{}", ticket.generation()))
            .spawn(move || {
                let outcome = detection_input(&request, timeout)
                    .and_then(|input| registry.detect(&input))
                    .map_err(|err| format!("{err:#}"));
                let _ = detector_tx.send(PipelineEvent::DetectionFinished { ticket, outcome });
            })
            .context("spawn detector")?;

        Ok(ticket)
    }

    /// Wait up to `timeout` for the next completion.
    pub fn next_event(&self, timeout: Duration) -> Option<PipelineEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            // The pipeline holds a sender, so the channel never disconnects.
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Apply completions until the current request renders, fails, or needs
    /// a layout pass to continue.
    pub fn drive(&self, session: &mut DetectionSession, timeout: Duration) -> Result<Applied> {
        let deadline = Instant::now() + timeout;
        loop {
            match session.state() {
                RequestState::Idle => return Err(anyhow!("no request in flight")),
                RequestState::AwaitingLayout => {
                    return Ok(Applied::Pending(RequestState::AwaitingLayout))
                }
                RequestState::Rendered => return Ok(Applied::Rendered),
                RequestState::Failed => {
                    let error = session
                        .error()
                        .cloned()
                        .ok_or_else(|| anyhow!("failed request has no error"))?;
                    return Ok(Applied::Failed(error));
                }
                RequestState::AwaitingContent | RequestState::AwaitingResult => {}
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(anyhow!(
                    "timed out after {:?} waiting for request {}",
                    timeout,
                    session
                        .current_ticket()
                        .map(|t| t.generation())
                        .unwrap_or_default()
                ));
            }
            if let Some(event) = self.next_event(remaining) {
                let generation = event.ticket().generation();
                if session.apply(event) == Applied::Stale {
                    log::debug!("drive: skipped completion of request {}", generation);
                }
            }
        }
    }
}

fn load_content_size(
    request: &ImageRequest,
    timeout: Duration,
) -> Result<crate::geometry::ContentSize> {
    ContentSource::new(request, timeout)?.load_size()
}

/// Local files are uploaded; remote images are fetched by the service.
fn detection_input(request: &ImageRequest, timeout: Duration) -> Result<DetectionInput> {
    match request {
        ImageRequest::LocalFile(_) => {
            let bytes = ContentSource::new(request, timeout)?.fetch()?;
            Ok(DetectionInput::Encoded(bytes))
        }
        ImageRequest::RemoteUrl(url) => Ok(DetectionInput::RemoteUrl(url.clone())),
    }
}
