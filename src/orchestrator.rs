//! One request cycle: resolve the image, post it, route the reply.
//!
//! The orchestrator owns everything the window shows about a request (status
//! line, label details, JSON output and overlay). File encoding and network
//! work happen in [`PreparedRequest::send`], which the app runs on a worker thread; the
//! resulting [`RequestOutcome`] is handed back to [`Orchestrator::complete`]
//! on the UI thread.

use log::{debug, info, warn};

use crate::client::{Session, Transport, VisionPayload};
use crate::error::{Result, VisionError};
use crate::geometry::DisplayGeometry;
use crate::mode::Mode;
use crate::overlay::{Overlay, OverlaySurface};
use crate::response::{
    format_reply_text, interpret, Interpretation, LabelDetails, NO_FEATURES_DETECTED,
};
use crate::source::{resolve, ImageSource, WireImage};

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Results,
    /// Full user-facing message, already prefixed with `Error: `.
    Error(String),
}

impl Status {
    pub fn text(&self) -> &str {
        match self {
            Status::Idle => "",
            Status::Loading => "Loading",
            Status::Results => "Results",
            Status::Error(message) => message,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Status::Loading)
    }
}

/// What the window shows for the current request cycle.
#[derive(Clone, Debug, Default)]
pub struct UiState {
    pub status: Status,
    pub details_visible: bool,
    pub label: Option<LabelDetails>,
    /// Shown in place of the details when a reply held nothing to display.
    pub notice: Option<String>,
    pub json_output: String,
    pub overlay: Overlay,
    interpretation: Option<Interpretation>,
}

impl UiState {
    pub fn interpretation(&self) -> Option<&Interpretation> {
        self.interpretation.as_ref()
    }
}

/// Hands out increasing ids; only the most recently issued one is accepted back.
#[derive(Clone, Debug, Default)]
pub struct JobTracker {
    counter: u64,
    current: Option<u64>,
}

impl JobTracker {
    /// Issues a new id, superseding whatever was outstanding.
    pub fn issue(&mut self) -> u64 {
        self.counter += 1;
        self.current = Some(self.counter);
        self.counter
    }

    pub fn current(&self) -> Option<u64> {
        self.current
    }

    /// Accepts `id` if it is the outstanding one and marks it done.
    pub fn settle(&mut self, id: u64) -> bool {
        if self.current == Some(id) {
            self.current = None;
            true
        } else {
            false
        }
    }
}

/// A submission that has passed validation and is ready to go over the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedRequest {
    pub job: u64,
    pub mode: Mode,
    pub endpoint: &'static str,
    pub image: WireImage,
    pub token: Option<String>,
}

impl PreparedRequest {
    /// Builds the body, reading and encoding a file image.
    pub fn payload(&self) -> Result<VisionPayload> {
        Ok(VisionPayload {
            mode: self.mode.api_code().to_owned(),
            image: self.image.encode()?,
        })
    }

    /// Encodes the image and issues exactly one POST. An image that cannot be
    /// read is reported in the outcome and nothing is posted.
    pub fn send(&self, transport: &dyn Transport) -> RequestOutcome {
        let result = self.payload().and_then(|payload| {
            debug!("Job {} posting to {}", self.job, self.endpoint);
            transport.post_json(self.endpoint, &payload, self.token.as_deref())
        });
        RequestOutcome {
            job: self.job,
            mode: self.mode,
            result,
        }
    }
}

#[derive(Debug)]
pub struct RequestOutcome {
    pub job: u64,
    pub mode: Mode,
    pub result: Result<String>,
}

#[derive(Debug, Default)]
pub struct Orchestrator {
    state: UiState,
    jobs: JobTracker,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn current_job(&self) -> Option<u64> {
        self.jobs.current()
    }

    /// Validates the source, then moves the UI into the loading state.
    ///
    /// Rejected input is shown on the status line and nothing is submitted.
    pub fn begin(
        &mut self,
        source: &ImageSource,
        mode: Mode,
        session: &Session,
    ) -> Result<PreparedRequest> {
        let resolved = match resolve(source) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.show_error(&err);
                return Err(err);
            }
        };

        let job = self.jobs.issue();

        self.state.overlay.clear_overlay();
        self.state.interpretation = None;
        self.state.details_visible = false;
        self.state.notice = None;
        self.state.status = Status::Loading;
        info!("Job {job}: {} via {} ({})", mode, resolved.endpoint, source.describe());

        Ok(PreparedRequest {
            job,
            mode,
            endpoint: resolved.endpoint,
            image: resolved.image,
            token: session.token().map(str::to_owned),
        })
    }

    /// Routes a finished request. Returns `false` when a newer submission superseded it.
    pub fn complete(&mut self, outcome: RequestOutcome, geometry: &DisplayGeometry) -> bool {
        let current = self.jobs.current();
        if !self.jobs.settle(outcome.job) {
            warn!("Dropping reply for job {} (current: {current:?})", outcome.job);
            return false;
        }

        match outcome.result {
            Ok(body) => self.apply_reply(outcome.mode, &body, geometry),
            Err(err) => self.show_error(&err),
        }
        true
    }

    fn apply_reply(&mut self, mode: Mode, body: &str, geometry: &DisplayGeometry) {
        match interpret(mode, body) {
            Ok(interpretation) => {
                self.state.status = Status::Results;
                self.state.json_output = interpretation.json_text.clone();
                self.state.label = interpretation.label.clone();
                self.state.details_visible = self.state.label.is_some();
                if mode.draws_polygons() {
                    if let Err(err) = interpretation.draw(geometry, &mut self.state.overlay) {
                        warn!("Overlay skipped: {err}");
                    }
                }
                self.state.interpretation = Some(interpretation);
            }
            Err(err @ VisionError::NoAnnotationsFound { .. }) => {
                info!("{err}");
                self.state.status = Status::Results;
                self.state.json_output =
                    format_reply_text(body).unwrap_or_else(|_| NO_FEATURES_DETECTED.to_owned());
                self.state.label = None;
                self.state.details_visible = false;
                self.state.notice = Some(NO_FEATURES_DETECTED.to_owned());
            }
            Err(err) => self.show_error(&err),
        }
    }

    /// Redraws the current reply for the geometry of this frame.
    ///
    /// Degenerate geometry leaves the overlay empty until the image has a size again.
    pub fn redraw(&mut self, geometry: &DisplayGeometry) {
        let Some(interpretation) = &self.state.interpretation else {
            return;
        };
        if !interpretation.mode.draws_polygons() {
            return;
        }
        if let Err(err) = interpretation.draw(geometry, &mut self.state.overlay) {
            debug!("Overlay not drawn: {err}");
        }
    }

    /// Uniform failure path: message on the status line, loading indicator reset.
    pub fn show_error(&mut self, err: &VisionError) {
        warn!("Request failed: {err}");
        self.state.status = Status::Error(format!("Error: {err}"));
    }

    /// Begins, sends and completes a request on the calling thread.
    pub fn submit_blocking(
        &mut self,
        source: &ImageSource,
        mode: Mode,
        session: &Session,
        transport: &dyn Transport,
        geometry: &DisplayGeometry,
    ) -> Result<()> {
        let request = self.begin(source, mode, session)?;
        let outcome = request.send(transport);
        self.complete(outcome, geometry);
        Ok(())
    }
}
