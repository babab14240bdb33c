use crate::models::{Job, Mode, Outcome, PageRange, PdfFile};
use crate::services::backend::{BackendClient, BackendError};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Client-side refusals. None of them send a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("a request is already in progress")]
    Busy,

    #[error("No PDF file selected")]
    NoFile,

    #[error("Please select a PDF file only (got {})", .content_type.as_deref().unwrap_or("no type"))]
    NotPdf { content_type: Option<String> },

    #[error("Start ({start}) must be less than or equal to end ({end})")]
    InvertedRange { start: u32, end: u32 },

    #[error("{field} must be a whole number (got {raw:?})")]
    InvalidBound { field: &'static str, raw: String },
}

/// A successful attempt, kept only for as long as it is on screen.
#[derive(Debug, Clone)]
pub struct Report {
    pub attempt: Uuid,
    pub range: PageRange,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum Status {
    Idle,
    Selected { file_name: String },
    Rejected(Rejection),
    InFlight {
        attempt: Uuid,
        mode: Mode,
        range: PageRange,
        started_at: Instant,
    },
    Succeeded(Report),
    Failed(String),
}

/// Visual state of the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Idle,
    Pending,
    Success,
    Error,
}

impl Tone {
    pub fn css_class(self) -> &'static str {
        match self {
            Tone::Idle => "status-idle",
            Tone::Pending => "status-pending",
            Tone::Success => "status-success",
            Tone::Error => "status-error",
        }
    }
}

impl Status {
    pub fn tone(&self) -> Tone {
        match self {
            Status::Idle | Status::Selected { .. } => Tone::Idle,
            Status::InFlight { .. } => Tone::Pending,
            Status::Succeeded(report) if report.outcome.is_empty() => Tone::Idle,
            Status::Succeeded(_) => Tone::Success,
            Status::Rejected(_) | Status::Failed(_) => Tone::Error,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Status::Idle => "Waiting for a PDF...".to_string(),
            Status::Selected { file_name } => format!("Selected file: {file_name}"),
            Status::Rejected(rejection) => rejection.to_string(),
            Status::InFlight {
                mode: Mode::ChapterMap,
                range,
                ..
            } => format!("Scanning for chapters {range}, please wait..."),
            Status::InFlight {
                mode: Mode::TextCorrection,
                range,
                ..
            } => format!("Correcting pages {range}, please wait..."),
            Status::Succeeded(report) => match &report.outcome {
                Outcome::Chapters { chapters } if chapters.is_empty() => format!(
                    "No chapters {} found in this file, or the page headers did not match",
                    report.range
                ),
                Outcome::Chapters { chapters } => {
                    format!("Done! Found {} chapters", chapters.len())
                }
                Outcome::CorrectedText(text) => format!(
                    "Processed successfully (read page {} of {})",
                    text.pages
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| report.range.to_string()),
                    text.filename.as_deref().unwrap_or("the uploaded file"),
                ),
            },
            Status::Failed(message) => format!("Error: {message}"),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, Status::InFlight { .. })
    }

    pub fn report(&self) -> Option<&Report> {
        match self {
            Status::Succeeded(report) => Some(report),
            _ => None,
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.report().map(|report| report.elapsed)
    }
}

/// In-memory state of one upload-and-report page.
#[derive(Debug)]
pub struct Session {
    selection: Option<PdfFile>,
    range: PageRange,
    mode: Mode,
    status: Status,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(PageRange::default())
    }
}

impl Session {
    pub fn new(range: PageRange) -> Self {
        Session {
            selection: None,
            range,
            mode: Mode::default(),
            status: Status::Idle,
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn selection(&self) -> Option<&PdfFile> {
        self.selection.as_ref()
    }

    pub fn range(&self) -> PageRange {
        self.range
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Replaces the selection. Any previous result is discarded either way.
    pub fn select_file(&mut self, file: PdfFile) -> Result<(), Rejection> {
        if self.status.is_in_flight() {
            return Err(Rejection::Busy);
        }

        if !file.is_pdf() {
            tracing::warn!(file = %file.name, content_type = ?file.content_type, "rejected non-PDF selection");
            let rejection = Rejection::NotPdf {
                content_type: file.content_type,
            };
            self.selection = None;
            self.status = Status::Rejected(rejection.clone());
            return Err(rejection);
        }

        tracing::info!(file = %file.name, bytes = file.data.len(), "file selected");
        self.status = Status::Selected {
            file_name: file.name.clone(),
        };
        self.selection = Some(file);
        Ok(())
    }

    /// The picker was submitted empty: drop the selection and any result.
    pub fn clear_selection(&mut self) -> Result<(), Rejection> {
        if self.status.is_in_flight() {
            return Err(Rejection::Busy);
        }
        tracing::warn!("empty file selection");
        self.selection = None;
        self.status = Status::Rejected(Rejection::NoFile);
        Err(Rejection::NoFile)
    }

    // Setters are no-ops while a request is outstanding.

    pub fn set_mode(&mut self, mode: Mode) {
        if !self.status.is_in_flight() {
            self.mode = mode;
        }
    }

    pub fn set_start(&mut self, start: u32) {
        if !self.status.is_in_flight() {
            self.range.start = start;
        }
    }

    pub fn set_end(&mut self, end: u32) {
        if !self.status.is_in_flight() {
            self.range.end = end;
        }
    }

    pub fn set_range(&mut self, range: PageRange) {
        self.set_start(range.start);
        self.set_end(range.end);
    }

    /// Runs the submission guards and, if they pass, moves to in-flight.
    ///
    /// The returned job must be handed back to [`Session::finish`] with the
    /// backend's answer. While it is outstanding every further call returns
    /// [`Rejection::Busy`] and leaves the status untouched.
    pub fn begin_submit(&mut self) -> Result<Job, Rejection> {
        if self.status.is_in_flight() {
            tracing::debug!("submit ignored, request already in flight");
            return Err(Rejection::Busy);
        }

        let Some(file) = self.selection.clone() else {
            return Err(self.reject(Rejection::NoFile));
        };

        if !self.range.is_ordered() {
            return Err(self.reject(Rejection::InvertedRange {
                start: self.range.start,
                end: self.range.end,
            }));
        }

        let attempt = Uuid::new_v4();
        tracing::info!(%attempt, mode = ?self.mode, range = %self.range, file = %file.name, "submitting");
        self.status = Status::InFlight {
            attempt,
            mode: self.mode,
            range: self.range,
            started_at: Instant::now(),
        };

        Ok(Job {
            attempt,
            mode: self.mode,
            range: self.range,
            file,
        })
    }

    /// Applies the backend's answer for `attempt`. Answers for any other attempt are dropped.
    pub fn finish(&mut self, attempt: Uuid, result: Result<Outcome, BackendError>) -> &Status {
        let (range, started_at) = match &self.status {
            Status::InFlight {
                attempt: current,
                range,
                started_at,
                ..
            } if *current == attempt => (*range, *started_at),
            _ => {
                tracing::warn!(%attempt, "dropping answer for an attempt that is not in flight");
                return &self.status;
            }
        };

        let elapsed = started_at.elapsed();
        self.status = match result {
            Ok(outcome) => {
                tracing::info!(
                    %attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    empty = outcome.is_empty(),
                    "backend answered"
                );
                Status::Succeeded(Report {
                    attempt,
                    range,
                    outcome,
                    elapsed,
                })
            }
            Err(err) => {
                tracing::warn!(%attempt, error = %err, "backend attempt failed");
                Status::Failed(err.to_string())
            }
        };
        &self.status
    }

    /// Begins, sends and finishes one attempt against `client`.
    pub async fn submit(&mut self, client: &BackendClient) -> Result<&Status, Rejection> {
        let job = self.begin_submit()?;
        let result = client.submit(&job).await;
        Ok(self.finish(job.attempt, result))
    }

    /// Records a refusal found outside the session, such as an unparseable range field.
    pub fn refuse(&mut self, rejection: Rejection) -> Rejection {
        if self.status.is_in_flight() {
            return Rejection::Busy;
        }
        self.reject(rejection)
    }

    fn reject(&mut self, rejection: Rejection) -> Rejection {
        tracing::warn!(reason = %rejection, "submission refused");
        self.status = Status::Rejected(rejection.clone());
        rejection
    }
}
