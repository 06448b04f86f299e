//! Intake controller
//!
//! Owns the upload/generation state machine. File reads and compose calls
//! run as spawned tasks and report back over a channel; the owner applies
//! their results with [`IntakeController::poll_events`] or
//! [`IntakeController::next_event`]. Every task carries the token that was
//! current when it started, and results whose token has since been
//! superseded are dropped.

pub mod notice;
pub mod state;

pub use notice::{Notice, NoticeCallback, NoticeLevel};
pub use state::{Phase, UploadState};

use crate::scanner::{check_file, read_selection, FileSelection};
use poet_types::{ImageDatum, PoemResult, Result, ValidationError};
use poet_vision::Composer;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinError;
use tracing::{debug, info, warn};

const READ_FAILED: &str = "Failed to read file.";

/// Why a user action was not started
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Please upload a photo first to generate a poem.")]
    NoPhoto,

    #[error("Another operation is still in progress")]
    Busy,
}

impl From<IntakeError> for poet_types::Error {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::Validation(e) => poet_types::Error::Validation(e),
            other => poet_types::Error::generation(other.to_string()),
        }
    }
}

/// Issued when a file is accepted; redeemed when its read finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    token: u64,
    file_name: String,
}

/// Issued when generation starts; redeemed when compose finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTicket {
    token: u64,
}

/// Completion of a spawned task
#[derive(Debug)]
pub enum IntakeEvent {
    PhotoRead {
        ticket: UploadTicket,
        result: Result<ImageDatum>,
    },
    PoemGenerated {
        ticket: GenerationTicket,
        result: Result<PoemResult>,
    },
}

pub struct IntakeController {
    state: UploadState,
    /// A selected file is being read
    is_processing: bool,
    /// Rejection or read failure of the last selection
    upload_error: Option<String>,
    max_upload_bytes: u64,
    composer: Arc<dyn Composer>,
    upload_token: u64,
    generation_token: u64,
    /// Spawned tasks not yet applied
    in_flight: usize,
    event_sender: UnboundedSender<IntakeEvent>,
    event_receiver: UnboundedReceiver<IntakeEvent>,
    notify: Option<NoticeCallback>,
}

impl IntakeController {
    pub fn new(composer: Arc<dyn Composer>, max_upload_bytes: u64) -> Self {
        let (event_sender, event_receiver) = unbounded_channel();
        Self {
            state: UploadState::default(),
            is_processing: false,
            upload_error: None,
            max_upload_bytes,
            composer,
            upload_token: 0,
            generation_token: 0,
            in_flight: 0,
            event_sender,
            event_receiver,
            notify: None,
        }
    }

    pub fn with_notice_callback(mut self, callback: NoticeCallback) -> Self {
        self.notify = Some(callback);
        self
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase(self.is_processing)
    }

    pub fn upload_error(&self) -> Option<&str> {
        self.upload_error.as_deref()
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    /// Whether the generate control should be enabled
    pub fn can_generate(&self) -> bool {
        self.state.photo.is_some() && !self.state.is_loading && !self.is_processing
    }

    /// Whether the file-select control should be enabled
    pub fn can_select(&self) -> bool {
        !self.state.is_loading
    }

    /// Spawned tasks whose results have not been applied yet
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Validate a selection and open a new upload.
    ///
    /// A rejected file leaves the held photo untouched.
    pub fn accept_file(
        &mut self,
        file: &FileSelection,
    ) -> std::result::Result<UploadTicket, IntakeError> {
        if !self.can_select() {
            return Err(IntakeError::Busy);
        }
        if let Err(e) = check_file(file, self.max_upload_bytes) {
            info!(file = %file.name, reason = %e, "file rejected");
            self.upload_error = Some(e.to_string());
            self.emit(Notice::error("Upload Error", e.to_string()));
            return Err(e.into());
        }

        self.upload_token += 1;
        self.is_processing = true;
        self.upload_error = None;
        debug!(file = %file.name, token = self.upload_token, "upload started");

        Ok(UploadTicket {
            token: self.upload_token,
            file_name: file.name.clone(),
        })
    }

    /// Accept a file and read it in the background
    pub fn select_file(&mut self, file: FileSelection) -> std::result::Result<(), IntakeError> {
        let ticket = self.accept_file(&file)?;
        let sender = self.event_sender.clone();
        let max_bytes = self.max_upload_bytes;
        self.in_flight += 1;

        tokio::spawn(async move {
            let work = tokio::spawn(async move { read_selection(&file, max_bytes).await });
            let result = joined(work.await, "file read");
            let _ = sender.send(IntakeEvent::PhotoRead { ticket, result });
        });
        Ok(())
    }

    /// Apply a finished read. Returns false if the upload was superseded.
    pub fn complete_upload(&mut self, ticket: UploadTicket, result: Result<ImageDatum>) -> bool {
        if ticket.token != self.upload_token {
            debug!(
                token = ticket.token,
                current = self.upload_token,
                "discarding stale upload"
            );
            return false;
        }
        self.is_processing = false;

        match result {
            Ok(photo) => {
                info!(file = %ticket.file_name, mime = photo.mime_type(), "photo ready");
                self.state.photo = Some(photo);
                self.state.poem = None;
                self.state.error = None;
                self.upload_error = None;
                self.emit(Notice::info(
                    "Photo Selected",
                    format!("{} is ready for poem generation.", ticket.file_name),
                ));
                self.state.file_name = Some(ticket.file_name);
            }
            Err(e) => {
                warn!(file = %ticket.file_name, error = %e, "file read failed");
                self.state.photo = None;
                self.state.file_name = None;
                self.state.poem = None;
                self.state.error = None;
                let message = match e {
                    poet_types::Error::Validation(v) => v.to_string(),
                    _ => READ_FAILED.to_string(),
                };
                self.emit(Notice::error("Upload Error", message.clone()));
                self.upload_error = Some(message);
            }
        }
        true
    }

    /// Move to `Generating` if allowed
    pub fn begin_generation(&mut self) -> std::result::Result<GenerationTicket, IntakeError> {
        if self.state.is_loading || self.is_processing {
            debug!("generation trigger ignored while busy");
            return Err(IntakeError::Busy);
        }
        if self.state.photo.is_none() {
            self.emit(Notice::error(
                "No Photo Uploaded",
                IntakeError::NoPhoto.to_string(),
            ));
            return Err(IntakeError::NoPhoto);
        }

        self.generation_token += 1;
        self.state.is_loading = true;
        self.state.error = None;
        self.state.poem = None;
        Ok(GenerationTicket {
            token: self.generation_token,
        })
    }

    /// Start composing a poem for the held photo in the background
    pub fn trigger_generation(&mut self) -> std::result::Result<(), IntakeError> {
        let ticket = self.begin_generation()?;
        let Some(photo) = self.state.photo.clone() else {
            return Err(IntakeError::NoPhoto);
        };
        let composer = Arc::clone(&self.composer);
        let sender = self.event_sender.clone();
        self.in_flight += 1;
        info!(token = ticket.token, "generation started");

        tokio::spawn(async move {
            let work = tokio::spawn(async move { composer.compose(&photo).await });
            let result = joined(work.await, "poem generation");
            let _ = sender.send(IntakeEvent::PoemGenerated { ticket, result });
        });
        Ok(())
    }

    /// Apply a finished compose call. Returns false if it was superseded.
    pub fn complete_generation(
        &mut self,
        ticket: GenerationTicket,
        result: Result<PoemResult>,
    ) -> bool {
        if ticket.token != self.generation_token || !self.state.is_loading {
            debug!(token = ticket.token, "discarding stale generation");
            return false;
        }
        self.state.is_loading = false;

        match result {
            Ok(poem) => {
                info!(lines = poem.line_count(), "poem generated");
                self.state.poem = Some(poem.poem);
                self.emit(Notice::info(
                    "Poem Generated!",
                    "Your poetic masterpiece is ready.",
                ));
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "poem generation failed");
                self.emit(Notice::error("Poem Generation Failed", message.clone()));
                self.state.error = Some(message);
            }
        }
        true
    }

    /// Back to `Empty`, dropping anything still in flight
    pub fn clear(&mut self) {
        self.upload_token += 1;
        self.generation_token += 1;
        self.state = UploadState::default();
        self.is_processing = false;
        self.upload_error = None;
        self.emit(Notice::info(
            "Photo Cleared",
            "Upload another photo to continue.",
        ));
    }

    /// Apply every completion that has already arrived
    pub fn poll_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.event_receiver.try_recv() {
            if self.apply(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next completion and apply it.
    ///
    /// Returns `None` when nothing is in flight, otherwise whether the
    /// completion was current.
    pub async fn next_event(&mut self) -> Option<bool> {
        if self.in_flight == 0 {
            return None;
        }
        let event = self.event_receiver.recv().await?;
        Some(self.apply(event))
    }

    /// Wait until nothing is in flight
    pub async fn settle(&mut self) {
        while self.next_event().await.is_some() {}
    }

    fn apply(&mut self, event: IntakeEvent) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        match event {
            IntakeEvent::PhotoRead { ticket, result } => self.complete_upload(ticket, result),
            IntakeEvent::PoemGenerated { ticket, result } => {
                self.complete_generation(ticket, result)
            }
        }
    }

    fn emit(&self, notice: Notice) {
        if let Some(ref callback) = self.notify {
            callback(&notice);
        }
    }
}

/// Flatten a worker task's outcome; a panicked worker still produces a
/// failed result so the completion is always delivered
fn joined<T>(outcome: std::result::Result<Result<T>, JoinError>, what: &str) -> Result<T> {
    outcome.unwrap_or_else(|e| {
        warn!(error = %e, "{} task aborted", what);
        Err(poet_types::Error::generation(format!("{} aborted unexpectedly", what)))
    })
}
