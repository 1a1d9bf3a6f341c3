//! Per-session workflow state and its transitions.
//!
//! Every transition is a synchronous method on `Session`. Network calls happen
//! outside the lock: a `begin_*` method registers the operation and hands out a
//! `Ticket`, the caller awaits the service, and the matching `finish_*` method
//! commits the outcome if the session has not been reset in the meantime.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::clipboard::{copy_to_clipboard, Clipboard, MemoryClipboard};
use crate::llm_client::LlmError;
use crate::models::{Profile, ProfileUpdate};
use crate::workflow::validation::validate;
use crate::workflow::WorkflowError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Form,
    Generating,
    Display,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkflowState::Form => "form",
            WorkflowState::Generating => "generating",
            WorkflowState::Display => "display",
        })
    }
}

/// A generation call that can be in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ExtractSkills,
    SynthesizeResume,
    CoverLetter,
    InterviewQuestions,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::ExtractSkills => "skills extraction",
            Operation::SynthesizeResume => "resume generation",
            Operation::CoverLetter => "cover letter generation",
            Operation::InterviewQuestions => "interview question generation",
        })
    }
}

impl Operation {
    /// Skills extraction and resume synthesis run while the session is `generating`.
    pub fn is_primary(self) -> bool {
        matches!(self, Operation::ExtractSkills | Operation::SynthesizeResume)
    }
}

/// A text field of the result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSlot {
    Resume,
    CoverLetter,
    InterviewQuestions,
}

impl ResultSlot {
    fn operation(self) -> Operation {
        match self {
            ResultSlot::Resume => Operation::SynthesizeResume,
            ResultSlot::CoverLetter => Operation::CoverLetter,
            ResultSlot::InterviewQuestions => Operation::InterviewQuestions,
        }
    }
}

/// Generated content. Each field is overwritten on regeneration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub transferable_skills: Vec<String>,
    pub resume: Option<String>,
    pub cover_letter: Option<String>,
    pub interview_questions: Option<String>,
}

impl GenerationResult {
    pub fn slot(&self, slot: ResultSlot) -> Option<&str> {
        match slot {
            ResultSlot::Resume => self.resume.as_deref(),
            ResultSlot::CoverLetter => self.cover_letter.as_deref(),
            ResultSlot::InterviewQuestions => self.interview_questions.as_deref(),
        }
    }

    fn set_slot(&mut self, slot: ResultSlot, text: String) {
        match slot {
            ResultSlot::Resume => self.resume = Some(text),
            ResultSlot::CoverLetter => self.cover_letter = Some(text),
            ResultSlot::InterviewQuestions => self.interview_questions = Some(text),
        }
    }
}

/// Serializable view of a session, returned by every API call.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub state: WorkflowState,
    pub profile: Profile,
    pub has_resume_text: bool,
    pub result: GenerationResult,
    pub error: Option<String>,
    pub pending: Vec<Operation>,
    pub overlay: Option<ResultSlot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Handed out when an operation is dispatched. Carries the inputs captured
/// under the lock and the cancellation signal for the current epoch.
#[derive(Debug)]
pub struct Ticket {
    pub operation: Operation,
    pub epoch: u64,
    pub profile: Profile,
    pub skills: Vec<String>,
    cancel: watch::Receiver<bool>,
}

impl Ticket {
    /// Drives `call` to completion unless the session is reset or closed first.
    pub async fn run<T, F>(&self, call: F) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, LlmError>>,
    {
        let mut cancel = self.cancel.clone();
        tokio::select! {
            outcome = call => outcome.map_err(WorkflowError::from),
            _ = cancel.wait_for(|cancelled| *cancelled) => Err(WorkflowError::Cancelled),
        }
    }
}

const INTERRUPTED_MESSAGE: &str = "Generation was interrupted. Please try again.";

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    /// Token subject of the user who created the session.
    owner: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_active: Instant,
    state: WorkflowState,
    profile: Profile,
    result: GenerationResult,
    error: Option<String>,
    pending: BTreeSet<Operation>,
    overlay: Option<ResultSlot>,
    epoch: u64,
    cancel: watch::Sender<bool>,
    clipboard: MemoryClipboard,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        let (cancel, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            owner: None,
            created_at: now,
            updated_at: now,
            last_active: Instant::now(),
            state: WorkflowState::Form,
            profile: Profile::default(),
            result: GenerationResult::default(),
            error: None,
            pending: BTreeSet::new(),
            overlay: None,
            epoch: 0,
            cancel,
            clipboard: MemoryClipboard::default(),
        }
    }

    pub fn owned_by(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::new()
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Sessions without an owner belong to nobody.
    pub fn belongs_to(&self, subject: &str) -> bool {
        self.owner.as_deref() == Some(subject)
    }

    /// Time since the last state change.
    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn result(&self) -> &GenerationResult {
        &self.result
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_pending(&self, operation: Operation) -> bool {
        self.pending.contains(&operation)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            state: self.state,
            profile: self.profile.clone(),
            has_resume_text: !self.profile.resume_text.trim().is_empty(),
            result: self.result.clone(),
            error: self.error.clone(),
            pending: self.pending.iter().copied().collect(),
            overlay: self.overlay,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.last_active = Instant::now();
    }

    fn ticket(&self, operation: Operation) -> Ticket {
        Ticket {
            operation,
            epoch: self.epoch,
            profile: self.profile.clone(),
            skills: self.result.transferable_skills.clone(),
            cancel: self.cancel.subscribe(),
        }
    }

    fn ensure_editable(&self, action: &'static str) -> Result<(), WorkflowError> {
        if self.state == WorkflowState::Generating {
            return Err(WorkflowError::InvalidState {
                action,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Results from an older epoch belong to a session that has since been reset.
    fn is_stale(&self, ticket: &Ticket) -> bool {
        ticket.epoch != self.epoch
    }

    // ── Profile editing ────────────────────────────────────────────────────

    pub fn update_profile(&mut self, update: ProfileUpdate) -> Result<(), WorkflowError> {
        self.ensure_editable("edit the profile")?;
        self.profile.apply(update);
        self.touch();
        Ok(())
    }

    pub fn set_resume_file(&mut self, file_name: String, text: String) -> Result<(), WorkflowError> {
        self.ensure_editable("upload a resume")?;
        self.profile.resume_text = text;
        self.profile.file_name = Some(file_name);
        self.error = None;
        self.touch();
        Ok(())
    }

    pub fn remove_resume_file(&mut self) -> Result<(), WorkflowError> {
        self.ensure_editable("remove the resume")?;
        self.profile.resume_text.clear();
        self.profile.file_name = None;
        self.touch();
        Ok(())
    }

    /// Records a user-facing error without changing state.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.touch();
    }

    // ── Primary pipeline ───────────────────────────────────────────────────

    /// Validates the profile and moves to `generating`, dispatching skills extraction.
    pub fn begin_submit(&mut self) -> Result<Ticket, WorkflowError> {
        if self.state == WorkflowState::Generating
            || self.is_pending(Operation::ExtractSkills)
            || self.is_pending(Operation::SynthesizeResume)
        {
            return Err(WorkflowError::InFlight(Operation::ExtractSkills));
        }

        // Follow-up content still in flight was built from the previous run.
        if !self.pending.is_empty() {
            self.cancel_in_flight();
        }

        self.error = None;
        if let Err(e) = validate(&self.profile) {
            self.error = Some(e.to_string());
            self.touch();
            return Err(e.into());
        }

        self.state = WorkflowState::Generating;
        self.overlay = None;
        self.result.transferable_skills.clear();
        self.pending.insert(Operation::ExtractSkills);
        self.touch();
        Ok(self.ticket(Operation::ExtractSkills))
    }

    /// Commits the skills extraction outcome. On success the session moves on
    /// to resume synthesis and the returned ticket carries the skills.
    pub fn finish_skills(
        &mut self,
        ticket: Ticket,
        outcome: Result<Vec<String>, WorkflowError>,
    ) -> Result<Ticket, WorkflowError> {
        if self.is_stale(&ticket) {
            return Err(WorkflowError::Cancelled);
        }
        self.pending.remove(&Operation::ExtractSkills);

        let skills = match outcome {
            Ok(skills) => skills
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>(),
            Err(e) => return Err(self.fail_primary(Operation::ExtractSkills, e)),
        };
        if skills.is_empty() {
            return Err(self.fail_primary(Operation::ExtractSkills, WorkflowError::NoSkills));
        }

        self.result.transferable_skills = skills;
        self.result.resume = None;
        self.pending.insert(Operation::SynthesizeResume);
        self.touch();
        Ok(self.ticket(Operation::SynthesizeResume))
    }

    /// Commits the resume synthesis outcome: `display` on success, `form` otherwise.
    pub fn finish_resume(
        &mut self,
        ticket: Ticket,
        outcome: Result<String, WorkflowError>,
    ) -> Result<(), WorkflowError> {
        if self.is_stale(&ticket) {
            return Err(WorkflowError::Cancelled);
        }
        self.pending.remove(&Operation::SynthesizeResume);

        match outcome {
            Ok(resume) => {
                self.result.resume = Some(resume);
                self.state = WorkflowState::Display;
                self.error = None;
                self.touch();
                Ok(())
            }
            Err(e) => Err(self.fail_primary(Operation::SynthesizeResume, e)),
        }
    }

    fn fail_primary(&mut self, operation: Operation, error: WorkflowError) -> WorkflowError {
        warn!("Session {}: {operation} failed: {error}", self.id);
        self.pending.remove(&Operation::ExtractSkills);
        self.pending.remove(&Operation::SynthesizeResume);
        self.state = WorkflowState::Form;
        self.error = Some(error.user_message(operation));
        self.touch();
        error
    }

    // ── Secondary calls ────────────────────────────────────────────────────

    /// Dispatches cover letter or interview question generation from `display`.
    pub fn begin_secondary(&mut self, slot: ResultSlot) -> Result<Ticket, WorkflowError> {
        let operation = slot.operation();
        if slot == ResultSlot::Resume {
            return Err(WorkflowError::InvalidState {
                action: "regenerate the resume from the display view",
                state: self.state,
            });
        }
        if self.state != WorkflowState::Display {
            return Err(WorkflowError::InvalidState {
                action: "generate follow-up content",
                state: self.state,
            });
        }
        if self.is_pending(operation) {
            return Err(WorkflowError::InFlight(operation));
        }
        if self.result.transferable_skills.is_empty() {
            return Err(WorkflowError::NoSkills);
        }

        self.pending.insert(operation);
        self.overlay = Some(slot);
        self.error = None;
        self.touch();
        Ok(self.ticket(operation))
    }

    /// Commits a secondary outcome. Failures are surfaced like primary ones but
    /// leave the workflow in `display` and the slot untouched.
    pub fn finish_secondary(
        &mut self,
        slot: ResultSlot,
        ticket: Ticket,
        outcome: Result<String, WorkflowError>,
    ) -> Result<(), WorkflowError> {
        if self.is_stale(&ticket) {
            return Err(WorkflowError::Cancelled);
        }
        let operation = slot.operation();
        self.pending.remove(&operation);

        let result = match outcome {
            Ok(text) => {
                self.result.set_slot(slot, text);
                Ok(())
            }
            Err(e) => {
                warn!("Session {}: {operation} failed: {e}", self.id);
                self.error = Some(e.user_message(operation));
                Err(e)
            }
        };
        self.touch();
        result
    }

    /// Releases an operation whose caller went away without committing an
    /// outcome. A primary operation puts the session back on the form.
    pub fn abandon(&mut self, operation: Operation, epoch: u64) {
        if epoch != self.epoch || !self.pending.remove(&operation) {
            return;
        }
        warn!("Session {}: {operation} abandoned before completion", self.id);

        if operation.is_primary() {
            self.pending.remove(&Operation::ExtractSkills);
            self.pending.remove(&Operation::SynthesizeResume);
            if self.state == WorkflowState::Generating {
                self.state = WorkflowState::Form;
                self.error = Some(INTERRUPTED_MESSAGE.to_string());
            }
        } else if self.overlay.map(ResultSlot::operation) == Some(operation) {
            self.overlay = None;
        }
        self.touch();
    }

    pub fn dismiss_overlay(&mut self) {
        self.overlay = None;
        self.touch();
    }

    // ── Navigation ─────────────────────────────────────────────────────────

    /// Back to the form, keeping profile and results.
    pub fn return_to_form(&mut self) -> Result<(), WorkflowError> {
        self.ensure_editable("return to the form")?;
        self.state = WorkflowState::Form;
        self.overlay = None;
        self.touch();
        Ok(())
    }

    /// Starts over: cancels in-flight calls and clears everything the user entered.
    pub fn reset(&mut self) {
        self.cancel_in_flight();
        self.state = WorkflowState::Form;
        self.profile = Profile::default();
        self.result = GenerationResult::default();
        self.error = None;
        self.overlay = None;
        self.touch();
    }

    /// Bumps the epoch and signals every outstanding ticket.
    pub fn cancel_in_flight(&mut self) {
        self.epoch += 1;
        self.pending.clear();
        let (fresh, _) = watch::channel(false);
        let previous = std::mem::replace(&mut self.cancel, fresh);
        previous.send_replace(true);
    }

    // ── Clipboard ──────────────────────────────────────────────────────────

    pub fn copy_slot(&mut self, slot: ResultSlot) -> bool {
        let text = self.result.slot(slot).unwrap_or_default().to_string();
        copy_to_clipboard(&mut self.clipboard, &text)
    }

    pub fn clipboard_text(&self) -> Option<String> {
        self.clipboard.read_text()
    }
}
