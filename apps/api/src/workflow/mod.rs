// Resume workflow: form → generating → display.
// Implements: validation, skills extraction, resume synthesis, cover letter and
// interview question generation, cancellation and session storage.
// All LLM calls go through the GenerationService trait, never raw HTTP.

pub mod controller;
pub mod handlers;
pub mod prompts;
pub mod session;
pub mod store;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

use crate::llm_client::LlmError;
use crate::workflow::session::{Operation, WorkflowState};
use crate::workflow::validation::ValidationError;

pub use controller::WorkflowController;
pub use session::{ResultSlot, Session, SessionSnapshot};
pub use store::{SessionHandle, SessionStore};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Generation(#[from] LlmError),

    #[error("No transferable skills were identified in the resume")]
    NoSkills,

    #[error("{0} is already in progress")]
    InFlight(Operation),

    #[error("Cannot {action} while the workflow is in the {state} state")]
    InvalidState {
        action: &'static str,
        state: WorkflowState,
    },

    #[error("The request was cancelled")]
    Cancelled,
}

impl WorkflowError {
    /// The message recorded on the session when `operation` fails.
    pub fn user_message(&self, operation: Operation) -> String {
        match (self, operation) {
            (WorkflowError::Validation(e), _) => e.to_string(),
            (_, Operation::ExtractSkills) => {
                format!("Failed to analyze your resume: {self}. Please try again.")
            }
            _ => format!(
                "An error occurred while communicating with the AI: {self}. Please try again."
            ),
        }
    }
}
