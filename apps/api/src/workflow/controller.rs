//! Workflow controller. Drives sessions through the generation pipeline.
//!
//! Flow: begin_submit (validate → generating) → extract_skills →
//!       synthesize_resume → display.
//! Cover letter and interview questions run independently from `display`.

use std::sync::Arc;

use tracing::info;

use crate::llm_client::prompts::string_array_schema;
use crate::llm_client::{generate_json, GenerationService};
use crate::workflow::prompts::{
    build_cover_letter_prompt, build_interview_prompt, build_resume_prompt, build_skills_prompt,
};
use crate::workflow::session::{Operation, ResultSlot, Ticket};
use crate::workflow::store::SessionHandle;
use crate::workflow::WorkflowError;

/// Releases the ticket's operation if the owning future is dropped before the
/// outcome is committed (client disconnect, task abort).
struct PendingGuard<'a> {
    session: &'a SessionHandle,
    operation: Operation,
    epoch: u64,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    fn new(session: &'a SessionHandle, ticket: &Ticket) -> Self {
        Self {
            session,
            operation: ticket.operation,
            epoch: ticket.epoch,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.session.lock().abandon(self.operation, self.epoch);
        }
    }
}

#[derive(Clone)]
pub struct WorkflowController {
    service: Arc<dyn GenerationService>,
}

impl WorkflowController {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self { service }
    }

    /// Runs the primary pipeline. The session lock is only taken between calls.
    pub async fn submit(&self, session: &SessionHandle) -> Result<(), WorkflowError> {
        let ticket = session.lock().begin_submit()?;
        info!(
            "Generating resume for role '{}'",
            ticket.profile.effective_role()
        );

        let ticket = self.extract_skills(session, ticket).await?;
        self.synthesize_resume(session, ticket).await
    }

    /// One structured call returning the transferable skills. No retry at this level.
    pub async fn extract_skills(
        &self,
        session: &SessionHandle,
        ticket: Ticket,
    ) -> Result<Ticket, WorkflowError> {
        let guard = PendingGuard::new(session, &ticket);
        let prompt = build_skills_prompt(&ticket.profile);
        let schema = string_array_schema();
        let outcome = ticket
            .run(generate_json::<Vec<String>>(
                self.service.as_ref(),
                &prompt,
                &schema,
            ))
            .await;

        let committed = session.lock().finish_skills(ticket, outcome);
        guard.disarm();
        let next = committed?;
        info!("Identified {} transferable skills", next.skills.len());
        Ok(next)
    }

    /// Prose call producing the resume. Refuses to run without skills.
    pub async fn synthesize_resume(
        &self,
        session: &SessionHandle,
        ticket: Ticket,
    ) -> Result<(), WorkflowError> {
        let guard = PendingGuard::new(session, &ticket);
        let outcome = if ticket.skills.is_empty() {
            Err(WorkflowError::NoSkills)
        } else {
            let prompt = build_resume_prompt(&ticket.profile, &ticket.skills);
            ticket.run(self.service.generate_text(&prompt)).await
        };

        let committed = session.lock().finish_resume(ticket, outcome);
        guard.disarm();
        committed?;
        info!("Resume generated");
        Ok(())
    }

    pub async fn generate_cover_letter(&self, session: &SessionHandle) -> Result<(), WorkflowError> {
        self.run_secondary(session, ResultSlot::CoverLetter).await
    }

    pub async fn generate_interview_questions(
        &self,
        session: &SessionHandle,
    ) -> Result<(), WorkflowError> {
        self.run_secondary(session, ResultSlot::InterviewQuestions)
            .await
    }

    async fn run_secondary(
        &self,
        session: &SessionHandle,
        slot: ResultSlot,
    ) -> Result<(), WorkflowError> {
        let ticket = session.lock().begin_secondary(slot)?;
        let guard = PendingGuard::new(session, &ticket);
        let prompt = match slot {
            ResultSlot::CoverLetter => build_cover_letter_prompt(&ticket.profile, &ticket.skills),
            ResultSlot::InterviewQuestions => {
                build_interview_prompt(&ticket.profile, &ticket.skills)
            }
            ResultSlot::Resume => build_resume_prompt(&ticket.profile, &ticket.skills),
        };

        let outcome = ticket.run(self.service.generate_text(&prompt)).await;
        let committed = session.lock().finish_secondary(slot, ticket, outcome);
        guard.disarm();
        committed?;
        info!("{:?} generated", slot);
        Ok(())
    }
}
