use std::sync::Arc;

use crate::auth::EntitlementGate;
use crate::config::Config;
use crate::workflow::{SessionStore, WorkflowController};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    /// Drives generation calls. Backed by the Gemini client in production.
    pub workflow: WorkflowController,
    pub gate: Arc<EntitlementGate>,
    pub config: Config,
}
