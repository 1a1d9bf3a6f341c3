pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::auth::middleware::require_entitlement;
use crate::state::AppState;
use crate::workflow::handlers;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    // Everything under /sessions requires the resume feature entitlement.
    let sessions = Router::new()
        .route("/", post(handlers::handle_create_session))
        .route(
            "/:id",
            get(handlers::handle_get_session).delete(handlers::handle_delete_session),
        )
        .route("/:id/profile", patch(handlers::handle_update_profile))
        .route(
            "/:id/resume-file",
            post(handlers::handle_upload_resume)
                .delete(handlers::handle_remove_resume)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/:id/generate", post(handlers::handle_generate))
        .route("/:id/cover-letter", post(handlers::handle_cover_letter))
        .route(
            "/:id/interview-questions",
            post(handlers::handle_interview_questions),
        )
        .route("/:id/back", post(handlers::handle_back_to_form))
        .route("/:id/reset", post(handlers::handle_reset))
        .route(
            "/:id/overlay/dismiss",
            post(handlers::handle_dismiss_overlay),
        )
        .route("/:id/copy/:slot", post(handlers::handle_copy))
        .route("/:id/clipboard", get(handlers::handle_get_clipboard))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_entitlement,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/roles", get(handlers::handle_list_roles))
        .nest("/api/v1/sessions", sessions)
        .with_state(state)
}
