use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::state::AppState;

/// Rejects requests whose session lacks the configured feature entitlement.
/// Verified claims are passed on to handlers as a request extension.
pub async fn require_entitlement(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let feature_key = &state.config.auth.feature_key;

    match state.gate.require_feature(request.headers(), feature_key) {
        Ok(claims) => {
            debug!(
                "Entitlement '{}' granted to {} for {}",
                feature_key,
                claims.subject(),
                request.uri().path()
            );
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(e) => {
            warn!("Entitlement check failed for {}: {e}", request.uri().path());
            Err(e.into())
        }
    }
}
