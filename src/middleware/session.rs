use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::error::ApiError;

/// Resolve the acting identity and make it available to handlers as
/// `Extension<Session>`. Requests without a valid session stop here with 401.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = state.sessions.resolve_session(request.headers()).await?;

    tracing::debug!(
        actor = %session.actor_id,
        tenant = %session.tenant_id,
        "Resolved session"
    );

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}
