use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::errors::AppError;
use crate::services::session::SessionContext;
use crate::state::AppState;

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Builds a session context for this request and restores whatever the
/// bearer token points at. The context may still be signed out.
pub async fn session_for(state: &AppState, headers: &HeaderMap) -> Result<SessionContext, AppError> {
    let mut session = SessionContext::new(Arc::clone(&state.auth), state.auth_events.clone());
    session.restore(bearer_token(headers)).await?;
    Ok(session)
}

/// Rejects requests without a live session and exposes the caller's
/// `Identity` to downstream handlers as an extension.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = session_for(&state, request.headers()).await?;
    let Some(identity) = session.current_user().cloned() else {
        tracing::debug!(path = %request.uri().path(), "no session, redirecting to sign-in");
        return Err(AppError::Unauthorized);
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc-123"));
        assert_eq!(bearer_token(&headers), Some("abc-123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
