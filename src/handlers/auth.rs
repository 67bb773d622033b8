use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::handlers::guard;
use crate::models::{Identity, Session};
use crate::services::auth::SignUp;
use crate::services::session::SessionContext;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    token: String,
    expires_at: NaiveDateTime,
    user: Identity,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            token: session.token.clone(),
            expires_at: session.expires_at,
            user: session.identity.clone(),
        }
    }
}

fn new_session(state: &AppState) -> SessionContext {
    SessionContext::new(Arc::clone(&state.auth), state.auth_events.clone())
}

// POST /api/auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let mut session = new_session(&state);
    let created = session
        .sign_up(SignUp {
            email: body.email,
            password: body.password,
            full_name: body.full_name,
            phone: body.phone,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(created))))
}

// POST /api/auth/signin
pub async fn signin(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignInRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let mut session = new_session(&state);
    let established = session.sign_in(&body.email, &body.password).await?;
    Ok(Json(SessionResponse::from(established)))
}

// POST /api/auth/signout
pub async fn signout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let mut session = guard::session_for(&state, &headers).await?;
    session.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/auth/me
pub async fn me(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}
