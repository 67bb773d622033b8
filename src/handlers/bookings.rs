use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::errors::AppError;
use crate::handlers::guard;
use crate::services::gateway::BookingForm;
use crate::services::wizard::{BookingWizard, SubmitOutcome};
use crate::state::AppState;

/// Replays a complete form through the wizard so the same step validation
/// applies to API clients as to the interactive flow.
async fn fill_wizard(state: &AppState, form: BookingForm) -> Result<BookingWizard, AppError> {
    let mut wizard = BookingWizard::new();

    if let Some(service_id) = form.service_id {
        wizard.select_service(service_id);
    }
    if let Some(date) = form.date {
        wizard.select_date(date, state.gateway.as_ref()).await?;
        if let Some(time_slot) = form.time_slot.as_deref() {
            if !wizard.select_time_slot(time_slot) {
                tracing::info!(date = %date, time_slot, "requested slot is not available");
            }
        }
    }
    wizard.set_name(form.name);
    wizard.set_email(form.email);
    wizard.set_phone(form.phone);
    wizard.set_vehicle_info(form.vehicle_info);

    wizard.advance_to_confirmation();
    Ok(wizard)
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(form): Json<BookingForm>,
) -> Result<Response, AppError> {
    let session = guard::session_for(&state, &headers).await?;
    if session.current_user().is_none() {
        return Err(AppError::Unauthorized);
    }

    let mut wizard = fill_wizard(&state, form).await?;

    let response = match wizard.submit(&session, state.gateway.as_ref()).await {
        SubmitOutcome::RedirectToAuth => return Err(AppError::Unauthorized),
        SubmitOutcome::Invalid { step, fields } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "error": "booking details incomplete",
                "step": step.number(),
                "fields": fields,
            })),
        )
            .into_response(),
        SubmitOutcome::Submitted {
            booking,
            notification,
            redirect,
        } => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "booking": booking,
                "notification": notification,
                "redirect": redirect,
            })),
        )
            .into_response(),
        SubmitOutcome::Failed { notification } => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": notification.description,
                "notification": notification,
            })),
        )
            .into_response(),
    };
    Ok(response)
}
