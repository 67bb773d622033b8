use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Service, TimeSlot};
use crate::services::catalog;
use crate::state::AppState;

// GET /api/services
pub async fn list_services() -> Json<&'static [Service]> {
    Json(catalog::all())
}

#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: Option<String>,
}

// GET /api/slots?date=YYYY-MM-DD
pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SlotsQuery>,
) -> Result<Json<Vec<TimeSlot>>, AppError> {
    let raw = params
        .date
        .ok_or_else(|| AppError::BadRequest("date is required".to_string()))?;
    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("invalid date: {raw}")))?;

    let slots = state.gateway.time_slots(date).await?;
    Ok(Json(slots))
}
