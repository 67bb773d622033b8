use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Identity};
use crate::services::dashboard::{
    self, BookingFilter, BookingPage, StatusChangeRequest, StatusFilter, MAX_PAGE_SIZE,
};
use crate::state::AppState;

// GET /api/dashboard/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub today: Option<bool>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub order: Option<String>,
    pub search: Option<String>,
}

fn parse_filter(params: &BookingsQuery, default_page_size: u32) -> Result<BookingFilter, AppError> {
    let mut filter = BookingFilter::new(default_page_size);

    if let Some(raw) = params.status.as_deref() {
        filter.status = StatusFilter::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("unknown status filter: {raw}")))?;
    }
    filter.today_only = params.today.unwrap_or(false);
    filter.page = params.page.unwrap_or(1).max(1);
    if let Some(size) = params.page_size {
        filter.page_size = size.clamp(1, MAX_PAGE_SIZE);
    }
    filter.ascending = match params.order.as_deref() {
        None | Some("desc") => false,
        Some("asc") => true,
        Some(other) => return Err(AppError::BadRequest(format!("unknown order: {other}"))),
    };
    Ok(filter)
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Identity>,
    Query(params): Query<BookingsQuery>,
) -> Result<Json<BookingPage>, AppError> {
    let filter = parse_filter(&params, state.config.page_size)?;
    let today = Utc::now().date_naive();

    let mut page = {
        let db = state.db.lock().unwrap();
        dashboard::list_bookings(&db, &viewer, &filter, today)?
    };
    if let Some(term) = params.search.as_deref() {
        page.rows = dashboard::search(&page.rows, term);
    }

    Ok(Json(page))
}

// POST /api/dashboard/bookings/:id/status
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    /// Set once the user accepted the confirmation prompt.
    #[serde(default)]
    pub confirmed: bool,
    pub expected_updated_at: Option<NaiveDateTime>,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Identity>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let target = BookingStatus::parse(&body.status)
        .ok_or_else(|| AppError::Unprocessable(format!("unknown status: {}", body.status)))?;

    let mut request = StatusChangeRequest::new(id, target);
    if let Some(expected) = body.expected_updated_at {
        request = request.expecting(expected);
    }
    if !body.confirmed {
        return Err(AppError::ConfirmationRequired);
    }
    let change = request.confirm();

    let db = state.db.lock().unwrap();
    let booking = dashboard::apply_status_change(&db, &viewer, &change)?;
    Ok(Json(booking))
}
