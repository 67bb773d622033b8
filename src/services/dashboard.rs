use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries::{self, BookingQuery};
use crate::models::{Booking, BookingStatus, Identity, Profile};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(BookingStatus),
}

impl StatusFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" | "all" => Some(StatusFilter::All),
            other => BookingStatus::parse(other).map(StatusFilter::Only),
        }
    }

    fn status(&self) -> Option<BookingStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Only(status) => Some(*status),
        }
    }
}

/// Upper bound on rows per page, whatever the caller or config asks for.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingFilter {
    pub status: StatusFilter,
    pub today_only: bool,
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
    pub ascending: bool,
}

impl BookingFilter {
    pub fn new(page_size: u32) -> Self {
        Self {
            status: StatusFilter::All,
            today_only: false,
            page: 1,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            ascending: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingRow {
    #[serde(flatten)]
    pub booking: Booking,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingPage {
    pub rows: Vec<BookingRow>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: i64,
    pub total_pages: i64,
}

pub fn total_pages(count: i64, page_size: u32) -> i64 {
    let size = i64::from(page_size.max(1));
    (count + size - 1) / size
}

/// Admins see every booking with the owner's profile attached; everybody else
/// only sees their own rows.
pub fn list_bookings(
    conn: &Connection,
    viewer: &Identity,
    filter: &BookingFilter,
    today: NaiveDate,
) -> anyhow::Result<BookingPage> {
    let query = BookingQuery {
        user_id: (!viewer.is_admin()).then(|| viewer.user_id.clone()),
        status: filter.status.status(),
        date: filter.today_only.then_some(today),
        ascending: filter.ascending,
    };

    let page = filter.page.max(1);
    let page_size = filter.page_size.clamp(1, MAX_PAGE_SIZE);
    let offset = i64::from(page - 1).saturating_mul(i64::from(page_size));

    let total_count = queries::count_bookings(conn, &query)?;
    let bookings = queries::list_bookings(conn, &query, i64::from(page_size), offset)?;

    let mut owner_ids: Vec<String> = bookings.iter().map(|b| b.user_id.clone()).collect();
    owner_ids.sort();
    owner_ids.dedup();
    let profiles = queries::get_profiles_by_ids(conn, &owner_ids)?;

    let rows = bookings
        .into_iter()
        .map(|booking| BookingRow {
            profile: profiles.get(&booking.user_id).cloned(),
            booking,
        })
        .collect();

    Ok(BookingPage {
        rows,
        page,
        page_size,
        total_count,
        total_pages: total_pages(total_count, page_size),
    })
}

/// Case-insensitive substring match over service title, vehicle info and the
/// customer's name and phone. An empty term keeps everything.
pub fn search(rows: &[BookingRow], term: &str) -> Vec<BookingRow> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return rows.to_vec();
    }

    let matches = |value: Option<&str>| value.is_some_and(|v| v.to_lowercase().contains(&needle));

    rows.iter()
        .filter(|row| {
            let profile = row.profile.as_ref();
            matches(Some(row.booking.service_title.as_str()))
                || matches(row.booking.vehicle_info.as_deref())
                || matches(profile.and_then(|p| p.full_name.as_deref()))
                || matches(profile.and_then(|p| p.phone.as_deref()))
        })
        .cloned()
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum StatusUpdateError {
    #[error("only admins can change booking status")]
    Forbidden,

    #[error("booking not found: {0}")]
    NotFound(String),

    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("booking was modified by someone else; reload and try again")]
    Stale,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// A status change the user has asked for but not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChangeRequest {
    pub booking_id: String,
    pub target: BookingStatus,
    pub expected_updated_at: Option<NaiveDateTime>,
}

/// A status change that passed the confirmation dialog. Only this can be
/// applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedStatusChange(StatusChangeRequest);

impl StatusChangeRequest {
    pub fn new(booking_id: impl Into<String>, target: BookingStatus) -> Self {
        Self {
            booking_id: booking_id.into(),
            target,
            expected_updated_at: None,
        }
    }

    pub fn expecting(mut self, updated_at: NaiveDateTime) -> Self {
        self.expected_updated_at = Some(updated_at);
        self
    }

    pub fn confirm(self) -> ConfirmedStatusChange {
        ConfirmedStatusChange(self)
    }
}

impl ConfirmedStatusChange {
    pub fn request(&self) -> &StatusChangeRequest {
        &self.0
    }
}

pub fn apply_status_change(
    conn: &Connection,
    viewer: &Identity,
    change: &ConfirmedStatusChange,
) -> Result<Booking, StatusUpdateError> {
    let request = change.request();
    if !viewer.is_admin() {
        tracing::warn!(user_id = %viewer.user_id, booking_id = %request.booking_id, "non-admin status change refused");
        return Err(StatusUpdateError::Forbidden);
    }

    let mut booking = queries::get_booking_by_id(conn, &request.booking_id)?
        .ok_or_else(|| StatusUpdateError::NotFound(request.booking_id.clone()))?;

    if !booking.status.can_transition_to(request.target) {
        return Err(StatusUpdateError::InvalidTransition {
            from: booking.status.as_str(),
            to: request.target.as_str(),
        });
    }

    let mut now = queries::now_timestamp();
    if now <= booking.updated_at {
        now = booking.updated_at + chrono::Duration::microseconds(1);
    }

    let written = queries::update_booking_status(
        conn,
        &booking.id,
        request.target,
        &now,
        request.expected_updated_at.as_ref(),
    )?;
    if !written {
        return Err(StatusUpdateError::Stale);
    }

    tracing::info!(
        booking_id = %booking.id,
        admin = %viewer.user_id,
        from = booking.status.as_str(),
        to = request.target.as_str(),
        "booking status updated"
    );

    booking.status = request.target;
    booking.updated_at = now;
    Ok(booking)
}

/// The dashboard's local copy of one page of bookings. Writes go to the store
/// first; the cached row is patched only after the store accepted them.
#[derive(Debug, Clone)]
pub struct DashboardView {
    viewer: Identity,
    filter: BookingFilter,
    search: String,
    page: Option<BookingPage>,
    loading: bool,
}

impl DashboardView {
    pub fn new(viewer: Identity, filter: BookingFilter) -> Self {
        Self {
            viewer,
            filter,
            search: String::new(),
            page: None,
            loading: true,
        }
    }

    pub fn filter(&self) -> &BookingFilter {
        &self.filter
    }

    /// Drops the cached page; the view is loading again until the next
    /// `refresh` completes.
    pub fn set_filter(&mut self, filter: BookingFilter) {
        self.filter = filter;
        self.page = None;
        self.loading = true;
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn total_pages(&self) -> i64 {
        self.page.as_ref().map(|p| p.total_pages).unwrap_or(0)
    }

    /// Rows of the current page after the search term is applied.
    pub fn visible_rows(&self) -> Vec<BookingRow> {
        match &self.page {
            Some(page) => search(&page.rows, &self.search),
            None => Vec::new(),
        }
    }

    /// Re-runs the current query. A failed fetch leaves an empty view.
    pub fn refresh(&mut self, conn: &Connection, today: NaiveDate) {
        self.page = match list_bookings(conn, &self.viewer, &self.filter, today) {
            Ok(page) => Some(page),
            Err(e) => {
                tracing::error!(error = %e, "failed to load bookings");
                None
            }
        };
        self.loading = false;
    }

    pub fn change_status(
        &mut self,
        conn: &Connection,
        change: &ConfirmedStatusChange,
    ) -> Result<Booking, StatusUpdateError> {
        let updated = apply_status_change(conn, &self.viewer, change).map_err(|e| {
            tracing::error!(error = %e, booking_id = %change.request().booking_id, "status update failed");
            e
        })?;

        if let Some(page) = self.page.as_mut() {
            if let Some(row) = page.rows.iter_mut().find(|r| r.booking.id == updated.id) {
                row.booking.status = updated.status;
                row.booking.updated_at = updated.updated_at;
            }
        }
        Ok(updated)
    }
}
