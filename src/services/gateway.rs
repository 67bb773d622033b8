use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::models::{Booking, BookingStatus, Identity, TimeSlot};
use crate::services::{catalog, slots};

/// Everything a customer fills in while booking.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BookingForm {
    pub service_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub vehicle_info: String,
}

#[async_trait]
pub trait BookingGateway: Send + Sync {
    async fn time_slots(&self, date: NaiveDate) -> anyhow::Result<Vec<TimeSlot>>;

    /// Creates a pending booking owned by `identity`. Returns `None` (after
    /// logging why) instead of failing.
    async fn submit(&self, identity: Option<&Identity>, form: &BookingForm) -> Option<Booking>;
}

pub struct SqliteBookingGateway {
    db: Arc<Mutex<Connection>>,
    slot_capacity: usize,
    clock: fn() -> NaiveDateTime,
}

impl SqliteBookingGateway {
    pub fn new(db: Arc<Mutex<Connection>>, slot_capacity: usize) -> Self {
        Self {
            db,
            slot_capacity,
            clock: queries::now_timestamp,
        }
    }

    /// Replaces the UTC wall clock used to decide which slots have passed.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    fn insert(
        &self,
        identity: &Identity,
        service_id: i64,
        date: NaiveDate,
        time_slot: &str,
        form: &BookingForm,
    ) -> anyhow::Result<Option<Booking>> {
        let db = self.db.lock().unwrap();

        let taken = queries::count_slot_bookings(&db, &date, time_slot)?;
        if taken >= self.slot_capacity {
            tracing::warn!(date = %date, time_slot, taken, "slot already at capacity");
            return Ok(None);
        }

        let now = queries::now_timestamp();
        let vehicle_info = form.vehicle_info.trim();
        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: identity.user_id.clone(),
            service_id,
            service_title: catalog::title_for(service_id).to_string(),
            date,
            time_slot: time_slot.to_string(),
            vehicle_info: (!vehicle_info.is_empty()).then(|| vehicle_info.to_string()),
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        queries::create_booking(&db, &booking)?;
        Ok(Some(booking))
    }
}

#[async_trait]
impl BookingGateway for SqliteBookingGateway {
    async fn time_slots(&self, date: NaiveDate) -> anyhow::Result<Vec<TimeSlot>> {
        let db = self.db.lock().unwrap();
        slots::slots_for_date(&db, date, (self.clock)(), self.slot_capacity)
    }

    async fn submit(&self, identity: Option<&Identity>, form: &BookingForm) -> Option<Booking> {
        let Some(identity) = identity else {
            tracing::warn!("booking submitted without a signed-in user");
            return None;
        };

        let (Some(service_id), Some(date), Some(time_slot)) =
            (form.service_id, form.date, form.time_slot.as_deref())
        else {
            tracing::warn!(user_id = %identity.user_id, "booking submitted with missing service, date or time slot");
            return None;
        };

        let now = (self.clock)();
        let starts_later = slots::slot_start(date, time_slot).is_some_and(|start| start > now);
        if !starts_later {
            tracing::warn!(user_id = %identity.user_id, date = %date, time_slot, "booking outside bookable window");
            return None;
        }

        match self.insert(identity, service_id, date, time_slot, form) {
            Ok(Some(booking)) => {
                tracing::info!(
                    booking_id = %booking.id,
                    user_id = %identity.user_id,
                    service = %booking.service_title,
                    date = %booking.date,
                    time_slot = %booking.time_slot,
                    "booking created"
                );
                Some(booking)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::error!(error = %e, "failed to create booking");
                None
            }
        }
    }
}
