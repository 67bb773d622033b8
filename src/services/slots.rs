use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::models::TimeSlot;

pub const OPENING_HOUR: u32 = 8;
pub const CLOSING_HOUR: u32 = 18;
pub const SLOTS_PER_DAY: usize = ((CLOSING_HOUR - OPENING_HOUR) * 2) as usize;

/// Display label for a half-hour slot, e.g. `"8:00 AM"` or `"12:30 PM"`.
pub fn slot_label(hour: u32, half: bool) -> String {
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    let minutes = if half { "30" } else { "00" };
    format!("{display_hour}:{minutes} {suffix}")
}

/// Start of the slot labelled `time` on `date`, or `None` for a label that is
/// not one of the shop's slots.
pub fn slot_start(date: NaiveDate, time: &str) -> Option<NaiveDateTime> {
    (OPENING_HOUR..CLOSING_HOUR)
        .flat_map(|hour| [(hour, false), (hour, true)])
        .find(|&(hour, half)| slot_label(hour, half) == time)
        .and_then(|(hour, half)| date.and_hms_opt(hour, if half { 30 } else { 0 }, 0))
}

/// Half-hour slots from opening to closing, ascending. A slot is available
/// when it starts after `now` and fewer than `capacity` live bookings already
/// hold it.
pub fn generate_time_slots(
    date: NaiveDate,
    now: NaiveDateTime,
    booked: &HashMap<String, usize>,
    capacity: usize,
) -> Vec<TimeSlot> {
    (OPENING_HOUR..CLOSING_HOUR)
        .flat_map(|hour| [(hour, false), (hour, true)])
        .map(|(hour, half)| {
            let time = slot_label(hour, half);
            let taken = booked.get(&time).copied().unwrap_or(0);
            let upcoming = date
                .and_hms_opt(hour, if half { 30 } else { 0 }, 0)
                .is_some_and(|start| start > now);
            TimeSlot {
                id: hour * 2 + u32::from(half),
                available: upcoming && taken < capacity,
                time,
            }
        })
        .collect()
}

pub fn slots_for_date(
    conn: &Connection,
    date: NaiveDate,
    now: NaiveDateTime,
    capacity: usize,
) -> anyhow::Result<Vec<TimeSlot>> {
    let booked = queries::get_slot_occupancy(conn, &date)?;
    Ok(generate_time_slots(date, now, &booked, capacity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_twenty_ascending_slots() {
        let slots = generate_time_slots(date("2026-11-02"), at("2026-11-01 12:00"), &HashMap::new(), 1);
        assert_eq!(slots.len(), SLOTS_PER_DAY);
        assert_eq!(slots.len(), 20);
        assert_eq!(slots.first().unwrap().time, "8:00 AM");
        assert_eq!(slots.last().unwrap().time, "5:30 PM");
        assert!(slots.windows(2).all(|w| w[0].id + 1 == w[1].id));
        assert!(slots.iter().all(|s| s.available));
    }

    #[test]
    fn test_labels_around_noon() {
        assert_eq!(slot_label(11, true), "11:30 AM");
        assert_eq!(slot_label(12, false), "12:00 PM");
        assert_eq!(slot_label(13, true), "1:30 PM");
    }

    #[test]
    fn test_deterministic_for_same_input() {
        let mut booked = HashMap::new();
        booked.insert("10:00 AM".to_string(), 1);
        let a = generate_time_slots(date("2026-11-02"), at("2026-11-01 12:00"), &booked, 1);
        let b = generate_time_slots(date("2026-11-02"), at("2026-11-01 12:00"), &booked, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_booked_slot_unavailable_at_capacity() {
        let mut booked = HashMap::new();
        booked.insert("10:00 AM".to_string(), 1);

        let slots = generate_time_slots(date("2026-11-02"), at("2026-11-01 12:00"), &booked, 1);
        let ten = slots.iter().find(|s| s.time == "10:00 AM").unwrap();
        assert!(!ten.available);
        assert_eq!(slots.iter().filter(|s| !s.available).count(), 1);

        let roomier = generate_time_slots(date("2026-11-02"), at("2026-11-01 12:00"), &booked, 2);
        assert!(roomier.iter().all(|s| s.available));
    }

    #[test]
    fn test_past_date_has_no_availability() {
        let slots = generate_time_slots(date("2026-10-01"), at("2026-10-19 07:00"), &HashMap::new(), 1);
        assert_eq!(slots.len(), 20);
        assert!(slots.iter().all(|s| !s.available));
    }

    #[test]
    fn test_elapsed_slots_today_unavailable() {
        let slots = generate_time_slots(date("2026-10-19"), at("2026-10-19 16:29"), &HashMap::new(), 1);
        let open: Vec<&str> = slots
            .iter()
            .filter(|s| s.available)
            .map(|s| s.time.as_str())
            .collect();
        assert_eq!(open, vec!["4:30 PM", "5:00 PM", "5:30 PM"]);

        // A slot starting exactly now is already gone.
        let slots = generate_time_slots(date("2026-10-19"), at("2026-10-19 08:00"), &HashMap::new(), 1);
        assert!(!slots[0].available);
        assert!(slots[1].available);
    }

    #[test]
    fn test_slot_start() {
        assert_eq!(slot_start(date("2026-10-19"), "8:00 AM"), Some(at("2026-10-19 08:00")));
        assert_eq!(slot_start(date("2026-10-19"), "1:30 PM"), Some(at("2026-10-19 13:30")));
        assert_eq!(slot_start(date("2026-10-19"), "6:00 PM"), None);
        assert_eq!(slot_start(date("2026-10-19"), "10:15 AM"), None);
    }
}
