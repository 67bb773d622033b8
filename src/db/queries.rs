use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, SubsecRound, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Booking, BookingStatus, Identity, Profile, Role};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_PARSE_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid timestamp {s:?}: {e}"))
}

fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Current UTC time at the precision timestamps are stored with.
pub fn now_timestamp() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}

fn now_str() -> String {
    format_timestamp(&now_timestamp())
}

// ── Users & Profiles ──

pub struct NewUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
}

pub fn insert_user(conn: &Connection, user: &NewUser) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, password_hash, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user.id, user.email, user.password_hash, user.role.as_str(), now_str()],
    )?;
    Ok(())
}

pub fn email_exists(conn: &Connection, email: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Returns `(user_id, password_hash)` for the account with this email.
pub fn get_credentials(conn: &Connection, email: &str) -> anyhow::Result<Option<(String, String)>> {
    let creds = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE email = ?1",
            params![email],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(creds)
}

pub fn get_identity(conn: &Connection, user_id: &str) -> anyhow::Result<Option<Identity>> {
    let identity = conn
        .query_row(
            "SELECT u.id, u.email, p.full_name, u.role
             FROM users u LEFT JOIN profiles p ON p.id = u.id
             WHERE u.id = ?1",
            params![user_id],
            |row| {
                let role: String = row.get(3)?;
                Ok(Identity {
                    user_id: row.get(0)?,
                    email: row.get(1)?,
                    full_name: row.get(2)?,
                    role: Role::parse(&role),
                })
            },
        )
        .optional()?;
    Ok(identity)
}

pub fn upsert_profile(conn: &Connection, profile: &Profile) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO profiles (id, full_name, phone) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
           full_name = excluded.full_name,
           phone = excluded.phone",
        params![profile.id, profile.full_name, profile.phone],
    )?;
    Ok(())
}

pub fn get_profiles_by_ids(
    conn: &Connection,
    ids: &[String],
) -> anyhow::Result<HashMap<String, Profile>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT id, full_name, phone FROM profiles WHERE id IN ({})",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok(Profile {
            id: row.get(0)?,
            full_name: row.get(1)?,
            phone: row.get(2)?,
        })
    })?;

    let mut profiles = HashMap::new();
    for row in rows {
        let profile = row?;
        profiles.insert(profile.id.clone(), profile);
    }
    Ok(profiles)
}

// ── Sessions ──

pub fn create_session(
    conn: &Connection,
    token: &str,
    user_id: &str,
    expires_at: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token, user_id, now_str(), format_timestamp(expires_at)],
    )?;
    Ok(())
}

/// Returns `(user_id, expires_at)` for a session that has not yet expired.
pub fn get_live_session(
    conn: &Connection,
    token: &str,
) -> anyhow::Result<Option<(String, NaiveDateTime)>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT user_id, expires_at FROM sessions WHERE token = ?1 AND expires_at > ?2",
            params![token, now_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((user_id, expires_at)) => Ok(Some((user_id, parse_timestamp(&expires_at)?))),
        None => Ok(None),
    }
}

pub fn delete_session(conn: &Connection, token: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(count > 0)
}

pub fn expire_old_sessions(conn: &Connection) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![now_str()],
    )?;
    Ok(count)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, user_id, service_id, service_title, date, time_slot, vehicle_info, status, created_at, updated_at";

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, service_id, service_title, date, time_slot, vehicle_info, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            booking.id,
            booking.user_id,
            booking.service_id,
            booking.service_title,
            format_date(&booking.date),
            booking.time_slot,
            booking.vehicle_info,
            booking.status.as_str(),
            format_timestamp(&booking.created_at),
            format_timestamp(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;

    result.transpose()
}

/// Number of live (non-cancelled) bookings per time slot on `date`.
pub fn get_slot_occupancy(
    conn: &Connection,
    date: &NaiveDate,
) -> anyhow::Result<HashMap<String, usize>> {
    let mut stmt = conn.prepare(
        "SELECT time_slot, COUNT(*) FROM bookings
         WHERE date = ?1 AND status != 'cancelled'
         GROUP BY time_slot",
    )?;
    let rows = stmt.query_map(params![format_date(date)], |row| {
        let slot: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((slot, count as usize))
    })?;

    let mut occupancy = HashMap::new();
    for row in rows {
        let (slot, count) = row?;
        occupancy.insert(slot, count);
    }
    Ok(occupancy)
}

pub fn count_slot_bookings(
    conn: &Connection,
    date: &NaiveDate,
    time_slot: &str,
) -> anyhow::Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE date = ?1 AND time_slot = ?2 AND status != 'cancelled'",
        params![format_date(date), time_slot],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Equality filters and ordering for a booking listing.
#[derive(Debug, Clone, Default)]
pub struct BookingQuery {
    pub user_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub date: Option<NaiveDate>,
    pub ascending: bool,
}

impl BookingQuery {
    fn where_clause(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut clauses = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(user_id) = &self.user_id {
            values.push(Box::new(user_id.clone()));
            clauses.push(format!("user_id = ?{}", values.len()));
        }
        if let Some(status) = &self.status {
            values.push(Box::new(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", values.len()));
        }
        if let Some(date) = &self.date {
            values.push(Box::new(format_date(date)));
            clauses.push(format!("date = ?{}", values.len()));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

pub fn count_bookings(conn: &Connection, query: &BookingQuery) -> anyhow::Result<i64> {
    let (where_sql, values) = query.where_clause();
    let sql = format!("SELECT COUNT(*) FROM bookings{where_sql}");
    let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
    let count = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
    Ok(count)
}

pub fn list_bookings(
    conn: &Connection,
    query: &BookingQuery,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (where_sql, mut values) = query.where_clause();
    let direction = if query.ascending { "ASC" } else { "DESC" };

    values.push(Box::new(limit));
    let limit_idx = values.len();
    values.push(Box::new(offset));
    let offset_idx = values.len();

    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings{where_sql} \
         ORDER BY date {direction}, created_at {direction}, id {direction} \
         LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Overwrites status and `updated_at`. When `expected_updated_at` is given the
/// write only happens if the row still carries that timestamp.
pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    updated_at: &NaiveDateTime,
    expected_updated_at: Option<&NaiveDateTime>,
) -> anyhow::Result<bool> {
    let count = match expected_updated_at {
        Some(expected) => conn.execute(
            "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3 AND updated_at = ?4",
            params![
                status.as_str(),
                format_timestamp(updated_at),
                id,
                format_timestamp(expected)
            ],
        )?,
        None => conn.execute(
            "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), format_timestamp(updated_at), id],
        )?,
    };
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let date_str: String = row.get(4)?;
    let status_str: String = row.get(7)?;
    let created_at_str: String = row.get(8)?;
    let updated_at_str: String = row.get(9)?;

    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking status: {status_str}"))?;
    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid booking date {date_str:?}: {e}"))?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        service_id: row.get(2)?,
        service_title: row.get(3)?,
        date,
        time_slot: row.get(5)?,
        vehicle_info: row.get(6)?,
        status,
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: parse_timestamp(&updated_at_str)?,
    })
}
