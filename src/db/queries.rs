use chrono::{NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Appointment, AppointmentStatus, Classification, Client, Conversation, DialogStep,
    LoyaltyRecord, Provider, Service,
};

const DT_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format(DT_FMT).to_string()
}

fn parse_dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DT_FMT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Providers ──

fn parse_provider_row(row: &rusqlite::Row) -> rusqlite::Result<Provider> {
    let specialties_json: String = row.get(2)?;
    let work_start: String = row.get(3)?;
    let work_end: String = row.get(4)?;
    let work_days_csv: String = row.get(5)?;

    Ok(Provider {
        id: row.get(0)?,
        name: row.get(1)?,
        specialties: serde_json::from_str(&specialties_json).unwrap_or_default(),
        work_start: NaiveTime::parse_from_str(&work_start, "%H:%M")
            .unwrap_or_else(|_| NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
        work_end: NaiveTime::parse_from_str(&work_end, "%H:%M")
            .unwrap_or_else(|_| NaiveTime::from_hms_opt(18, 0, 0).unwrap()),
        work_days: work_days_csv
            .split(',')
            .filter_map(|d| d.trim().parse().ok())
            .collect(),
        slot_interval_minutes: row.get(6)?,
        active: row.get::<_, i64>(7)? != 0,
    })
}

const PROVIDER_COLS: &str =
    "id, name, specialties, work_start, work_end, work_days, slot_interval_minutes, active";

pub fn list_active_providers(conn: &Connection) -> rusqlite::Result<Vec<Provider>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROVIDER_COLS} FROM providers WHERE active = 1 ORDER BY name ASC"
    ))?;
    let rows = stmt.query_map([], parse_provider_row)?;
    rows.collect()
}

pub fn get_provider(conn: &Connection, id: &str) -> rusqlite::Result<Option<Provider>> {
    conn.query_row(
        &format!("SELECT {PROVIDER_COLS} FROM providers WHERE id = ?1"),
        params![id],
        parse_provider_row,
    )
    .optional()
}

pub fn insert_provider(conn: &Connection, provider: &Provider) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO providers (id, name, specialties, work_start, work_end, work_days, slot_interval_minutes, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            provider.id,
            provider.name,
            serde_json::to_string(&provider.specialties).unwrap_or_else(|_| "[]".to_string()),
            provider.work_start.format("%H:%M").to_string(),
            provider.work_end.format("%H:%M").to_string(),
            provider
                .work_days
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(","),
            provider.slot_interval_minutes,
            provider.active as i64,
        ],
    )?;
    Ok(())
}

// ── Services ──

fn parse_service_row(row: &rusqlite::Row) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        duration_minutes: row.get(2)?,
        price_cents: row.get(3)?,
        category: row.get(4)?,
        display_order: row.get(5)?,
        active: row.get::<_, i64>(6)? != 0,
    })
}

const SERVICE_COLS: &str =
    "id, name, duration_minutes, price_cents, category, display_order, active";

pub fn list_active_services(conn: &Connection) -> rusqlite::Result<Vec<Service>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SERVICE_COLS} FROM services WHERE active = 1 ORDER BY display_order ASC"
    ))?;
    let rows = stmt.query_map([], parse_service_row)?;
    rows.collect()
}

pub fn get_service(conn: &Connection, id: &str) -> rusqlite::Result<Option<Service>> {
    conn.query_row(
        &format!("SELECT {SERVICE_COLS} FROM services WHERE id = ?1"),
        params![id],
        parse_service_row,
    )
    .optional()
}

pub fn insert_service(conn: &Connection, service: &Service) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, duration_minutes, price_cents, category, display_order, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            service.id,
            service.name,
            service.duration_minutes,
            service.price_cents,
            service.category,
            service.display_order,
            service.active as i64,
        ],
    )?;
    Ok(())
}

// ── Clients ──

fn parse_client_row(row: &rusqlite::Row) -> rusqlite::Result<Client> {
    let classification: String = row.get(3)?;
    let last_visit: Option<String> = row.get(5)?;
    let created_at: String = row.get(7)?;

    Ok(Client {
        id: row.get(0)?,
        phone: row.get(1)?,
        name: row.get(2)?,
        classification: Classification::parse(&classification),
        total_visits: row.get(4)?,
        last_visit_at: last_visit.map(|s| parse_dt(&s)),
        active: row.get::<_, i64>(6)? != 0,
        created_at: parse_dt(&created_at),
    })
}

const CLIENT_COLS: &str =
    "id, phone, name, classification, total_visits, last_visit_at, active, created_at";

pub fn get_client_by_phone(conn: &Connection, phone: &str) -> rusqlite::Result<Option<Client>> {
    conn.query_row(
        &format!("SELECT {CLIENT_COLS} FROM clients WHERE phone = ?1"),
        params![phone],
        parse_client_row,
    )
    .optional()
}

pub fn get_client(conn: &Connection, id: &str) -> rusqlite::Result<Option<Client>> {
    conn.query_row(
        &format!("SELECT {CLIENT_COLS} FROM clients WHERE id = ?1"),
        params![id],
        parse_client_row,
    )
    .optional()
}

/// Inserts a client along with its loyalty record.
pub fn insert_client(conn: &Connection, client: &Client) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO clients (id, phone, name, classification, total_visits, last_visit_at, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            client.id,
            client.phone,
            client.name,
            client.classification.as_str(),
            client.total_visits,
            client.last_visit_at.as_ref().map(fmt_dt),
            client.active as i64,
            fmt_dt(&client.created_at),
        ],
    )?;
    conn.execute(
        "INSERT INTO loyalty (client_id, points, cycle_visits, total_redemptions)
         VALUES (?1, 0, 0, 0)
         ON CONFLICT(client_id) DO NOTHING",
        params![client.id],
    )?;
    Ok(())
}

pub fn mark_inactive_clients(conn: &Connection, cutoff: &NaiveDateTime) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE clients SET classification = 'inactive'
         WHERE last_visit_at IS NOT NULL AND last_visit_at < ?1 AND classification != 'inactive'",
        params![fmt_dt(cutoff)],
    )
}

pub fn promote_vip_clients(conn: &Connection, min_visits: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE clients SET classification = 'vip' WHERE total_visits >= ?1",
        params![min_visits],
    )
}

/// Clients eligible for the reactivation nudge: long idle but not yet
/// reclassified as inactive, capped per run.
pub fn list_reactivation_targets(
    conn: &Connection,
    cutoff: &NaiveDateTime,
    limit: i64,
) -> rusqlite::Result<Vec<Client>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CLIENT_COLS} FROM clients
         WHERE last_visit_at IS NOT NULL AND last_visit_at < ?1
           AND classification != 'inactive' AND active = 1
         ORDER BY last_visit_at ASC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![fmt_dt(cutoff), limit], parse_client_row)?;
    rows.collect()
}

// ── Loyalty ──

pub fn get_loyalty(conn: &Connection, client_id: &str) -> rusqlite::Result<Option<LoyaltyRecord>> {
    conn.query_row(
        "SELECT client_id, points, cycle_visits, total_redemptions FROM loyalty WHERE client_id = ?1",
        params![client_id],
        |row| {
            Ok(LoyaltyRecord {
                client_id: row.get(0)?,
                points: row.get(1)?,
                cycle_visits: row.get(2)?,
                total_redemptions: row.get(3)?,
            })
        },
    )
    .optional()
}

/// Bumps loyalty counters and the client's visit totals in one go, returning
/// the updated record.
pub fn record_visit(
    conn: &Connection,
    client_id: &str,
    now: &NaiveDateTime,
) -> rusqlite::Result<LoyaltyRecord> {
    conn.execute(
        "INSERT INTO loyalty (client_id, points, cycle_visits, total_redemptions)
         VALUES (?1, 1, 1, 0)
         ON CONFLICT(client_id) DO UPDATE SET
           points = points + 1,
           cycle_visits = cycle_visits + 1",
        params![client_id],
    )?;
    conn.execute(
        "UPDATE clients SET total_visits = total_visits + 1, last_visit_at = ?2 WHERE id = ?1",
        params![client_id, fmt_dt(now)],
    )?;

    conn.query_row(
        "SELECT client_id, points, cycle_visits, total_redemptions FROM loyalty WHERE client_id = ?1",
        params![client_id],
        |row| {
            Ok(LoyaltyRecord {
                client_id: row.get(0)?,
                points: row.get(1)?,
                cycle_visits: row.get(2)?,
                total_redemptions: row.get(3)?,
            })
        },
    )
}

pub fn redeem_reward(conn: &Connection, client_id: &str) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE loyalty SET cycle_visits = 0, total_redemptions = total_redemptions + 1
         WHERE client_id = ?1",
        params![client_id],
    )?;
    Ok(count > 0)
}

// ── Appointments ──

fn parse_appointment_row(row: &rusqlite::Row) -> rusqlite::Result<Appointment> {
    let start_at: String = row.get(4)?;
    let end_at: String = row.get(5)?;
    let status: String = row.get(6)?;
    let confirmed_at: Option<String> = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Appointment {
        id: row.get(0)?,
        client_id: row.get(1)?,
        provider_id: row.get(2)?,
        service_id: row.get(3)?,
        start_at: parse_dt(&start_at),
        end_at: parse_dt(&end_at),
        status: AppointmentStatus::parse(&status),
        cancel_reason: row.get(7)?,
        reminder_sent: row.get::<_, i64>(8)? != 0,
        confirmed_at: confirmed_at.map(|s| parse_dt(&s)),
        created_at: parse_dt(&created_at),
        updated_at: parse_dt(&updated_at),
    })
}

const APPOINTMENT_COLS: &str = "id, client_id, provider_id, service_id, start_at, end_at, status, \
                                cancel_reason, reminder_sent, confirmed_at, created_at, updated_at";

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO appointments (id, client_id, provider_id, service_id, start_at, end_at, status,
                                   cancel_reason, reminder_sent, confirmed_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            appt.id,
            appt.client_id,
            appt.provider_id,
            appt.service_id,
            fmt_dt(&appt.start_at),
            fmt_dt(&appt.end_at),
            appt.status.as_str(),
            appt.cancel_reason,
            appt.reminder_sent as i64,
            appt.confirmed_at.as_ref().map(fmt_dt),
            fmt_dt(&appt.created_at),
            fmt_dt(&appt.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &str) -> rusqlite::Result<Option<Appointment>> {
    conn.query_row(
        &format!("SELECT {APPOINTMENT_COLS} FROM appointments WHERE id = ?1"),
        params![id],
        parse_appointment_row,
    )
    .optional()
}

/// Half-open overlap test against the provider's PENDING/CONFIRMED set.
/// Timestamps are stored in a lexicographically ordered format, so string
/// comparison is chronological.
pub fn has_overlap(
    conn: &Connection,
    provider_id: &str,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE provider_id = ?1 AND status IN ('pending', 'confirmed')
           AND start_at < ?3 AND end_at > ?2",
        params![provider_id, fmt_dt(start), fmt_dt(end)],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn update_status(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
    now: &NaiveDateTime,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status.as_str(), fmt_dt(now)],
    )?;
    Ok(count > 0)
}

pub fn update_status_with_reason(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
    reason: &str,
    now: &NaiveDateTime,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?2, cancel_reason = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, status.as_str(), reason, fmt_dt(now)],
    )?;
    Ok(count > 0)
}

pub fn mark_confirmed(conn: &Connection, id: &str, now: &NaiveDateTime) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = 'confirmed', confirmed_at = ?2, updated_at = ?2
         WHERE id = ?1",
        params![id, fmt_dt(now)],
    )?;
    Ok(count > 0)
}

pub fn upcoming_for_client(
    conn: &Connection,
    client_id: &str,
    now: &NaiveDateTime,
) -> rusqlite::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLS} FROM appointments
         WHERE client_id = ?1 AND status IN ('pending', 'confirmed') AND start_at >= ?2
         ORDER BY start_at ASC"
    ))?;
    let rows = stmt.query_map(params![client_id, fmt_dt(now)], parse_appointment_row)?;
    rows.collect()
}

pub fn upcoming_for_provider(
    conn: &Connection,
    provider_id: &str,
    now: &NaiveDateTime,
) -> rusqlite::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLS} FROM appointments
         WHERE provider_id = ?1 AND status IN ('pending', 'confirmed') AND start_at >= ?2
         ORDER BY start_at ASC"
    ))?;
    let rows = stmt.query_map(params![provider_id, fmt_dt(now)], parse_appointment_row)?;
    rows.collect()
}

pub fn upcoming_count_for_provider(
    conn: &Connection,
    provider_id: &str,
    now: &NaiveDateTime,
) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE provider_id = ?1 AND status IN ('pending', 'confirmed') AND start_at >= ?2",
        params![provider_id, fmt_dt(now)],
        |row| row.get(0),
    )
}

/// PENDING appointments inside the reminder window that have not been
/// reminded yet.
pub fn reminder_candidates(
    conn: &Connection,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> rusqlite::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLS} FROM appointments
         WHERE status = 'pending' AND reminder_sent = 0
           AND start_at >= ?1 AND start_at <= ?2
         ORDER BY start_at ASC"
    ))?;
    let rows = stmt.query_map(params![fmt_dt(from), fmt_dt(to)], parse_appointment_row)?;
    rows.collect()
}

/// One-way flag: only flips 0 -> 1, so a second dispatch in the same window
/// finds nothing to do. Also bumps `updated_at`, which starts the clock for
/// the no-answer cleanup.
pub fn set_reminder_sent(
    conn: &Connection,
    id: &str,
    now: &NaiveDateTime,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET reminder_sent = 1, updated_at = ?2
         WHERE id = ?1 AND reminder_sent = 0",
        params![id, fmt_dt(now)],
    )?;
    Ok(count > 0)
}

/// Future PENDING appointments that were reminded but have sat unanswered
/// past the cutoff.
pub fn unconfirmed_candidates(
    conn: &Connection,
    now: &NaiveDateTime,
    cutoff: &NaiveDateTime,
) -> rusqlite::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLS} FROM appointments
         WHERE status = 'pending' AND reminder_sent = 1
           AND start_at >= ?1 AND updated_at <= ?2
         ORDER BY start_at ASC"
    ))?;
    let rows = stmt.query_map(params![fmt_dt(now), fmt_dt(cutoff)], parse_appointment_row)?;
    rows.collect()
}

pub fn list_appointments(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> rusqlite::Result<Vec<Appointment>> {
    match status_filter {
        Some(status) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {APPOINTMENT_COLS} FROM appointments WHERE status = ?1
                 ORDER BY start_at DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![status, limit], parse_appointment_row)?;
            rows.collect()
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {APPOINTMENT_COLS} FROM appointments ORDER BY start_at DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], parse_appointment_row)?;
            rows.collect()
        }
    }
}

pub struct DashboardStats {
    pub appointments_today: i64,
    pub appointments_upcoming: i64,
    pub total_clients: i64,
    pub vip_clients: i64,
    pub inactive_clients: i64,
    pub not_confirmed: i64,
}

pub fn get_dashboard_stats(
    conn: &Connection,
    day_start: &NaiveDateTime,
    day_end: &NaiveDateTime,
) -> rusqlite::Result<DashboardStats> {
    let appointments_today: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE start_at >= ?1 AND start_at <= ?2 AND status NOT IN ('canceled', 'not_confirmed')",
        params![fmt_dt(day_start), fmt_dt(day_end)],
        |row| row.get(0),
    )?;
    let appointments_upcoming: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE start_at >= ?1 AND status IN ('pending', 'confirmed')",
        params![fmt_dt(day_start)],
        |row| row.get(0),
    )?;
    let total_clients: i64 =
        conn.query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))?;
    let vip_clients: i64 = conn.query_row(
        "SELECT COUNT(*) FROM clients WHERE classification = 'vip'",
        [],
        |row| row.get(0),
    )?;
    let inactive_clients: i64 = conn.query_row(
        "SELECT COUNT(*) FROM clients WHERE classification = 'inactive'",
        [],
        |row| row.get(0),
    )?;
    let not_confirmed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE status = 'not_confirmed'",
        [],
        |row| row.get(0),
    )?;

    Ok(DashboardStats {
        appointments_today,
        appointments_upcoming,
        total_clients,
        vip_clients,
        inactive_clients,
        not_confirmed,
    })
}

// ── Conversations ──

pub fn get_conversation(conn: &Connection, phone: &str) -> anyhow::Result<Option<Conversation>> {
    let row = conn
        .query_row(
            "SELECT phone, step, client_id, invalid_attempts, updated_at
             FROM conversations WHERE phone = ?1",
            params![phone],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((phone, step_json, client_id, invalid_attempts, updated_at)) => {
            // A payload that no longer deserializes resets to the menu rather
            // than wedging the conversation.
            let step: DialogStep =
                serde_json::from_str(&step_json).unwrap_or(DialogStep::Menu);
            Ok(Some(Conversation {
                phone,
                step,
                client_id,
                invalid_attempts,
                updated_at: parse_dt(&updated_at),
            }))
        }
        None => Ok(None),
    }
}

pub fn save_conversation(conn: &Connection, conv: &Conversation) -> anyhow::Result<()> {
    let step_json = serde_json::to_string(&conv.step)?;
    conn.execute(
        "INSERT INTO conversations (phone, step, client_id, invalid_attempts, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(phone) DO UPDATE SET
           step = excluded.step,
           client_id = excluded.client_id,
           invalid_attempts = excluded.invalid_attempts,
           updated_at = excluded.updated_at",
        params![
            conv.phone,
            step_json,
            conv.client_id,
            conv.invalid_attempts,
            fmt_dt(&conv.updated_at),
        ],
    )?;
    Ok(())
}

pub fn reset_conversation(
    conn: &Connection,
    phone: &str,
    client_id: Option<&str>,
    now: &NaiveDateTime,
) -> anyhow::Result<()> {
    save_conversation(
        conn,
        &Conversation {
            phone: phone.to_string(),
            step: DialogStep::Menu,
            client_id: client_id.map(|s| s.to_string()),
            invalid_attempts: 0,
            updated_at: *now,
        },
    )
}

// ── Settings ──

pub fn get_setting(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM settings WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

// ── Rate Limits ──

fn current_hour_window() -> String {
    Utc::now().format("%Y-%m-%d %H:00:00").to_string()
}

pub fn increment_message_count(conn: &Connection, phone: &str) -> rusqlite::Result<i64> {
    let window = current_hour_window();

    conn.execute(
        "INSERT INTO rate_limits (phone, message_count, window_start)
         VALUES (?1, 1, ?2)
         ON CONFLICT(phone, window_start) DO UPDATE SET message_count = message_count + 1",
        params![phone, window],
    )?;

    conn.query_row(
        "SELECT message_count FROM rate_limits WHERE phone = ?1 AND window_start = ?2",
        params![phone, window],
        |row| row.get(0),
    )
}

pub fn cleanup_old_windows(conn: &Connection) -> rusqlite::Result<()> {
    let cutoff = (Utc::now() - chrono::Duration::hours(2))
        .format("%Y-%m-%d %H:00:00")
        .to_string();
    conn.execute(
        "DELETE FROM rate_limits WHERE window_start < ?1",
        params![cutoff],
    )?;
    Ok(())
}
