use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::LedgerError;
use crate::models::{Appointment, AppointmentStatus, LoyaltyStanding};
use crate::services::loyalty;

/// Creates a PENDING appointment after checking the provider's calendar for
/// overlap. Check and insert run inside one transaction; together with the
/// connection mutex held by the caller this serializes racing attempts, so
/// at most one of two clients contending for the same slot succeeds and the
/// rest observe `SlotConflict`.
pub fn create_appointment(
    conn: &mut Connection,
    client_id: &str,
    provider_id: &str,
    service_id: &str,
    start_at: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<Appointment, LedgerError> {
    let service = queries::get_service(conn, service_id)?
        .ok_or_else(|| LedgerError::NotFound(format!("service {service_id}")))?;
    queries::get_provider(conn, provider_id)?
        .ok_or_else(|| LedgerError::NotFound(format!("provider {provider_id}")))?;

    if service.duration_minutes <= 0 {
        return Err(LedgerError::Validation(format!(
            "service {service_id} has a non-positive duration"
        )));
    }

    let end_at = start_at + Duration::minutes(service.duration_minutes);

    let appt = Appointment {
        id: uuid::Uuid::new_v4().to_string(),
        client_id: client_id.to_string(),
        provider_id: provider_id.to_string(),
        service_id: service_id.to_string(),
        start_at,
        end_at,
        status: AppointmentStatus::Pending,
        cancel_reason: None,
        reminder_sent: false,
        confirmed_at: None,
        created_at: now,
        updated_at: now,
    };

    let tx = conn.transaction()?;
    if queries::has_overlap(&tx, provider_id, &start_at, &end_at)? {
        return Err(LedgerError::SlotConflict);
    }
    queries::insert_appointment(&tx, &appt)?;
    tx.commit()?;

    tracing::info!(appointment = %appt.id, provider = provider_id, "appointment created");
    Ok(appt)
}

/// PENDING -> CONFIRMED, stamping the confirmation instant.
pub fn confirm_appointment(
    conn: &Connection,
    id: &str,
    now: NaiveDateTime,
) -> Result<Appointment, LedgerError> {
    let appt = queries::get_appointment(conn, id)?
        .ok_or_else(|| LedgerError::NotFound(format!("appointment {id}")))?;

    if appt.status != AppointmentStatus::Pending {
        return Err(LedgerError::InvalidTransition {
            from: appt.status.as_str().to_string(),
            to: AppointmentStatus::Confirmed.as_str().to_string(),
        });
    }

    queries::mark_confirmed(conn, id, &now)?;
    Ok(Appointment {
        status: AppointmentStatus::Confirmed,
        confirmed_at: Some(now),
        updated_at: now,
        ..appt
    })
}

/// Any non-terminal status -> CANCELED. The reason is recorded for audit and
/// is mandatory.
pub fn cancel_appointment(
    conn: &Connection,
    id: &str,
    reason: &str,
    now: NaiveDateTime,
) -> Result<Appointment, LedgerError> {
    close_appointment(conn, id, AppointmentStatus::Canceled, reason, now)
}

/// System-initiated timeout path: any non-terminal status -> NOT_CONFIRMED.
pub fn mark_not_confirmed(
    conn: &Connection,
    id: &str,
    reason: &str,
    now: NaiveDateTime,
) -> Result<Appointment, LedgerError> {
    close_appointment(conn, id, AppointmentStatus::NotConfirmed, reason, now)
}

fn close_appointment(
    conn: &Connection,
    id: &str,
    to: AppointmentStatus,
    reason: &str,
    now: NaiveDateTime,
) -> Result<Appointment, LedgerError> {
    if reason.trim().is_empty() {
        return Err(LedgerError::Validation(
            "a cancellation reason is required".to_string(),
        ));
    }

    let appt = queries::get_appointment(conn, id)?
        .ok_or_else(|| LedgerError::NotFound(format!("appointment {id}")))?;

    if appt.status.is_terminal() {
        return Err(LedgerError::InvalidTransition {
            from: appt.status.as_str().to_string(),
            to: to.as_str().to_string(),
        });
    }

    queries::update_status_with_reason(conn, id, to, reason, &now)?;
    Ok(Appointment {
        status: to,
        cancel_reason: Some(reason.to_string()),
        updated_at: now,
        ..appt
    })
}

/// PENDING/CONFIRMED -> COMPLETED. Increments the client's loyalty counters
/// in the same transaction and returns the resulting standing so the caller
/// can decide whether to announce a reward.
pub fn complete_appointment(
    conn: &mut Connection,
    id: &str,
    reward_threshold: i64,
    now: NaiveDateTime,
) -> Result<(Appointment, LoyaltyStanding), LedgerError> {
    let appt = queries::get_appointment(conn, id)?
        .ok_or_else(|| LedgerError::NotFound(format!("appointment {id}")))?;

    if !matches!(
        appt.status,
        AppointmentStatus::Pending | AppointmentStatus::Confirmed
    ) {
        return Err(LedgerError::InvalidTransition {
            from: appt.status.as_str().to_string(),
            to: AppointmentStatus::Completed.as_str().to_string(),
        });
    }

    let tx = conn.transaction()?;
    queries::update_status(&tx, id, AppointmentStatus::Completed, &now)?;
    let standing = loyalty::record_visit(&tx, &appt.client_id, reward_threshold, now)?;
    tx.commit()?;

    Ok((
        Appointment {
            status: AppointmentStatus::Completed,
            updated_at: now,
            ..appt
        },
        standing,
    ))
}

/// PENDING/CONFIRMED appointments with start >= now, chronological.
pub fn upcoming_for_client(
    conn: &Connection,
    client_id: &str,
    now: NaiveDateTime,
) -> Result<Vec<Appointment>, LedgerError> {
    Ok(queries::upcoming_for_client(conn, client_id, &now)?)
}
