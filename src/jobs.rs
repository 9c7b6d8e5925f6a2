use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use crate::db::queries;
use crate::models::{Conversation, DialogStep};
use crate::services::{booking, clients, dialog};
use crate::state::AppState;

const REACTIVATION_BATCH: i64 = 50;

/// Spawns the periodic jobs. Each loop swallows and logs its own errors so a
/// bad run never kills the scheduler.
pub fn spawn_jobs(state: Arc<AppState>) {
    let reminders = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            if let Err(e) = dispatch_reminders(&reminders).await {
                tracing::error!(error = %e, "reminder dispatch failed");
            }
        }
    });

    let unconfirmed = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30 * 60));
        loop {
            interval.tick().await;
            if let Err(e) = cancel_unconfirmed(&unconfirmed).await {
                tracing::error!(error = %e, "unconfirmed cleanup failed");
            }
        }
    });

    let reclassify = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        loop {
            interval.tick().await;
            if let Err(e) = reclassify_clients(&reclassify).await {
                tracing::error!(error = %e, "client reclassification failed");
            }
        }
    });

    let reactivation = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(7 * 24 * 60 * 60));
        loop {
            interval.tick().await;
            if let Err(e) = reactivation_campaign(&reactivation).await {
                tracing::error!(error = %e, "reactivation campaign failed");
            }
        }
    });

    tracing::info!("background jobs started");
}

/// Sends a confirmation request for PENDING appointments starting 23-25
/// hours from now. The reminder-sent flag only flips once, so running this
/// twice in the same window sends nothing the second time. State is
/// committed before any message leaves.
pub async fn dispatch_reminders(state: &Arc<AppState>) -> anyhow::Result<usize> {
    let now = state.config.now();
    let from = now + ChronoDuration::hours(23);
    let to = now + ChronoDuration::hours(25);

    let outbound = {
        let db = state.db.lock().unwrap();
        let candidates = queries::reminder_candidates(&db, &from, &to)?;

        let mut outbound = vec![];
        for appt in candidates {
            // Claim the flag first; a parallel run that lost the race skips.
            if !queries::set_reminder_sent(&db, &appt.id, &now)? {
                continue;
            }

            let Some(client) = queries::get_client(&db, &appt.client_id)? else {
                tracing::warn!(appointment = %appt.id, "reminder skipped: client missing");
                continue;
            };

            queries::save_conversation(
                &db,
                &Conversation {
                    phone: client.phone.clone(),
                    step: DialogStep::AwaitingReminderConfirmation {
                        appointment_id: appt.id.clone(),
                    },
                    client_id: Some(client.id.clone()),
                    invalid_attempts: 0,
                    updated_at: now,
                },
            )?;

            let label =
                dialog::appointment_label(&db, &appt.service_id, &appt.provider_id, appt.start_at)?;
            let message = format!(
                "Appointment reminder!\n\nHi, {}!\n\nYou have an appointment coming up:\n{}\n\n\
                 Please confirm:\n1 - Yes, I'll be there\n2 - I need to cancel\n\n\
                 If we don't hear from you within a few hours the time may be released.",
                client.name, label,
            );
            outbound.push((appt.id.clone(), client.phone, message));
        }
        outbound
    };

    let mut sent = 0;
    for (appointment_id, phone, message) in outbound {
        match state.messaging.send_message(&phone, &message).await {
            Ok(()) => {
                sent += 1;
                tracing::info!(appointment = %appointment_id, phone = %phone, "reminder sent");
            }
            Err(e) => {
                tracing::error!(appointment = %appointment_id, error = %e, "reminder delivery failed");
            }
        }
    }

    Ok(sent)
}

/// Releases slots held by reminded appointments that sat unanswered for 6+
/// hours: PENDING -> NOT_CONFIRMED, conversation back to the menu, and a
/// best-effort notice to the client.
pub async fn cancel_unconfirmed(state: &Arc<AppState>) -> anyhow::Result<usize> {
    let now = state.config.now();
    let cutoff = now - ChronoDuration::hours(6);

    let outbound = {
        let db = state.db.lock().unwrap();
        let candidates = queries::unconfirmed_candidates(&db, &now, &cutoff)?;

        let mut outbound = vec![];
        for appt in candidates {
            if let Err(e) = booking::mark_not_confirmed(
                &db,
                &appt.id,
                "Canceled automatically: no confirmation received",
                now,
            ) {
                tracing::error!(appointment = %appt.id, error = %e, "auto-cancel failed");
                continue;
            }
            tracing::info!(appointment = %appt.id, "appointment released: never confirmed");

            let Some(client) = queries::get_client(&db, &appt.client_id)? else {
                continue;
            };
            if let Err(e) = queries::reset_conversation(&db, &client.phone, Some(&client.id), &now)
            {
                tracing::error!(phone = %client.phone, error = %e, "conversation reset failed");
            }
            outbound.push(client.phone);
        }
        outbound
    };

    let released = outbound.len();
    for phone in outbound {
        let message = "Your appointment was canceled automatically because we didn't receive \
                       your confirmation.\n\nWhenever you want, just book again! \
                       (Send any message to see the menu.)";
        if let Err(e) = state.messaging.send_message(&phone, message).await {
            tracing::error!(phone = %phone, error = %e, "auto-cancel notice failed");
        }
    }

    Ok(released)
}

/// Daily reclassification sweep.
pub async fn reclassify_clients(state: &Arc<AppState>) -> anyhow::Result<()> {
    let now = state.config.now();
    let (inactive, vip) = {
        let db = state.db.lock().unwrap();
        clients::reclassify(&db, now, state.config.inactivity_days)?
    };
    tracing::info!(inactive, vip, "clients reclassified");
    Ok(())
}

/// Weekly nudge to clients who have not visited in a while. Purely
/// best-effort; delivery failures are logged and skipped.
pub async fn reactivation_campaign(state: &Arc<AppState>) -> anyhow::Result<usize> {
    let now = state.config.now();
    let targets = {
        let db = state.db.lock().unwrap();
        clients::reactivation_targets(&db, now, state.config.inactivity_days, REACTIVATION_BATCH)?
    };

    let mut sent = 0;
    for client in targets {
        let message = format!(
            "We miss you, {}!\n\nIt's been a while since your last visit. How about booking \
             some time for yourself? We have openings this week!\n\n\
             Send any message to see our services and times.",
            client.name,
        );
        match state.messaging.send_message(&client.phone, &message).await {
            Ok(()) => sent += 1,
            Err(e) => {
                tracing::error!(phone = %client.phone, error = %e, "reactivation message failed");
            }
        }
    }

    if sent > 0 {
        tracing::info!(sent, "reactivation campaign messages sent");
    }
    Ok(sent)
}
