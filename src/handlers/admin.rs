use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, LoyaltyStanding};
use crate::services::{booking, loyalty};
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

#[derive(Serialize)]
pub struct AppointmentResponse {
    id: String,
    client_id: String,
    provider_id: String,
    service_id: String,
    start_at: String,
    end_at: String,
    status: String,
    cancel_reason: Option<String>,
    reminder_sent: bool,
}

impl AppointmentResponse {
    fn from_model(a: Appointment) -> Self {
        Self {
            id: a.id,
            client_id: a.client_id,
            provider_id: a.provider_id,
            service_id: a.service_id,
            start_at: a.start_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            end_at: a.end_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            status: a.status.as_str().to_string(),
            cancel_reason: a.cancel_reason,
            reminder_sent: a.reminder_sent,
        }
    }
}

// GET /api/admin/dashboard
#[derive(Serialize)]
pub struct DashboardResponse {
    appointments_today: i64,
    appointments_upcoming: i64,
    total_clients: i64,
    vip_clients: i64,
    inactive_clients: i64,
    not_confirmed: i64,
}

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now = state.config.now();
    let day_start = now.date().and_hms_opt(0, 0, 0).unwrap_or(now);
    let day_end = now.date().and_hms_opt(23, 59, 59).unwrap_or(now);

    let stats = {
        let db = state.db.lock().unwrap();
        queries::get_dashboard_stats(&db, &day_start, &day_end)?
    };

    Ok(Json(DashboardResponse {
        appointments_today: stats.appointments_today,
        appointments_upcoming: stats.appointments_upcoming,
        total_clients: stats.total_clients,
        vip_clients: stats.vip_clients,
        inactive_clients: stats.inactive_clients,
        not_confirmed: stats.not_confirmed,
    }))
}

// GET /api/admin/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50);
    let appointments = {
        let db = state.db.lock().unwrap();
        queries::list_appointments(&db, query.status.as_deref(), limit)?
    };

    Ok(Json(
        appointments
            .into_iter()
            .map(AppointmentResponse::from_model)
            .collect(),
    ))
}

// POST /api/admin/appointments/:id/complete
#[derive(Serialize)]
pub struct CompleteResponse {
    appointment: AppointmentResponse,
    loyalty: LoyaltyStanding,
}

pub async fn complete_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CompleteResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let (appointment, standing, client_phone, client_name) = {
        let mut db = state.db.lock().unwrap();
        let (appointment, standing) = booking::complete_appointment(
            &mut db,
            &id,
            state.config.reward_threshold,
            state.config.now(),
        )?;
        let client = queries::get_client(&db, &appointment.client_id)?;
        let (phone, name) = client.map(|c| (c.phone, c.name)).unwrap_or_default();
        (appointment, standing, phone, name)
    };

    // The congratulation is a courtesy; failures never undo the completion.
    if standing.reached_reward && !client_phone.is_empty() {
        let message = format!(
            "Congratulations, {client_name}!\n\nYou completed {} visits and earned a free \
             service! Talk to us to redeem your gift.",
            standing.reward_threshold,
        );
        if let Err(e) = state.messaging.send_message(&client_phone, &message).await {
            tracing::error!(error = %e, "reward congratulation failed");
        }
    }

    Ok(Json(CompleteResponse {
        appointment: AppointmentResponse::from_model(appointment),
        loyalty: standing,
    }))
}

// POST /api/admin/appointments/:id/cancel
#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<AppointmentResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let reason = request.reason.as_deref().unwrap_or("Canceled by staff");
    let appointment = {
        let db = state.db.lock().unwrap();
        booking::cancel_appointment(&db, &id, reason, state.config.now())?
    };

    Ok(Json(AppointmentResponse::from_model(appointment)))
}

// POST /api/admin/clients/:id/redeem
pub async fn redeem_reward(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<LoyaltyStanding>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let standing = {
        let db = state.db.lock().unwrap();
        loyalty::redeem_reward(&db, &id, state.config.reward_threshold)?
    };

    Ok(Json(standing))
}
