use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub client_id: String,
    pub provider_id: String,
    pub service_id: String,
    pub start_at: NaiveDateTime,
    /// Computed once at creation from the service duration, never recomputed.
    pub end_at: NaiveDateTime,
    pub status: AppointmentStatus,
    pub cancel_reason: Option<String>,
    pub reminder_sent: bool,
    pub confirmed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Canceled,
    NotConfirmed,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Canceled => "canceled",
            AppointmentStatus::NotConfirmed => "not_confirmed",
            AppointmentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => AppointmentStatus::Confirmed,
            "canceled" => AppointmentStatus::Canceled,
            "not_confirmed" => AppointmentStatus::NotConfirmed,
            "completed" => AppointmentStatus::Completed,
            _ => AppointmentStatus::Pending,
        }
    }

    /// Terminal statuses can never be re-opened.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Canceled
                | AppointmentStatus::NotConfirmed
                | AppointmentStatus::Completed
        )
    }
}
