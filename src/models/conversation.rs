use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One day of availability as it was presented to the client. The slot list
/// is persisted verbatim so a numeric reply is resolved against exactly what
/// the client saw, even if live availability changed in the meantime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayOption {
    pub day: NaiveDate,
    pub slots: Vec<NaiveDateTime>,
}

/// Where a client currently is in the dialog. Each variant carries exactly
/// the fields its transitions need; entity ids and slots are stored in the
/// order they were numbered in the outbound message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum DialogStep {
    Menu,
    ListingServices,
    ChoosingService {
        service_ids: Vec<String>,
    },
    ChoosingProvider {
        service_id: String,
        provider_ids: Vec<String>,
    },
    ChoosingDay {
        service_id: String,
        provider_id: String,
        days: Vec<DayOption>,
    },
    ChoosingTime {
        service_id: String,
        provider_id: String,
        slots: Vec<NaiveDateTime>,
    },
    AwaitingBookingConfirmation {
        service_id: String,
        provider_id: String,
        slot: NaiveDateTime,
    },
    ChoosingAppointmentToCancel {
        appointment_ids: Vec<String>,
    },
    AwaitingCancelConfirmation {
        appointment_id: String,
    },
    ChoosingAppointmentToReschedule {
        appointment_ids: Vec<String>,
    },
    ChoosingRescheduleDay {
        appointment_id: String,
        service_id: String,
        provider_id: String,
        days: Vec<DayOption>,
    },
    ChoosingRescheduleTime {
        appointment_id: String,
        service_id: String,
        provider_id: String,
        slots: Vec<NaiveDateTime>,
    },
    AwaitingReminderConfirmation {
        appointment_id: String,
    },
}

impl DialogStep {
    pub fn name(&self) -> &'static str {
        match self {
            DialogStep::Menu => "menu",
            DialogStep::ListingServices => "listing_services",
            DialogStep::ChoosingService { .. } => "choosing_service",
            DialogStep::ChoosingProvider { .. } => "choosing_provider",
            DialogStep::ChoosingDay { .. } => "choosing_day",
            DialogStep::ChoosingTime { .. } => "choosing_time",
            DialogStep::AwaitingBookingConfirmation { .. } => "awaiting_booking_confirmation",
            DialogStep::ChoosingAppointmentToCancel { .. } => "choosing_appointment_to_cancel",
            DialogStep::AwaitingCancelConfirmation { .. } => "awaiting_cancel_confirmation",
            DialogStep::ChoosingAppointmentToReschedule { .. } => {
                "choosing_appointment_to_reschedule"
            }
            DialogStep::ChoosingRescheduleDay { .. } => "choosing_reschedule_day",
            DialogStep::ChoosingRescheduleTime { .. } => "choosing_reschedule_time",
            DialogStep::AwaitingReminderConfirmation { .. } => "awaiting_reminder_confirmation",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub phone: String,
    pub step: DialogStep,
    pub client_id: Option<String>,
    pub invalid_attempts: i64,
    pub updated_at: NaiveDateTime,
}
