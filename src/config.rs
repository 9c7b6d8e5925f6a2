use std::env;

use chrono_tz::Tz;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub business_timezone: Tz,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub admin_phone: String,
    pub booking: BookingPolicy,
    pub reward_threshold: i64,
    pub inactivity_days: i64,
}

/// Tunables for slot generation and the availability scan.
#[derive(Clone, Copy, Debug)]
pub struct BookingPolicy {
    /// Slots closer than this to "now" are never offered.
    pub lead_time_minutes: i64,
    /// Stop after this many days with at least one free slot.
    pub horizon_days: usize,
    /// Hard ceiling on calendar days scanned, so a sparse schedule terminates.
    pub scan_ceiling_days: usize,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            lead_time_minutes: 120,
            horizon_days: 7,
            scan_ceiling_days: 60,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let timezone = env::var("BUSINESS_TIMEZONE")
            .ok()
            .and_then(|v| v.parse::<Tz>().ok())
            .unwrap_or(chrono_tz::America::Sao_Paulo);

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "salonbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            business_timezone: timezone,
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            admin_phone: env::var("ADMIN_PHONE").unwrap_or_default(),
            booking: BookingPolicy {
                lead_time_minutes: env_i64("BOOKING_LEAD_TIME_MINUTES", 120),
                horizon_days: env_i64("BOOKING_HORIZON_DAYS", 7) as usize,
                scan_ceiling_days: env_i64("BOOKING_SCAN_CEILING_DAYS", 60) as usize,
            },
            reward_threshold: env_i64("REWARD_THRESHOLD", 10),
            inactivity_days: env_i64("INACTIVITY_DAYS", 60),
        }
    }

    /// Current wall-clock time in the business timezone. Every user-facing
    /// "now" and day boundary goes through here, never bare UTC.
    pub fn now(&self) -> chrono::NaiveDateTime {
        chrono::Utc::now()
            .with_timezone(&self.business_timezone)
            .naive_local()
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
