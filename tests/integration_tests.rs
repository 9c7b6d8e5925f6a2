use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use chrono::{Duration, NaiveTime};
use tower::ServiceExt;

use salonbook::config::{AppConfig, BookingPolicy};
use salonbook::db;
use salonbook::db::queries;
use salonbook::handlers;
use salonbook::jobs;
use salonbook::models::{
    Appointment, AppointmentStatus, Classification, Client, DialogStep, Provider, Service,
};
use salonbook::services::messaging::MessagingProvider;
use salonbook::state::AppState;

// ── Mock Messaging ──

struct MockMessaging {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl MessagingProvider for MockMessaging {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

// ── Helpers ──

const CLIENT_PHONE: &str = "+5511999990000";
const OTHER_PHONE: &str = "+5511888880000";
const ADMIN_PHONE: &str = "+5511777770000";

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
        business_timezone: chrono_tz::America::Sao_Paulo,
        twilio_account_sid: String::new(),
        twilio_auth_token: String::new(), // empty = skip signature validation
        twilio_phone_number: "+15551234567".to_string(),
        admin_phone: ADMIN_PHONE.to_string(),
        booking: BookingPolicy::default(),
        reward_threshold: 10,
        inactivity_days: 60,
    }
}

/// One provider working every day of the week so the booking flow always has
/// availability regardless of when the tests run.
fn seed_catalog(conn: &rusqlite::Connection) {
    queries::insert_provider(
        conn,
        &Provider {
            id: "prov-1".to_string(),
            name: "Ana".to_string(),
            specialties: vec!["Manicure".to_string()],
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            work_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            work_days: vec![0, 1, 2, 3, 4, 5, 6],
            slot_interval_minutes: 15,
            active: true,
        },
    )
    .unwrap();
    queries::insert_service(
        conn,
        &Service {
            id: "svc-1".to_string(),
            name: "Basic manicure".to_string(),
            duration_minutes: 45,
            price_cents: 4000,
            category: "Nails".to_string(),
            display_order: 1,
            active: true,
        },
    )
    .unwrap();
    queries::set_setting(conn, "business_name", "Samara Nails").unwrap();
}

fn test_state_with_sent() -> (Arc<AppState>, Arc<Mutex<Vec<(String, String)>>>) {
    let conn = db::init_db(":memory:").unwrap();
    seed_catalog(&conn);

    let sent = Arc::new(Mutex::new(vec![]));
    let messaging = MockMessaging {
        sent: Arc::clone(&sent),
    };
    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        messaging: Box::new(messaging),
    });
    (state, sent)
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook/sms", post(handlers::webhook::sms_webhook))
        .route("/api/admin/dashboard", get(handlers::admin::get_dashboard))
        .route(
            "/api/admin/appointments",
            get(handlers::admin::get_appointments),
        )
        .route(
            "/api/admin/appointments/:id/complete",
            post(handlers::admin::complete_appointment),
        )
        .route(
            "/api/admin/appointments/:id/cancel",
            post(handlers::admin::cancel_appointment),
        )
        .route(
            "/api/admin/clients/:id/redeem",
            post(handlers::admin::redeem_reward),
        )
        .with_state(state)
}

fn sms_request(from: &str, body: &str) -> Request<Body> {
    let encode = |s: &str| s.replace('%', "%25").replace('+', "%2B").replace(' ', "+");
    Request::builder()
        .method("POST")
        .uri("/webhook/sms")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "From={}&To=%2B15551234567&Body={}&MessageSid=SM_test",
            encode(from),
            encode(body),
        )))
        .unwrap()
}

async fn send_sms(app: &Router, from: &str, body: &str) {
    let res = app.clone().oneshot(sms_request(from, body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

/// The most recent reply the bot sent to `phone`.
fn last_reply(sent: &Arc<Mutex<Vec<(String, String)>>>, phone: &str) -> String {
    sent.lock()
        .unwrap()
        .iter()
        .rev()
        .find(|(to, _)| to == phone)
        .map(|(_, body)| body.clone())
        .unwrap_or_default()
}

fn replies_to(sent: &Arc<Mutex<Vec<(String, String)>>>, phone: &str) -> usize {
    sent.lock()
        .unwrap()
        .iter()
        .filter(|(to, _)| to == phone)
        .count()
}

fn seed_client(state: &Arc<AppState>, id: &str, phone: &str) {
    let db = state.db.lock().unwrap();
    queries::insert_client(
        &db,
        &Client {
            id: id.to_string(),
            phone: phone.to_string(),
            name: "Maria".to_string(),
            classification: Classification::Regular,
            total_visits: 0,
            last_visit_at: None,
            active: true,
            created_at: state.config.now(),
        },
    )
    .unwrap();
}

fn seed_appointment(state: &Arc<AppState>, id: &str, client_id: &str, appt: AppointmentSpec) {
    let now = state.config.now();
    let db = state.db.lock().unwrap();
    queries::insert_appointment(
        &db,
        &Appointment {
            id: id.to_string(),
            client_id: client_id.to_string(),
            provider_id: "prov-1".to_string(),
            service_id: "svc-1".to_string(),
            start_at: now + Duration::minutes(appt.starts_in_minutes),
            end_at: now + Duration::minutes(appt.starts_in_minutes + 45),
            status: AppointmentStatus::Pending,
            cancel_reason: None,
            reminder_sent: appt.reminder_sent,
            confirmed_at: None,
            created_at: now,
            updated_at: now - Duration::minutes(appt.updated_minutes_ago),
        },
    )
    .unwrap();
}

struct AppointmentSpec {
    starts_in_minutes: i64,
    reminder_sent: bool,
    updated_minutes_ago: i64,
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state_with_sent();
    let app = test_app(state);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

// ── Dialog over the webhook ──

#[tokio::test]
async fn test_first_message_shows_menu() {
    let (state, sent) = test_state_with_sent();
    let app = test_app(state);

    send_sms(&app, CLIENT_PHONE, "hi").await;

    let reply = last_reply(&sent, CLIENT_PHONE);
    assert!(reply.contains("Samara Nails"));
    assert!(reply.contains("1. Book an appointment"));
}

#[tokio::test]
async fn test_full_booking_dialog() {
    let (state, sent) = test_state_with_sent();
    let app = test_app(Arc::clone(&state));

    send_sms(&app, CLIENT_PHONE, "hi").await; // menu
    send_sms(&app, CLIENT_PHONE, "1").await; // book -> service list
    assert!(last_reply(&sent, CLIENT_PHONE).contains("Basic manicure"));

    send_sms(&app, CLIENT_PHONE, "1").await; // service -> day list
    assert!(last_reply(&sent, CLIENT_PHONE).contains("Available days with Ana"));

    send_sms(&app, CLIENT_PHONE, "1").await; // day -> time list
    assert!(last_reply(&sent, CLIENT_PHONE).contains("Available times"));

    send_sms(&app, CLIENT_PHONE, "1").await; // time -> confirmation summary
    assert!(last_reply(&sent, CLIENT_PHONE).contains("confirm"));

    send_sms(&app, CLIENT_PHONE, "1").await; // confirm -> booked
    assert!(last_reply(&sent, CLIENT_PHONE).contains("booked"));

    let db = state.db.lock().unwrap();
    let client = queries::get_client_by_phone(&db, CLIENT_PHONE)
        .unwrap()
        .unwrap();
    let upcoming = queries::upcoming_for_client(&db, &client.id, &state.config.now()).unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].status, AppointmentStatus::Pending);

    // After the terminal action the conversation is back at the menu.
    let conv = queries::get_conversation(&db, CLIENT_PHONE).unwrap().unwrap();
    assert_eq!(conv.step, DialogStep::Menu);
}

#[tokio::test]
async fn test_two_clients_racing_for_the_same_slot() {
    let (state, sent) = test_state_with_sent();
    let app = test_app(Arc::clone(&state));

    // Both walk to the confirmation step while the slot is still free.
    for phone in [CLIENT_PHONE, OTHER_PHONE] {
        send_sms(&app, phone, "hi").await;
        send_sms(&app, phone, "1").await;
        send_sms(&app, phone, "1").await;
        send_sms(&app, phone, "1").await;
        send_sms(&app, phone, "1").await;
    }

    send_sms(&app, CLIENT_PHONE, "1").await;
    assert!(last_reply(&sent, CLIENT_PHONE).contains("booked"));

    // The second confirmation hits the conflict path, not a double booking.
    send_sms(&app, OTHER_PHONE, "1").await;
    assert!(last_reply(&sent, OTHER_PHONE).contains("just taken"));

    let db = state.db.lock().unwrap();
    let count: i64 = db
        .query_row(
            "SELECT COUNT(*) FROM appointments WHERE status IN ('pending', 'confirmed')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_cancel_dialog() {
    let (state, sent) = test_state_with_sent();
    let app = test_app(Arc::clone(&state));

    seed_client(&state, "c-1", CLIENT_PHONE);
    seed_appointment(
        &state,
        "a-1",
        "c-1",
        AppointmentSpec {
            starts_in_minutes: 24 * 60,
            reminder_sent: false,
            updated_minutes_ago: 0,
        },
    );

    send_sms(&app, CLIENT_PHONE, "4").await;
    assert!(last_reply(&sent, CLIENT_PHONE).contains("Cancel an appointment"));

    send_sms(&app, CLIENT_PHONE, "1").await;
    assert!(last_reply(&sent, CLIENT_PHONE).contains("Cancel this appointment?"));

    send_sms(&app, CLIENT_PHONE, "1").await;
    assert!(last_reply(&sent, CLIENT_PHONE).contains("canceled"));

    let db = state.db.lock().unwrap();
    let appt = queries::get_appointment(&db, "a-1").unwrap().unwrap();
    assert_eq!(appt.status, AppointmentStatus::Canceled);
    assert_eq!(appt.cancel_reason.as_deref(), Some("Canceled by client"));
}

#[tokio::test]
async fn test_three_invalid_menu_inputs_escalate() {
    let (state, sent) = test_state_with_sent();
    let app = test_app(state);

    send_sms(&app, CLIENT_PHONE, "what").await;
    send_sms(&app, CLIENT_PHONE, "huh").await;
    send_sms(&app, CLIENT_PHONE, "???").await;

    assert!(last_reply(&sent, CLIENT_PHONE).contains("trouble"));
    // The escalation also pings the staff phone.
    assert_eq!(replies_to(&sent, ADMIN_PHONE), 1);

    // Counter was reset: the next bad input is an ordinary re-prompt.
    send_sms(&app, CLIENT_PHONE, "still lost").await;
    assert!(!last_reply(&sent, CLIENT_PHONE).contains("trouble"));
}

#[tokio::test]
async fn test_rate_limit_drops_messages_silently() {
    let (state, sent) = test_state_with_sent();
    let app = test_app(state);

    for _ in 0..20 {
        send_sms(&app, CLIENT_PHONE, "hi").await;
    }

    // Replies stop at the hourly cap.
    assert_eq!(replies_to(&sent, CLIENT_PHONE), 15);
}

// ── Background jobs ──

#[tokio::test]
async fn test_reminder_dispatch_is_idempotent() {
    let (state, sent) = test_state_with_sent();

    seed_client(&state, "c-1", CLIENT_PHONE);
    seed_appointment(
        &state,
        "a-1",
        "c-1",
        AppointmentSpec {
            starts_in_minutes: 24 * 60,
            reminder_sent: false,
            updated_minutes_ago: 0,
        },
    );

    let first = jobs::dispatch_reminders(&state).await.unwrap();
    let second = jobs::dispatch_reminders(&state).await.unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 0);
    assert_eq!(replies_to(&sent, CLIENT_PHONE), 1);
    assert!(last_reply(&sent, CLIENT_PHONE).contains("reminder"));

    let db = state.db.lock().unwrap();
    let conv = queries::get_conversation(&db, CLIENT_PHONE).unwrap().unwrap();
    assert_eq!(
        conv.step,
        DialogStep::AwaitingReminderConfirmation {
            appointment_id: "a-1".to_string()
        }
    );
}

#[tokio::test]
async fn test_reminder_reply_confirms_appointment() {
    let (state, sent) = test_state_with_sent();
    let app = test_app(Arc::clone(&state));

    seed_client(&state, "c-1", CLIENT_PHONE);
    seed_appointment(
        &state,
        "a-1",
        "c-1",
        AppointmentSpec {
            starts_in_minutes: 24 * 60,
            reminder_sent: false,
            updated_minutes_ago: 0,
        },
    );
    jobs::dispatch_reminders(&state).await.unwrap();

    send_sms(&app, CLIENT_PHONE, "1").await;
    assert!(last_reply(&sent, CLIENT_PHONE).contains("Confirmed"));

    let db = state.db.lock().unwrap();
    let appt = queries::get_appointment(&db, "a-1").unwrap().unwrap();
    assert_eq!(appt.status, AppointmentStatus::Confirmed);
    assert!(appt.confirmed_at.is_some());
}

#[tokio::test]
async fn test_unconfirmed_appointments_are_released() {
    let (state, sent) = test_state_with_sent();

    seed_client(&state, "c-1", CLIENT_PHONE);
    seed_appointment(
        &state,
        "a-1",
        "c-1",
        AppointmentSpec {
            starts_in_minutes: 2 * 60,
            reminder_sent: true,
            updated_minutes_ago: 7 * 60,
        },
    );

    let released = jobs::cancel_unconfirmed(&state).await.unwrap();
    assert_eq!(released, 1);
    assert!(last_reply(&sent, CLIENT_PHONE).contains("canceled automatically"));

    let db = state.db.lock().unwrap();
    let appt = queries::get_appointment(&db, "a-1").unwrap().unwrap();
    assert_eq!(appt.status, AppointmentStatus::NotConfirmed);

    // The slot is free again.
    let overlap =
        queries::has_overlap(&db, "prov-1", &appt.start_at, &appt.end_at).unwrap();
    assert!(!overlap);
}

// ── Admin API ──

#[tokio::test]
async fn test_admin_requires_auth() {
    let (state, _) = test_state_with_sent();
    let app = test_app(state);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/dashboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_dashboard() {
    let (state, _) = test_state_with_sent();
    let app = test_app(state);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/dashboard")
                .header("Authorization", "Bearer test-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_complete_sends_reward_congratulation() {
    let (state, sent) = test_state_with_sent();
    let app = test_app(Arc::clone(&state));

    seed_client(&state, "c-1", CLIENT_PHONE);
    seed_appointment(
        &state,
        "a-1",
        "c-1",
        AppointmentSpec {
            starts_in_minutes: 60,
            reminder_sent: false,
            updated_minutes_ago: 0,
        },
    );
    {
        // Nine earlier visits; completing this one fills the cycle.
        let db = state.db.lock().unwrap();
        let now = state.config.now();
        for _ in 0..9 {
            queries::record_visit(&db, "c-1", &now).unwrap();
        }
    }

    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/appointments/a-1/complete")
                .header("Authorization", "Bearer test-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert!(last_reply(&sent, CLIENT_PHONE).contains("Congratulations"));

    let db = state.db.lock().unwrap();
    let appt = queries::get_appointment(&db, "a-1").unwrap().unwrap();
    assert_eq!(appt.status, AppointmentStatus::Completed);
    let loyalty = queries::get_loyalty(&db, "c-1").unwrap().unwrap();
    assert_eq!(loyalty.cycle_visits, 10);
}

#[tokio::test]
async fn test_admin_redeem_resets_cycle() {
    let (state, _) = test_state_with_sent();
    let app = test_app(Arc::clone(&state));

    seed_client(&state, "c-1", CLIENT_PHONE);
    {
        let db = state.db.lock().unwrap();
        let now = state.config.now();
        for _ in 0..10 {
            queries::record_visit(&db, "c-1", &now).unwrap();
        }
    }

    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/clients/c-1/redeem")
                .header("Authorization", "Bearer test-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let db = state.db.lock().unwrap();
    let loyalty = queries::get_loyalty(&db, "c-1").unwrap().unwrap();
    assert_eq!(loyalty.cycle_visits, 0);
    assert_eq!(loyalty.total_redemptions, 1);
}
