use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Form;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;

use crate::db::queries;
use crate::services::dialog;
use crate::state::AppState;

const PER_CLIENT_HOURLY_LIMIT: i64 = 15;

#[derive(Deserialize)]
#[allow(dead_code)]
pub struct TwilioWebhookForm {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

fn validate_twilio_signature(
    auth_token: &str,
    signature: &str,
    url: &str,
    params: &[(&str, &str)],
) -> bool {
    // Data to sign: URL + params concatenated in key order
    let mut data = url.to_string();
    let mut sorted_params = params.to_vec();
    sorted_params.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in &sorted_params {
        data.push_str(key);
        data.push_str(value);
    }

    let mut mac = match Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(data.as_bytes());
    let result = mac.finalize().into_bytes();
    let expected = base64::engine::general_purpose::STANDARD.encode(result);

    expected == signature
}

pub async fn sms_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<TwilioWebhookForm>,
) -> Response {
    let from = form.from.trim().to_string();
    let body = form.body.trim().to_string();

    tracing::info!(from = %from, body = %body, "incoming SMS");

    // Validate the Twilio signature (skip if the auth token is empty, as in
    // dev mode and tests)
    if !state.config.twilio_auth_token.is_empty() {
        let signature = headers
            .get("x-twilio-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty() {
            tracing::warn!("missing X-Twilio-Signature header");
            return (axum::http::StatusCode::FORBIDDEN, "Missing signature").into_response();
        }

        // Reconstruct the webhook URL; honor proxy headers
        let proto = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("https");
        let host = headers
            .get("x-forwarded-host")
            .or_else(|| headers.get("host"))
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        let url = format!("{proto}://{host}/webhook/sms");

        let params = [
            ("From", from.as_str()),
            ("To", form.to.as_str()),
            ("Body", body.as_str()),
            ("MessageSid", form.message_sid.as_deref().unwrap_or("")),
        ];

        if !validate_twilio_signature(&state.config.twilio_auth_token, signature, &url, &params) {
            tracing::warn!("invalid Twilio signature");
            return (axum::http::StatusCode::FORBIDDEN, "Invalid signature").into_response();
        }
    }

    // Per-address hourly rate limit; past the cap the message is dropped
    // silently.
    let message_count = {
        let db = state.db.lock().unwrap();
        queries::increment_message_count(&db, &from).unwrap_or(1)
    };
    if message_count > PER_CLIENT_HOURLY_LIMIT {
        tracing::warn!(from = %from, count = message_count, "rate limit exceeded, ignoring message");
        return twiml_response();
    }

    // Drive the dialog engine; its state is committed before the reply is
    // sent, so a delivery failure never loses a transition.
    match dialog::process_message(&state, &from, &body).await {
        Ok(reply) => {
            if let Err(e) = state.messaging.send_message(&from, &reply).await {
                tracing::error!(error = %e, "failed to send reply");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, from = %from, "dialog processing failed");
            // Never leave a client stuck in a broken step.
            {
                let db = state.db.lock().unwrap();
                let client_id = queries::get_client_by_phone(&db, &from)
                    .ok()
                    .flatten()
                    .map(|c| c.id);
                if let Err(e) = queries::reset_conversation(
                    &db,
                    &from,
                    client_id.as_deref(),
                    &state.config.now(),
                ) {
                    tracing::error!(error = %e, "conversation reset failed");
                }
            }
            let fallback =
                "Sorry, something went wrong on our side. Please send any message to see the menu.";
            let _ = state.messaging.send_message(&from, fallback).await;
        }
    }

    // Opportunistic cleanup of expired rate-limit windows
    {
        let db = state.db.lock().unwrap();
        let _ = queries::cleanup_old_windows(&db);
    }

    twiml_response()
}

fn twiml_response() -> Response {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        "<Response></Response>",
    )
        .into_response()
}
