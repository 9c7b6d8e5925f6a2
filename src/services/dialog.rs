use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::LedgerError;
use crate::models::{Client, Conversation, DayOption, DialogStep, Provider, Service};
use crate::services::{booking, clients, loyalty, slots};
use crate::state::AppState;

const RESET_INPUTS: &[&str] = &["0", "menu"];
const MAX_INVALID_ATTEMPTS: i64 = 3;

/// The outcome of one dialog turn: the step to persist, the reply to send
/// once persisted, the retry counter value, and an optional staff alert.
#[derive(Debug)]
pub struct Turn {
    pub next: DialogStep,
    pub reply: String,
    pub invalid_attempts: i64,
    pub notify_admin: Option<String>,
}

impl Turn {
    fn stay(step: DialogStep, reply: String) -> Self {
        Self {
            next: step,
            reply,
            invalid_attempts: 0,
            notify_admin: None,
        }
    }

    fn to_menu(reply: String) -> Self {
        Self::stay(DialogStep::Menu, reply)
    }
}

/// Handles one inbound message end to end: resolve the client, advance the
/// state machine, persist the new state, and only then hand the reply back
/// to the transport. A crash after the save loses at most the outbound
/// message, never the state.
pub async fn process_message(
    state: &Arc<AppState>,
    phone: &str,
    text: &str,
) -> anyhow::Result<String> {
    let input = text.trim().to_lowercase();
    let now = state.config.now();

    let turn = {
        let mut db = state.db.lock().unwrap();
        let client = clients::find_or_create(&db, phone, now)?;
        let conv = queries::get_conversation(&db, phone)?.unwrap_or(Conversation {
            phone: phone.to_string(),
            step: DialogStep::Menu,
            client_id: Some(client.id.clone()),
            invalid_attempts: 0,
            updated_at: now,
        });

        tracing::info!(phone = %phone, step = conv.step.name(), "processing message");

        let turn = if RESET_INPUTS.contains(&input.as_str()) {
            Turn::to_menu(menu_text(&db))
        } else {
            advance(
                &mut db,
                &state.config,
                &client,
                conv.step,
                conv.invalid_attempts,
                &input,
                now,
            )?
        };

        queries::save_conversation(
            &db,
            &Conversation {
                phone: phone.to_string(),
                step: turn.next.clone(),
                client_id: Some(client.id),
                invalid_attempts: turn.invalid_attempts,
                updated_at: now,
            },
        )?;
        turn
    };

    if let Some(alert) = &turn.notify_admin {
        notify_admin(state, alert).await;
    }

    Ok(turn.reply)
}

/// The transition function. Total over (step, input): every combination
/// yields a next step and a non-empty reply.
pub fn advance(
    conn: &mut Connection,
    config: &AppConfig,
    client: &Client,
    step: DialogStep,
    invalid_attempts: i64,
    input: &str,
    now: NaiveDateTime,
) -> anyhow::Result<Turn> {
    match step {
        DialogStep::Menu => handle_menu(conn, config, client, invalid_attempts, input, now),

        DialogStep::ListingServices => {
            if input == "1" {
                start_booking(conn)
            } else {
                Ok(Turn::to_menu(menu_text(conn)))
            }
        }

        DialogStep::ChoosingService { service_ids } => {
            let Some(idx) = parse_choice(input, service_ids.len()) else {
                return Ok(Turn::stay(
                    DialogStep::ChoosingService { service_ids },
                    not_understood(),
                ));
            };
            let service_id = service_ids[idx].clone();
            let providers = queries::list_active_providers(conn)?;

            match providers.len() {
                0 => Ok(Turn::to_menu(
                    "We have no staff available for bookings right now. Please try again later, or reply 0 for the menu.".to_string(),
                )),
                // With a single provider there is nothing to choose; fold
                // straight into the day list.
                1 => present_days(conn, config, &service_id, &providers[0].id, now),
                _ => {
                    let mut msg = String::from("Choose who you'd like to book with:\n\n");
                    for (i, p) in providers.iter().enumerate() {
                        msg.push_str(&format!("{}. {}\n", i + 1, p.name));
                    }
                    msg.push_str(&format!("{}. No preference\n", providers.len() + 1));
                    msg.push_str("\nReply with a number (or 0 for the menu).");
                    Ok(Turn::stay(
                        DialogStep::ChoosingProvider {
                            service_id,
                            provider_ids: providers.into_iter().map(|p| p.id).collect(),
                        },
                        msg,
                    ))
                }
            }
        }

        DialogStep::ChoosingProvider {
            service_id,
            provider_ids,
        } => {
            let provider_id = match parse_choice(input, provider_ids.len() + 1) {
                Some(idx) if idx == provider_ids.len() => {
                    least_loaded(conn, &provider_ids, now)?
                }
                Some(idx) => provider_ids[idx].clone(),
                None => {
                    return Ok(Turn::stay(
                        DialogStep::ChoosingProvider {
                            service_id,
                            provider_ids,
                        },
                        not_understood(),
                    ));
                }
            };

            match availability_for(conn, config, &provider_id, &service_id, now)? {
                Some((provider, _, days)) if !days.is_empty() => Ok(Turn::stay(
                    DialogStep::ChoosingDay {
                        service_id,
                        provider_id,
                        days: days.clone(),
                    },
                    day_list_text(&provider.name, &days),
                )),
                Some((provider, _, _)) => Ok(Turn::stay(
                    // Stay here so the client can pick someone else.
                    DialogStep::ChoosingProvider {
                        service_id,
                        provider_ids,
                    },
                    format!(
                        "{} has no openings at the moment. Try another choice, or reply 0 for the menu.",
                        provider.name
                    ),
                )),
                None => Ok(Turn::to_menu(generic_apology())),
            }
        }

        DialogStep::ChoosingDay {
            service_id,
            provider_id,
            days,
        } => {
            let Some(idx) = parse_choice(input, days.len()) else {
                return Ok(Turn::stay(
                    DialogStep::ChoosingDay {
                        service_id,
                        provider_id,
                        days,
                    },
                    not_understood(),
                ));
            };
            let chosen = days[idx].clone();
            Ok(Turn::stay(
                DialogStep::ChoosingTime {
                    service_id,
                    provider_id,
                    slots: chosen.slots.clone(),
                },
                time_list_text(chosen.day, &chosen.slots),
            ))
        }

        DialogStep::ChoosingTime {
            service_id,
            provider_id,
            slots,
        } => {
            let Some(idx) = parse_choice(input, slots.len()) else {
                return Ok(Turn::stay(
                    DialogStep::ChoosingTime {
                        service_id,
                        provider_id,
                        slots,
                    },
                    not_understood(),
                ));
            };
            let slot = slots[idx];

            let Some((service, provider)) = load_pair(conn, &service_id, &provider_id)? else {
                return Ok(Turn::to_menu(generic_apology()));
            };

            let msg = format!(
                "Please confirm your appointment:\n\n\
                 Service: {}\n\
                 Date: {}\n\
                 Time: {}\n\
                 With: {}\n\
                 Price: {}\n\n\
                 1 - Yes, confirm\n\
                 2 - No, back to the menu",
                service.name,
                format_day(slot.date()),
                format_time(&slot),
                provider.name,
                service.price_display(),
            );
            Ok(Turn::stay(
                DialogStep::AwaitingBookingConfirmation {
                    service_id,
                    provider_id,
                    slot,
                },
                msg,
            ))
        }

        DialogStep::AwaitingBookingConfirmation {
            service_id,
            provider_id,
            slot,
        } => match input {
            "1" => {
                match booking::create_appointment(
                    conn,
                    &client.id,
                    &provider_id,
                    &service_id,
                    slot,
                    now,
                ) {
                    Ok(appt) => {
                        let summary = booked_summary(conn, &service_id, &provider_id, appt.start_at)?;
                        Ok(Turn::to_menu(format!(
                            "Your appointment is booked!\n\n{summary}\n\nIf you need anything else, reply 0 for the menu."
                        )))
                    }
                    Err(LedgerError::SlotConflict) => Ok(Turn::to_menu(
                        "Oh no, that time was just taken by someone else. Reply 1 to start over and pick another time.".to_string(),
                    )),
                    Err(e) => Err(e.into()),
                }
            }
            "2" => Ok(Turn::to_menu(menu_text(conn))),
            _ => Ok(Turn::stay(
                DialogStep::AwaitingBookingConfirmation {
                    service_id,
                    provider_id,
                    slot,
                },
                "Please reply 1 to confirm or 2 to go back to the menu.".to_string(),
            )),
        },

        DialogStep::ChoosingAppointmentToCancel { appointment_ids } => {
            let Some(idx) = parse_choice(input, appointment_ids.len()) else {
                return Ok(Turn::stay(
                    DialogStep::ChoosingAppointmentToCancel { appointment_ids },
                    not_understood(),
                ));
            };
            let appointment_id = appointment_ids[idx].clone();
            let Some(appt) = queries::get_appointment(conn, &appointment_id)? else {
                return Ok(Turn::to_menu(generic_apology()));
            };

            let msg = format!(
                "Cancel this appointment?\n\n{}\n\n1 - Yes, cancel it\n2 - No, keep it",
                appointment_label(conn, &appt.service_id, &appt.provider_id, appt.start_at)?,
            );
            Ok(Turn::stay(
                DialogStep::AwaitingCancelConfirmation { appointment_id },
                msg,
            ))
        }

        DialogStep::AwaitingCancelConfirmation { appointment_id } => match input {
            "1" => match booking::cancel_appointment(conn, &appointment_id, "Canceled by client", now)
            {
                Ok(_) => Ok(Turn::to_menu(
                    "Your appointment has been canceled. We'll miss you! Whenever you're ready, just message us again.".to_string(),
                )),
                Err(LedgerError::InvalidTransition { .. }) | Err(LedgerError::NotFound(_)) => {
                    Ok(Turn::to_menu(generic_apology()))
                }
                Err(e) => Err(e.into()),
            },
            "2" => Ok(Turn::to_menu(
                "Ok! Your appointment is unchanged. Reply 0 for the menu.".to_string(),
            )),
            _ => Ok(Turn::stay(
                DialogStep::AwaitingCancelConfirmation { appointment_id },
                "Please reply 1 to cancel the appointment or 2 to keep it.".to_string(),
            )),
        },

        DialogStep::ChoosingAppointmentToReschedule { appointment_ids } => {
            let Some(idx) = parse_choice(input, appointment_ids.len()) else {
                return Ok(Turn::stay(
                    DialogStep::ChoosingAppointmentToReschedule { appointment_ids },
                    not_understood(),
                ));
            };
            let appointment_id = appointment_ids[idx].clone();
            let Some(appt) = queries::get_appointment(conn, &appointment_id)? else {
                return Ok(Turn::to_menu(generic_apology()));
            };

            match availability_for(conn, config, &appt.provider_id, &appt.service_id, now)? {
                Some((provider, _, days)) if !days.is_empty() => Ok(Turn::stay(
                    DialogStep::ChoosingRescheduleDay {
                        appointment_id,
                        service_id: appt.service_id,
                        provider_id: appt.provider_id,
                        days: days.clone(),
                    },
                    format!(
                        "New dates for your appointment:\n\n{}",
                        day_list_text(&provider.name, &days)
                    ),
                )),
                Some(_) => Ok(Turn::to_menu(
                    "There are no openings to move your appointment to right now. Please try again later.".to_string(),
                )),
                None => Ok(Turn::to_menu(generic_apology())),
            }
        }

        DialogStep::ChoosingRescheduleDay {
            appointment_id,
            service_id,
            provider_id,
            days,
        } => {
            let Some(idx) = parse_choice(input, days.len()) else {
                return Ok(Turn::stay(
                    DialogStep::ChoosingRescheduleDay {
                        appointment_id,
                        service_id,
                        provider_id,
                        days,
                    },
                    not_understood(),
                ));
            };
            let chosen = days[idx].clone();
            Ok(Turn::stay(
                DialogStep::ChoosingRescheduleTime {
                    appointment_id,
                    service_id,
                    provider_id,
                    slots: chosen.slots.clone(),
                },
                time_list_text(chosen.day, &chosen.slots),
            ))
        }

        DialogStep::ChoosingRescheduleTime {
            appointment_id,
            service_id,
            provider_id,
            slots,
        } => {
            let Some(idx) = parse_choice(input, slots.len()) else {
                return Ok(Turn::stay(
                    DialogStep::ChoosingRescheduleTime {
                        appointment_id,
                        service_id,
                        provider_id,
                        slots,
                    },
                    not_understood(),
                ));
            };
            let slot = slots[idx];

            // Create the replacement first; the original is only canceled
            // once the new time is secured.
            match booking::create_appointment(conn, &client.id, &provider_id, &service_id, slot, now)
            {
                Ok(appt) => {
                    if let Err(e) =
                        booking::cancel_appointment(conn, &appointment_id, "Rescheduled by client", now)
                    {
                        tracing::warn!(
                            appointment = %appointment_id,
                            error = %e,
                            "old appointment could not be canceled after reschedule"
                        );
                    }
                    let summary = booked_summary(conn, &service_id, &provider_id, appt.start_at)?;
                    Ok(Turn::to_menu(format!("Rescheduled!\n\n{summary}")))
                }
                Err(LedgerError::SlotConflict) => Ok(Turn::to_menu(
                    "That time is no longer available, so we kept your original appointment. Reply 3 to try another time.".to_string(),
                )),
                Err(e) => Err(e.into()),
            }
        }

        DialogStep::AwaitingReminderConfirmation { appointment_id } => match input {
            "1" => match booking::confirm_appointment(conn, &appointment_id, now) {
                Ok(appt) => {
                    let summary = booked_summary(conn, &appt.service_id, &appt.provider_id, appt.start_at)?;
                    Ok(Turn::to_menu(format!("Confirmed! We'll see you there.\n\n{summary}")))
                }
                Err(LedgerError::InvalidTransition { .. }) | Err(LedgerError::NotFound(_)) => {
                    Ok(Turn::to_menu(generic_apology()))
                }
                Err(e) => Err(e.into()),
            },
            "2" => match booking::cancel_appointment(conn, &appointment_id, "Declined at reminder", now)
            {
                Ok(_) => Ok(Turn::to_menu(
                    "All right, your appointment is canceled. Whenever you want to come back, just message us!".to_string(),
                )),
                Err(LedgerError::InvalidTransition { .. }) | Err(LedgerError::NotFound(_)) => {
                    Ok(Turn::to_menu(generic_apology()))
                }
                Err(e) => Err(e.into()),
            },
            _ => Ok(Turn::stay(
                DialogStep::AwaitingReminderConfirmation { appointment_id },
                "Please reply 1 to confirm your appointment or 2 to cancel it.".to_string(),
            )),
        },
    }
}

fn handle_menu(
    conn: &mut Connection,
    config: &AppConfig,
    client: &Client,
    invalid_attempts: i64,
    input: &str,
    now: NaiveDateTime,
) -> anyhow::Result<Turn> {
    match input {
        "1" => start_booking(conn),

        "2" => {
            let services = queries::list_active_services(conn)?;
            if services.is_empty() {
                return Ok(Turn::to_menu(
                    "We have no services listed right now. Reply 0 for the menu.".to_string(),
                ));
            }
            let mut msg = String::from("Services and prices:\n");
            let mut category = String::new();
            for s in &services {
                if s.category != category {
                    msg.push_str(&format!("\n-- {} --\n", s.category));
                    category = s.category.clone();
                }
                msg.push_str(&format!(
                    "- {}: {} ({} min)\n",
                    s.name,
                    s.price_display(),
                    s.duration_minutes
                ));
            }
            msg.push_str("\nWant to book? Reply 1 to book or 0 for the menu.");
            Ok(Turn::stay(DialogStep::ListingServices, msg))
        }

        "3" => {
            let upcoming = booking::upcoming_for_client(conn, &client.id, now)?;
            if upcoming.is_empty() {
                return Ok(Turn::to_menu(
                    "You have no upcoming appointments to reschedule. Reply 1 to book one, or 0 for the menu.".to_string(),
                ));
            }
            let mut msg = String::from("Your appointments:\n\n");
            for (i, a) in upcoming.iter().enumerate() {
                msg.push_str(&format!(
                    "{}. {}\n",
                    i + 1,
                    appointment_label(conn, &a.service_id, &a.provider_id, a.start_at)?
                ));
            }
            msg.push_str("\nReply with the number of the appointment to reschedule (or 0 for the menu).");
            Ok(Turn::stay(
                DialogStep::ChoosingAppointmentToReschedule {
                    appointment_ids: upcoming.into_iter().map(|a| a.id).collect(),
                },
                msg,
            ))
        }

        "4" => {
            let upcoming = booking::upcoming_for_client(conn, &client.id, now)?;
            if upcoming.is_empty() {
                return Ok(Turn::to_menu(
                    "You have no upcoming appointments to cancel. Reply 0 for the menu.".to_string(),
                ));
            }
            let mut msg = String::from("Cancel an appointment:\n\n");
            for (i, a) in upcoming.iter().enumerate() {
                msg.push_str(&format!(
                    "{}. {}\n",
                    i + 1,
                    appointment_label(conn, &a.service_id, &a.provider_id, a.start_at)?
                ));
            }
            msg.push_str("\nReply with the number of the appointment to cancel (or 0 for the menu).");
            Ok(Turn::stay(
                DialogStep::ChoosingAppointmentToCancel {
                    appointment_ids: upcoming.into_iter().map(|a| a.id).collect(),
                },
                msg,
            ))
        }

        "5" => {
            let standing = loyalty::standing(conn, &client.id, config.reward_threshold)?;
            let (cycle, threshold, remaining) = match &standing {
                Some(s) => (s.cycle_visits, s.reward_threshold, s.visits_remaining),
                None => (0, config.reward_threshold, config.reward_threshold),
            };

            let mut msg = format!(
                "Your visits, {}!\n\n\
                 Status: {}\n\
                 Total visits: {}\n\
                 Current cycle: {cycle}/{threshold}\n",
                client.name,
                classification_label(client),
                client.total_visits,
            );
            if remaining > 0 {
                msg.push_str(&format!("{remaining} more and your next service is free!\n"));
            } else {
                msg.push_str("You have a free service waiting! Talk to us to redeem it.\n");
            }
            if let Some(last) = client.last_visit_at {
                msg.push_str(&format!("Last visit: {}\n", format_day(last.date())));
            }
            msg.push_str("\nReply 0 for the menu.");
            Ok(Turn::to_menu(msg))
        }

        "6" => Ok(Turn {
            next: DialogStep::Menu,
            reply: "We're connecting you with our team! Someone will reach out shortly. If you prefer, you can also call us directly.".to_string(),
            invalid_attempts: 0,
            notify_admin: Some(format!(
                "Client {} ({}) asked to talk to a person",
                client.name, client.phone
            )),
        }),

        _ => {
            let attempts = invalid_attempts + 1;
            if attempts >= MAX_INVALID_ATTEMPTS {
                Ok(Turn {
                    next: DialogStep::Menu,
                    reply: "It looks like you're having trouble. We'll get someone from our team to help you!".to_string(),
                    invalid_attempts: 0,
                    notify_admin: Some(format!(
                        "Client {} ({}) needs help after repeated unrecognized messages",
                        client.name, client.phone
                    )),
                })
            } else {
                Ok(Turn {
                    next: DialogStep::Menu,
                    reply: format!("{}\n\n{}", not_understood(), menu_text(conn)),
                    invalid_attempts: attempts,
                    notify_admin: None,
                })
            }
        }
    }
}

fn start_booking(conn: &Connection) -> anyhow::Result<Turn> {
    let services = queries::list_active_services(conn)?;
    if services.is_empty() {
        return Ok(Turn::to_menu(
            "We have no services available right now. Reply 0 for the menu.".to_string(),
        ));
    }

    let mut msg = String::from("Our services:\n\n");
    for (i, s) in services.iter().enumerate() {
        msg.push_str(&format!(
            "{}. {}\n   {} min — {}\n",
            i + 1,
            s.name,
            s.duration_minutes,
            s.price_display()
        ));
    }
    msg.push_str("\nReply with the number of a service (or 0 for the menu).");

    Ok(Turn::stay(
        DialogStep::ChoosingService {
            service_ids: services.into_iter().map(|s| s.id).collect(),
        },
        msg,
    ))
}

fn present_days(
    conn: &Connection,
    config: &AppConfig,
    service_id: &str,
    provider_id: &str,
    now: NaiveDateTime,
) -> anyhow::Result<Turn> {
    match availability_for(conn, config, provider_id, service_id, now)? {
        Some((provider, _, days)) if !days.is_empty() => Ok(Turn::stay(
            DialogStep::ChoosingDay {
                service_id: service_id.to_string(),
                provider_id: provider_id.to_string(),
                days: days.clone(),
            },
            day_list_text(&provider.name, &days),
        )),
        Some(_) => Ok(Turn::to_menu(
            "We have no openings at the moment. Please try again later, or reply 6 to talk to our team.".to_string(),
        )),
        None => Ok(Turn::to_menu(generic_apology())),
    }
}

fn availability_for(
    conn: &Connection,
    config: &AppConfig,
    provider_id: &str,
    service_id: &str,
    now: NaiveDateTime,
) -> anyhow::Result<Option<(Provider, Service, Vec<DayOption>)>> {
    let Some((service, provider)) = load_pair(conn, service_id, provider_id)? else {
        return Ok(None);
    };

    let existing = queries::upcoming_for_provider(conn, provider_id, &now)?;
    let days = slots::plan_availability(&provider, &service, &existing, now, &config.booking);
    Ok(Some((provider, service, days)))
}

/// Picks the provider with the fewest upcoming appointments; ties go to the
/// first one in the presented list.
fn least_loaded(
    conn: &Connection,
    provider_ids: &[String],
    now: NaiveDateTime,
) -> anyhow::Result<String> {
    let mut best: Option<(i64, &String)> = None;
    for id in provider_ids {
        let count = queries::upcoming_count_for_provider(conn, id, &now)?;
        if best.map(|(c, _)| count < c).unwrap_or(true) {
            best = Some((count, id));
        }
    }
    best.map(|(_, id)| id.clone())
        .ok_or_else(|| anyhow::anyhow!("no providers to choose from"))
}

fn load_pair(
    conn: &Connection,
    service_id: &str,
    provider_id: &str,
) -> anyhow::Result<Option<(Service, Provider)>> {
    let Some(service) = queries::get_service(conn, service_id)? else {
        return Ok(None);
    };
    let Some(provider) = queries::get_provider(conn, provider_id)? else {
        return Ok(None);
    };
    Ok(Some((service, provider)))
}

pub(crate) fn appointment_label(
    conn: &Connection,
    service_id: &str,
    provider_id: &str,
    start_at: NaiveDateTime,
) -> anyhow::Result<String> {
    let service_name = queries::get_service(conn, service_id)?
        .map(|s| s.name)
        .unwrap_or_else(|| "Service".to_string());
    let provider_name = queries::get_provider(conn, provider_id)?
        .map(|p| p.name)
        .unwrap_or_else(|| "our team".to_string());

    Ok(format!(
        "{} — {} at {} with {}",
        service_name,
        format_day(start_at.date()),
        format_time(&start_at),
        provider_name,
    ))
}

fn booked_summary(
    conn: &Connection,
    service_id: &str,
    provider_id: &str,
    start_at: NaiveDateTime,
) -> anyhow::Result<String> {
    let Some((service, provider)) = load_pair(conn, service_id, provider_id)? else {
        return Ok(format!(
            "Date: {}\nTime: {}",
            format_day(start_at.date()),
            format_time(&start_at)
        ));
    };
    Ok(format!(
        "Service: {}\nDate: {}\nTime: {}\nWith: {}\nPrice: {}",
        service.name,
        format_day(start_at.date()),
        format_time(&start_at),
        provider.name,
        service.price_display(),
    ))
}

fn day_list_text(provider_name: &str, days: &[DayOption]) -> String {
    let mut msg = format!("Available days with {provider_name}:\n\n");
    for (i, d) in days.iter().enumerate() {
        msg.push_str(&format!(
            "{}. {} ({} times)\n",
            i + 1,
            format_day(d.day),
            d.slots.len()
        ));
    }
    msg.push_str("\nReply with the number of a day (or 0 for the menu).");
    msg
}

fn time_list_text(day: NaiveDate, slots: &[NaiveDateTime]) -> String {
    let mut msg = format!("Available times on {}:\n\n", format_day(day));
    for (i, s) in slots.iter().enumerate() {
        msg.push_str(&format!("{}. {}\n", i + 1, format_time(s)));
    }
    msg.push_str("\nReply with the number of a time (or 0 for the menu).");
    msg
}

pub fn menu_text(conn: &Connection) -> String {
    let business = queries::get_setting(conn, "business_name")
        .ok()
        .flatten()
        .unwrap_or_else(|| "our salon".to_string());

    format!(
        "Welcome to {business}!\n\n\
         How can we help today?\n\n\
         1. Book an appointment\n\
         2. Services and prices\n\
         3. Reschedule an appointment\n\
         4. Cancel an appointment\n\
         5. My visits and rewards\n\
         6. Talk to a person\n\n\
         Reply with the number of an option."
    )
}

fn format_day(day: NaiveDate) -> String {
    day.format("%A, %d/%m/%Y").to_string()
}

fn format_time(dt: &NaiveDateTime) -> String {
    dt.format("%H:%M").to_string()
}

fn not_understood() -> String {
    "Sorry, I didn't get that. Reply with the number of an option, or 0 for the menu.".to_string()
}

fn generic_apology() -> String {
    "Something went wrong on our side. Let's start over — reply 0 for the menu.".to_string()
}

fn classification_label(client: &Client) -> &'static str {
    use crate::models::Classification;
    match client.classification {
        Classification::Regular => "Regular",
        Classification::Frequent => "Frequent",
        Classification::Vip => "VIP",
        Classification::Inactive => "We missed you",
    }
}

/// 1-based numeric menu choice against a list of `len` entries.
fn parse_choice(input: &str, len: usize) -> Option<usize> {
    input
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=len).contains(n))
        .map(|n| n - 1)
}

async fn notify_admin(state: &Arc<AppState>, message: &str) {
    if state.config.admin_phone.is_empty() {
        tracing::warn!("admin_phone not configured, skipping notification");
        return;
    }

    if let Err(e) = state
        .messaging
        .send_message(&state.config.admin_phone, message)
        .await
    {
        tracing::error!(error = %e, "failed to notify admin");
    }
}
