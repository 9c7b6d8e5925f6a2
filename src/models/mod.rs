pub mod appointment;
pub mod client;
pub mod conversation;
pub mod provider;
pub mod service;

pub use appointment::{Appointment, AppointmentStatus};
pub use client::{Classification, Client, LoyaltyRecord, LoyaltyStanding};
pub use conversation::{Conversation, DayOption, DialogStep};
pub use provider::Provider;
pub use service::Service;
