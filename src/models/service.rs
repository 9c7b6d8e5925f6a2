use serde::{Deserialize, Serialize};

/// A bookable offering with a fixed duration and price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub category: String,
    pub display_order: i64,
    pub active: bool,
}

impl Service {
    pub fn price_display(&self) -> String {
        format!("${}.{:02}", self.price_cents / 100, self.price_cents % 100)
    }
}
