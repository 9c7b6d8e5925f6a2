use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub phone: String,
    pub name: String,
    pub classification: Classification,
    pub total_visits: i64,
    pub last_visit_at: Option<NaiveDateTime>,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Regular,
    Frequent,
    Vip,
    Inactive,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Regular => "regular",
            Classification::Frequent => "frequent",
            Classification::Vip => "vip",
            Classification::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "frequent" => Classification::Frequent,
            "vip" => Classification::Vip,
            "inactive" => Classification::Inactive,
            _ => Classification::Regular,
        }
    }
}

/// Per-client reward counters. One-to-one with the client, created alongside
/// it; the cycle count only moves on appointment completion and reward
/// redemption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyRecord {
    pub client_id: String,
    pub points: i64,
    pub cycle_visits: i64,
    pub total_redemptions: i64,
}

/// Snapshot returned to callers after a loyalty mutation, so they can decide
/// whether to congratulate the client.
#[derive(Debug, Clone, Serialize)]
pub struct LoyaltyStanding {
    pub points: i64,
    pub cycle_visits: i64,
    pub total_redemptions: i64,
    pub reward_threshold: i64,
    pub visits_remaining: i64,
    pub reached_reward: bool,
}

impl LoyaltyStanding {
    pub fn from_record(record: &LoyaltyRecord, threshold: i64) -> Self {
        Self {
            points: record.points,
            cycle_visits: record.cycle_visits,
            total_redemptions: record.total_redemptions,
            reward_threshold: threshold,
            visits_remaining: (threshold - record.cycle_visits).max(0),
            reached_reward: record.cycle_visits >= threshold,
        }
    }
}
