use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::LedgerError;
use crate::models::LoyaltyStanding;

/// Records one completed visit. Only the booking ledger's completion path
/// calls this; the returned standing tells the caller whether the client
/// just filled a reward cycle.
pub fn record_visit(
    conn: &Connection,
    client_id: &str,
    threshold: i64,
    now: NaiveDateTime,
) -> rusqlite::Result<LoyaltyStanding> {
    let record = queries::record_visit(conn, client_id, &now)?;
    Ok(LoyaltyStanding::from_record(&record, threshold))
}

/// Starts a new cycle after the free service was handed out.
pub fn redeem_reward(
    conn: &Connection,
    client_id: &str,
    threshold: i64,
) -> Result<LoyaltyStanding, LedgerError> {
    let record = queries::get_loyalty(conn, client_id)?
        .ok_or_else(|| LedgerError::NotFound(format!("loyalty record for {client_id}")))?;

    if record.cycle_visits < threshold {
        return Err(LedgerError::Validation(format!(
            "client {client_id} has {} of {threshold} visits in the current cycle",
            record.cycle_visits
        )));
    }

    queries::redeem_reward(conn, client_id)?;
    let record = queries::get_loyalty(conn, client_id)?
        .ok_or_else(|| LedgerError::NotFound(format!("loyalty record for {client_id}")))?;
    Ok(LoyaltyStanding::from_record(&record, threshold))
}

pub fn standing(
    conn: &Connection,
    client_id: &str,
    threshold: i64,
) -> rusqlite::Result<Option<LoyaltyStanding>> {
    Ok(queries::get_loyalty(conn, client_id)?
        .map(|record| LoyaltyStanding::from_record(&record, threshold)))
}
