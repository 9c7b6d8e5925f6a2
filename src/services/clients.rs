use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Classification, Client};

/// Looks up the client for a channel address, creating one (plus its loyalty
/// record) on first contact.
pub fn find_or_create(
    conn: &Connection,
    phone: &str,
    now: NaiveDateTime,
) -> anyhow::Result<Client> {
    if let Some(client) = queries::get_client_by_phone(conn, phone)? {
        return Ok(client);
    }

    let client = Client {
        id: uuid::Uuid::new_v4().to_string(),
        phone: phone.to_string(),
        name: "Client".to_string(),
        classification: Classification::Regular,
        total_visits: 0,
        last_visit_at: None,
        active: true,
        created_at: now,
    };
    queries::insert_client(conn, &client)?;
    tracing::info!(phone = %phone, "new client created");
    Ok(client)
}

/// Periodic reclassification: clients idle past the inactivity threshold
/// become INACTIVE, clients with 20+ completed visits become VIP.
pub fn reclassify(
    conn: &Connection,
    now: NaiveDateTime,
    inactivity_days: i64,
) -> anyhow::Result<(usize, usize)> {
    let cutoff = now - Duration::days(inactivity_days);
    let inactive = queries::mark_inactive_clients(conn, &cutoff)?;
    let vip = queries::promote_vip_clients(conn, 20)?;
    Ok((inactive, vip))
}

pub fn reactivation_targets(
    conn: &Connection,
    now: NaiveDateTime,
    inactivity_days: i64,
    limit: i64,
) -> anyhow::Result<Vec<Client>> {
    let cutoff = now - Duration::days(inactivity_days);
    Ok(queries::list_reactivation_targets(conn, &cutoff, limit)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_find_or_create_is_stable() {
        let conn = db::init_db(":memory:").unwrap();
        let first = find_or_create(&conn, "+5511999990000", dt("2025-06-16 10:00")).unwrap();
        let second = find_or_create(&conn, "+5511999990000", dt("2025-06-16 10:05")).unwrap();
        assert_eq!(first.id, second.id);

        let loyalty = queries::get_loyalty(&conn, &first.id).unwrap();
        assert!(loyalty.is_some());
    }

    #[test]
    fn test_reclassify_marks_idle_clients_inactive() {
        let conn = db::init_db(":memory:").unwrap();
        let client = find_or_create(&conn, "+5511999990000", dt("2025-01-01 10:00")).unwrap();
        conn.execute(
            "UPDATE clients SET last_visit_at = '2025-01-02 10:00:00' WHERE id = ?1",
            [&client.id],
        )
        .unwrap();

        reclassify(&conn, dt("2025-06-16 10:00"), 60).unwrap();

        let client = queries::get_client(&conn, &client.id).unwrap().unwrap();
        assert_eq!(client.classification, Classification::Inactive);
    }

    #[test]
    fn test_reclassify_promotes_vip() {
        let conn = db::init_db(":memory:").unwrap();
        let client = find_or_create(&conn, "+5511999990000", dt("2025-06-01 10:00")).unwrap();
        conn.execute(
            "UPDATE clients SET total_visits = 20, last_visit_at = '2025-06-10 10:00:00' WHERE id = ?1",
            [&client.id],
        )
        .unwrap();

        reclassify(&conn, dt("2025-06-16 10:00"), 60).unwrap();

        let client = queries::get_client(&conn, &client.id).unwrap().unwrap();
        assert_eq!(client.classification, Classification::Vip);
    }

    #[test]
    fn test_reactivation_targets_skips_already_inactive() {
        let conn = db::init_db(":memory:").unwrap();
        let idle = find_or_create(&conn, "+5511999990001", dt("2025-01-01 10:00")).unwrap();
        conn.execute(
            "UPDATE clients SET last_visit_at = '2025-01-02 10:00:00' WHERE id = ?1",
            [&idle.id],
        )
        .unwrap();
        let marked = find_or_create(&conn, "+5511999990002", dt("2025-01-01 10:00")).unwrap();
        conn.execute(
            "UPDATE clients SET last_visit_at = '2025-01-02 10:00:00', classification = 'inactive' WHERE id = ?1",
            [&marked.id],
        )
        .unwrap();

        let targets = reactivation_targets(&conn, dt("2025-06-16 10:00"), 60, 50).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id, idle.id);
    }
}
