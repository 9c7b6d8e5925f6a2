use chrono::NaiveTime;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Provider, Service};

/// Seeds the default catalog on an empty database so a fresh install can
/// take bookings immediately. Existing rows are left alone.
pub fn seed_defaults(conn: &Connection) -> anyhow::Result<()> {
    let provider_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM providers", [], |row| row.get(0))?;
    if provider_count == 0 {
        for provider in default_providers() {
            queries::insert_provider(conn, &provider)?;
        }
        tracing::info!("seeded default providers");
    }

    let service_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM services", [], |row| row.get(0))?;
    if service_count == 0 {
        for service in default_services() {
            queries::insert_service(conn, &service)?;
        }
        tracing::info!("seeded default services");
    }

    if queries::get_setting(conn, "business_name")?.is_none() {
        queries::set_setting(conn, "business_name", "Samara Nails")?;
    }

    Ok(())
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
}

fn default_providers() -> Vec<Provider> {
    vec![
        Provider {
            id: "prov-ana".to_string(),
            name: "Ana".to_string(),
            specialties: vec![
                "Manicure".to_string(),
                "Pedicure".to_string(),
                "Gel".to_string(),
            ],
            work_start: time(9, 0),
            work_end: time(18, 0),
            work_days: vec![1, 2, 3, 4, 5, 6], // Mon-Sat
            slot_interval_minutes: 15,
            active: true,
        },
        Provider {
            id: "prov-carol".to_string(),
            name: "Carol".to_string(),
            specialties: vec![
                "Manicure".to_string(),
                "Pedicure".to_string(),
                "Nail Art".to_string(),
            ],
            work_start: time(10, 0),
            work_end: time(19, 0),
            work_days: vec![2, 3, 4, 5, 6], // Tue-Sat
            slot_interval_minutes: 15,
            active: true,
        },
    ]
}

fn default_services() -> Vec<Service> {
    let catalog = [
        ("svc-manicure", "Basic manicure", 45, 4000, "Nails", 1),
        ("svc-manicure-polish", "Manicure with polish", 60, 5500, "Nails", 2),
        ("svc-pedicure", "Basic pedicure", 60, 5000, "Nails", 3),
        ("svc-pedicure-polish", "Pedicure with polish", 75, 6500, "Nails", 4),
        ("svc-combo", "Hands + feet combo", 120, 10000, "Combo", 5),
        ("svc-gel-apply", "Gel application", 90, 12000, "Gel", 6),
        ("svc-gel-maint", "Gel maintenance", 75, 8000, "Gel", 7),
        ("svc-nail-art", "Nail art (per nail)", 30, 1000, "Art", 8),
        ("svc-gel-removal", "Gel removal", 45, 4000, "Gel", 9),
    ];

    catalog
        .iter()
        .map(|(id, name, duration, price, category, order)| Service {
            id: (*id).to_string(),
            name: (*name).to_string(),
            duration_minutes: *duration,
            price_cents: *price,
            category: (*category).to_string(),
            display_order: *order,
            active: true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_seed_populates_empty_db() {
        let conn = db::init_db(":memory:").unwrap();
        seed_defaults(&conn).unwrap();

        let providers = queries::list_active_providers(&conn).unwrap();
        assert_eq!(providers.len(), 2);

        let services = queries::list_active_services(&conn).unwrap();
        assert!(!services.is_empty());
        assert_eq!(services[0].name, "Basic manicure");
    }

    #[test]
    fn test_seed_is_idempotent() {
        let conn = db::init_db(":memory:").unwrap();
        seed_defaults(&conn).unwrap();
        seed_defaults(&conn).unwrap();

        let providers = queries::list_active_providers(&conn).unwrap();
        assert_eq!(providers.len(), 2);
    }
}
