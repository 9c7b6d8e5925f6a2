use anyhow::Context;
use rusqlite::Connection;

// Migrations are embedded so every connection, including the `:memory:`
// databases used in tests, gets the full schema.
const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_initial",
    "
    CREATE TABLE IF NOT EXISTS providers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        specialties TEXT NOT NULL DEFAULT '[]',
        work_start TEXT NOT NULL,
        work_end TEXT NOT NULL,
        work_days TEXT NOT NULL,
        slot_interval_minutes INTEGER NOT NULL DEFAULT 15,
        active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS services (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        duration_minutes INTEGER NOT NULL,
        price_cents INTEGER NOT NULL,
        category TEXT NOT NULL DEFAULT '',
        display_order INTEGER NOT NULL DEFAULT 0,
        active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS clients (
        id TEXT PRIMARY KEY,
        phone TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL DEFAULT 'Client',
        classification TEXT NOT NULL DEFAULT 'regular',
        total_visits INTEGER NOT NULL DEFAULT 0,
        last_visit_at TEXT,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS loyalty (
        client_id TEXT PRIMARY KEY REFERENCES clients(id),
        points INTEGER NOT NULL DEFAULT 0,
        cycle_visits INTEGER NOT NULL DEFAULT 0,
        total_redemptions INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS appointments (
        id TEXT PRIMARY KEY,
        client_id TEXT NOT NULL REFERENCES clients(id),
        provider_id TEXT NOT NULL REFERENCES providers(id),
        service_id TEXT NOT NULL REFERENCES services(id),
        start_at TEXT NOT NULL,
        end_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        cancel_reason TEXT,
        reminder_sent INTEGER NOT NULL DEFAULT 0,
        confirmed_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_appointments_provider
        ON appointments(provider_id, status, start_at);
    CREATE INDEX IF NOT EXISTS idx_appointments_client
        ON appointments(client_id, status, start_at);

    CREATE TABLE IF NOT EXISTS conversations (
        phone TEXT PRIMARY KEY,
        step TEXT NOT NULL,
        client_id TEXT,
        invalid_attempts INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS rate_limits (
        phone TEXT NOT NULL,
        window_start TEXT NOT NULL,
        message_count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (phone, window_start)
    );
    ",
)];

pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("failed to create migrations table")?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .context("failed to check migration status")?;

        if already_applied {
            continue;
        }

        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration: {name}"))?;

        conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])
            .with_context(|| format!("failed to record migration: {name}"))?;

        tracing::info!("applied migration: {name}");
    }

    Ok(())
}
