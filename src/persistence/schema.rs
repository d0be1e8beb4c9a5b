//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS`, so the
//! bootstrap is safe to re-run on every startup.

use sqlx::SqlitePool;

use crate::models::state::SEED;
use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS user_account (
    id              TEXT PRIMARY KEY NOT NULL,
    document        TEXT NOT NULL UNIQUE,
    email           TEXT NOT NULL,
    display_name    TEXT NOT NULL,
    role            TEXT NOT NULL CHECK(role IN ('client','technician','admin')),
    is_active       INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS state (
    id              INTEGER PRIMARY KEY NOT NULL,
    code            TEXT NOT NULL UNIQUE,
    name            TEXT NOT NULL UNIQUE,
    is_active       INTEGER NOT NULL DEFAULT 1,
    is_final        INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS ticket (
    id              TEXT PRIMARY KEY NOT NULL,
    admin_id        TEXT REFERENCES user_account(id) ON DELETE SET NULL,
    technician_id   TEXT REFERENCES user_account(id) ON DELETE SET NULL,
    client_id       TEXT REFERENCES user_account(id) ON DELETE SET NULL,
    state_id        INTEGER NOT NULL REFERENCES state(id) ON DELETE RESTRICT,
    title           TEXT NOT NULL,
    description     TEXT NOT NULL,
    equipment       TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS state_change_request (
    id              TEXT PRIMARY KEY NOT NULL,
    ticket_id       TEXT NOT NULL REFERENCES ticket(id) ON DELETE CASCADE,
    requested_by    TEXT NOT NULL,
    from_state_id   INTEGER NOT NULL REFERENCES state(id) ON DELETE RESTRICT,
    to_state_id     INTEGER NOT NULL REFERENCES state(id) ON DELETE RESTRICT,
    status          TEXT NOT NULL CHECK(status IN ('pending','approved','rejected')),
    reason          TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    approved_by     TEXT,
    approved_at     TEXT,
    rejection_reason TEXT,
    CHECK(status <> 'pending' OR (approved_by IS NULL AND approved_at IS NULL))
);

CREATE TABLE IF NOT EXISTS notification_type (
    code            TEXT PRIMARY KEY NOT NULL,
    name            TEXT NOT NULL,
    description     TEXT NOT NULL,
    send_to_client  INTEGER NOT NULL DEFAULT 0,
    send_to_technician INTEGER NOT NULL DEFAULT 0,
    send_to_admin   INTEGER NOT NULL DEFAULT 0,
    is_active       INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS notification (
    id              TEXT PRIMARY KEY NOT NULL,
    user_id         TEXT NOT NULL REFERENCES user_account(id) ON DELETE CASCADE,
    recipients      TEXT NOT NULL,
    ticket_id       TEXT REFERENCES ticket(id) ON DELETE SET NULL,
    type_code       TEXT NOT NULL REFERENCES notification_type(code),
    title           TEXT NOT NULL,
    message         TEXT NOT NULL,
    sent_by         TEXT,
    status          TEXT NOT NULL CHECK(status IN ('pending','sent','read','failed')),
    created_at      TEXT NOT NULL,
    sent_at         TEXT,
    read_at         TEXT,
    extra_data      TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_ticket_technician ON ticket(technician_id);
CREATE INDEX IF NOT EXISTS idx_request_ticket ON state_change_request(ticket_id);
CREATE INDEX IF NOT EXISTS idx_request_status ON state_change_request(status);
CREATE INDEX IF NOT EXISTS idx_notification_user ON notification(user_id);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}

/// Insert the state catalog rows that are not present yet.
///
/// # Errors
///
/// Returns `AppError::Db` if an insert fails.
pub async fn seed_states(pool: &SqlitePool) -> Result<()> {
    for &(id, code, name, is_active, is_final) in SEED {
        sqlx::query(
            "INSERT OR IGNORE INTO state (id, code, name, is_active, is_final)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id)
        .bind(code)
        .bind(name)
        .bind(i64::from(is_active))
        .bind(i64::from(is_final))
        .execute(pool)
        .await?;
    }
    Ok(())
}
