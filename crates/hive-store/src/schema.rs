use hive_core::Result;
use rusqlite::Connection;

/// Initialise every store table. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    create_users(conn)?;
    create_conversations(conn)?;
    create_messages(conn)?;
    create_usage_log(conn)?;
    create_skills(conn)?;
    create_reminders(conn)?;
    create_workflows(conn)?;
    create_workflow_runs(conn)?;
    create_schedules(conn)?;
    create_credentials(conn)?;
    create_channel_identities(conn)?;
    create_file_metadata(conn)?;
    create_debug_log(conn)?;
    Ok(())
}

fn create_users(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT,
            config      TEXT NOT NULL DEFAULT '{}',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        ) STRICT;",
    )?;
    Ok(())
}

fn create_conversations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversations (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            title       TEXT,
            summary     TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_conversations_user
            ON conversations(user_id, updated_at DESC);",
    )?;
    Ok(())
}

fn create_messages(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            role            TEXT NOT NULL,
            content         TEXT NOT NULL,
            created_at      TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);",
    )?;
    Ok(())
}

fn create_usage_log(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS usage_log (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            model       TEXT NOT NULL,
            tokens_in   INTEGER NOT NULL,
            tokens_out  INTEGER NOT NULL,
            cost_cents  REAL NOT NULL,
            created_at  TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_usage_user
            ON usage_log(user_id, created_at DESC);",
    )?;
    Ok(())
}

fn create_skills(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS skills (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT,
            name        TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            content     TEXT NOT NULL,
            is_shared   INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_skills_owner_name
            ON skills(owner_id, name);",
    )?;
    Ok(())
}

fn create_reminders(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS reminders (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL,
            text         TEXT NOT NULL,
            is_complete  INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL,
            completed_at TEXT,
            due_at       TEXT,
            notified_at  TEXT
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_reminders_user
            ON reminders(user_id, is_complete);
        CREATE INDEX IF NOT EXISTS idx_reminders_due
            ON reminders(due_at) WHERE notified_at IS NULL;",
    )?;
    Ok(())
}

fn create_workflows(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS workflows (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT NOT NULL,
            name        TEXT NOT NULL,
            steps_json  TEXT NOT NULL,
            is_active   INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_workflows_owner
            ON workflows(owner_id, is_active);",
    )?;
    Ok(())
}

fn create_workflow_runs(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS workflow_runs (
            id                 TEXT PRIMARY KEY,
            workflow_id        TEXT NOT NULL REFERENCES workflows(id),
            owner_id           TEXT NOT NULL,
            status             TEXT NOT NULL,
            steps_result_json  TEXT NOT NULL DEFAULT '[]',
            started_at         TEXT NOT NULL,
            completed_at       TEXT,
            error              TEXT
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_runs_workflow
            ON workflow_runs(workflow_id, started_at DESC);",
    )?;
    Ok(())
}

fn create_schedules(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schedules (
            id              TEXT PRIMARY KEY,
            owner_id        TEXT NOT NULL,
            workflow_id     TEXT NOT NULL REFERENCES workflows(id),
            cron_expression TEXT NOT NULL,
            timezone        TEXT NOT NULL DEFAULT 'UTC',
            is_active       INTEGER NOT NULL DEFAULT 1,
            last_run_at     TEXT,
            next_run_at     TEXT
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_schedules_active
            ON schedules(is_active);",
    )?;
    Ok(())
}

fn create_credentials(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS credentials (
            id              TEXT PRIMARY KEY,
            owner_id        TEXT NOT NULL,
            name            TEXT NOT NULL,
            service         TEXT NOT NULL,
            encrypted_value TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            UNIQUE(owner_id, name)
        ) STRICT;",
    )?;
    Ok(())
}

fn create_channel_identities(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS channel_identities (
            id               TEXT PRIMARY KEY,
            owner_id         TEXT NOT NULL,
            channel          TEXT NOT NULL,
            channel_user_id  TEXT NOT NULL,
            UNIQUE(channel, channel_user_id)
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_identities_owner
            ON channel_identities(owner_id);",
    )?;
    Ok(())
}

fn create_file_metadata(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS file_metadata (
            user_id          TEXT NOT NULL,
            filename         TEXT NOT NULL,
            tracked          INTEGER NOT NULL DEFAULT 0,
            last_uploaded_at TEXT NOT NULL,
            PRIMARY KEY (user_id, filename)
        ) STRICT;",
    )?;
    Ok(())
}

fn create_debug_log(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS debug_log (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL,
            conversation_id TEXT NOT NULL,
            payload_json    TEXT NOT NULL,
            created_at      TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_debug_log_user_conv
            ON debug_log(user_id, conversation_id, created_at DESC);",
    )?;
    Ok(())
}
