use rusqlite::{Connection, Result};

/// Initialise catalog tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_providers_table(conn)?;
    create_models_table(conn)?;
    create_bots_table(conn)?;
    create_integrations_table(conn)?;
    Ok(())
}

fn create_providers_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS ai_providers (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            api_key     TEXT NOT NULL,
            base_url    TEXT,
            is_active   INTEGER NOT NULL DEFAULT 1
        );",
    )
}

/// `configuration` is a JSON string (temperature, max_tokens, behavior/persona, name).
fn create_models_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS ai_models (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            name          TEXT NOT NULL,
            provider_id   INTEGER NOT NULL REFERENCES ai_providers(id),
            model_id      TEXT NOT NULL,
            configuration TEXT NOT NULL DEFAULT '',
            is_active     INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_models_provider
            ON ai_models(provider_id);",
    )
}

fn create_bots_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS discord_bots (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            token       TEXT NOT NULL,
            is_active   INTEGER NOT NULL DEFAULT 0
        );",
    )
}

/// One row per generated command; the keyword is unique per bot.
fn create_integrations_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS bot_model_integrations (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            bot_id      INTEGER NOT NULL REFERENCES discord_bots(id) ON DELETE CASCADE,
            model_id    INTEGER NOT NULL REFERENCES ai_models(id),
            command     TEXT NOT NULL,
            UNIQUE(bot_id, command)
        );
        CREATE INDEX IF NOT EXISTS idx_integrations_bot
            ON bot_model_integrations(bot_id);",
    )
}
