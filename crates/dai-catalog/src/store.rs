use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use dai_core::types::{BotId, BotRecord, CommandIntegration, ModelDescriptor, ProviderDescriptor};

use crate::error::CatalogError;

/// Read API over persisted bots, providers, models and integrations.
///
/// Every call hits the backing store; nothing is cached, so credentials
/// rotated externally take effect on the next lookup.
pub trait Catalog: Send + Sync {
    fn bot(&self, id: BotId) -> Result<Option<BotRecord>, CatalogError>;
    fn bot_by_name(&self, name: &str) -> Result<Option<BotRecord>, CatalogError>;
    fn bots(&self) -> Result<Vec<BotRecord>, CatalogError>;
    fn provider(&self, id: i64) -> Result<Option<ProviderDescriptor>, CatalogError>;
    fn model(&self, id: i64) -> Result<Option<ModelDescriptor>, CatalogError>;
    /// Integrations for a bot, ordered by primary key.
    fn integrations_for_bot(&self, bot_id: BotId) -> Result<Vec<CommandIntegration>, CatalogError>;
    /// Record whether a bot is currently running.
    fn set_bot_active(&self, id: BotId, active: bool) -> Result<(), CatalogError>;
}

/// SQLite-backed catalog. The connection is guarded by a mutex so the
/// catalog can be shared across bot tasks.
pub struct SqliteCatalog {
    db: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Wrap a connection, creating the schema if it does not exist yet.
    pub fn new(conn: Connection) -> Result<Self, CatalogError> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn open(path: &str) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::new(conn)
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::new(conn)
    }

    /// Run raw SQL against the backing connection. Used by seed scripts and tests.
    pub fn execute_batch(&self, sql: &str) -> Result<(), CatalogError> {
        self.conn().execute_batch(sql)?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Catalog for SqliteCatalog {
    fn bot(&self, id: BotId) -> Result<Option<BotRecord>, CatalogError> {
        let db = self.conn();
        let bot = db
            .query_row(
                "SELECT id, name, token, is_active FROM discord_bots WHERE id = ?1",
                rusqlite::params![id.get()],
                row_to_bot,
            )
            .optional()?;
        Ok(bot)
    }

    fn bot_by_name(&self, name: &str) -> Result<Option<BotRecord>, CatalogError> {
        let db = self.conn();
        let bot = db
            .query_row(
                "SELECT id, name, token, is_active FROM discord_bots WHERE name = ?1",
                rusqlite::params![name],
                row_to_bot,
            )
            .optional()?;
        Ok(bot)
    }

    fn bots(&self) -> Result<Vec<BotRecord>, CatalogError> {
        let db = self.conn();
        let mut stmt =
            db.prepare("SELECT id, name, token, is_active FROM discord_bots ORDER BY id")?;
        let rows = stmt.query_map([], row_to_bot)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn provider(&self, id: i64) -> Result<Option<ProviderDescriptor>, CatalogError> {
        let db = self.conn();
        let provider = db
            .query_row(
                "SELECT id, name, api_key, base_url, is_active FROM ai_providers WHERE id = ?1",
                rusqlite::params![id],
                |row| {
                    Ok(ProviderDescriptor {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        api_key: row.get(2)?,
                        base_url: row.get(3)?,
                        is_active: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(provider)
    }

    fn model(&self, id: i64) -> Result<Option<ModelDescriptor>, CatalogError> {
        let db = self.conn();
        let model = db
            .query_row(
                "SELECT id, name, provider_id, model_id, configuration, is_active
                 FROM ai_models WHERE id = ?1",
                rusqlite::params![id],
                |row| {
                    Ok(ModelDescriptor {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        provider_id: row.get(2)?,
                        native_id: row.get(3)?,
                        configuration: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        is_active: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(model)
    }

    fn integrations_for_bot(&self, bot_id: BotId) -> Result<Vec<CommandIntegration>, CatalogError> {
        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT id, bot_id, model_id, command
             FROM bot_model_integrations
             WHERE bot_id = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(rusqlite::params![bot_id.get()], |row| {
            Ok(CommandIntegration {
                id: row.get(0)?,
                bot_id: BotId(row.get(1)?),
                model_id: row.get(2)?,
                command: row.get(3)?,
            })
        })?;
        let integrations = rows.collect::<Result<Vec<_>, _>>()?;
        debug!(bot = %bot_id, count = integrations.len(), "loaded integrations");
        Ok(integrations)
    }

    fn set_bot_active(&self, id: BotId, active: bool) -> Result<(), CatalogError> {
        let db = self.conn();
        db.execute(
            "UPDATE discord_bots SET is_active = ?1 WHERE id = ?2",
            rusqlite::params![active, id.get()],
        )?;
        Ok(())
    }
}

fn row_to_bot(row: &rusqlite::Row<'_>) -> rusqlite::Result<BotRecord> {
    Ok(BotRecord {
        id: BotId(row.get(0)?),
        name: row.get(1)?,
        token: row.get(2)?,
        is_active: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteCatalog {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog
            .execute_batch(
                "INSERT INTO ai_providers (id, name, api_key, base_url) VALUES
                    (1, 'openai', 'sk-test', NULL),
                    (2, 'deepseek', 'ds-test', 'http://localhost:9999');
                 INSERT INTO ai_models (id, name, provider_id, model_id, configuration) VALUES
                    (10, 'GPT X', 1, 'gpt-x', '{\"temperature\":0.5}'),
                    (11, 'Deep', 2, 'deepseek-chat', '');
                 INSERT INTO discord_bots (id, name, token, is_active) VALUES
                    (100, 'alpha', 'tok-a', 1),
                    (101, 'beta', 'tok-b', 0);
                 INSERT INTO bot_model_integrations (bot_id, model_id, command) VALUES
                    (100, 10, 'gpt'),
                    (100, 11, 'deep'),
                    (101, 10, 'gpt');",
            )
            .unwrap();
        catalog
    }

    #[test]
    fn init_db_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        crate::db::init_db(&conn).unwrap();
    }

    #[test]
    fn reads_bots_by_id_and_name() {
        let catalog = seeded();
        let alpha = catalog.bot(BotId(100)).unwrap().unwrap();
        assert_eq!(alpha.name, "alpha");
        assert!(alpha.is_active);

        let beta = catalog.bot_by_name("beta").unwrap().unwrap();
        assert_eq!(beta.id, BotId(101));
        assert!(!beta.is_active);

        assert!(catalog.bot(BotId(999)).unwrap().is_none());
        assert_eq!(catalog.bots().unwrap().len(), 2);
    }

    #[test]
    fn integrations_are_scoped_to_bot() {
        let catalog = seeded();
        let alpha = catalog.integrations_for_bot(BotId(100)).unwrap();
        let keywords: Vec<_> = alpha.iter().map(|i| i.command.as_str()).collect();
        assert_eq!(keywords, vec!["gpt", "deep"]);

        let beta = catalog.integrations_for_bot(BotId(101)).unwrap();
        assert_eq!(beta.len(), 1);
    }

    #[test]
    fn duplicate_keyword_per_bot_is_rejected() {
        let catalog = seeded();
        let err = catalog.execute_batch(
            "INSERT INTO bot_model_integrations (bot_id, model_id, command) VALUES (100, 11, 'gpt');",
        );
        assert!(err.is_err());
    }

    #[test]
    fn reads_models_and_providers() {
        let catalog = seeded();
        let model = catalog.model(10).unwrap().unwrap();
        assert_eq!(model.native_id, "gpt-x");
        assert_eq!(model.config().temperature, Some(0.5));

        let provider = catalog.provider(2).unwrap().unwrap();
        assert_eq!(provider.name, "deepseek");
        assert_eq!(provider.base_url.as_deref(), Some("http://localhost:9999"));
        assert!(catalog.provider(3).unwrap().is_none());
    }

    #[test]
    fn set_bot_active_flips_flag() {
        let catalog = seeded();
        catalog.set_bot_active(BotId(101), true).unwrap();
        assert!(catalog.bot(BotId(101)).unwrap().unwrap().is_active);
    }
}
