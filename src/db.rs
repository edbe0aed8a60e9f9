use crate::error::AppResult;
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

/// Table layout shared with existing deployments. `phrasebook_translation`
/// keeps its composite primary key and nullable `note` column.
///
/// Foreign keys have no ON DELETE actions. The store performs every cascade
/// itself, and deleting a still-referenced row is rejected.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS phrasebooks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id),
    public INTEGER NOT NULL DEFAULT 0,
    lang_from TEXT NOT NULL,
    lang_to TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS translations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    lang_from TEXT NOT NULL,
    lang_to TEXT NOT NULL,
    text_from TEXT NOT NULL,
    text_to TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS phrasebook_translation (
    phrasebook_id INTEGER NOT NULL REFERENCES phrasebooks(id),
    translation_id INTEGER NOT NULL REFERENCES translations(id),
    note TEXT,
    PRIMARY KEY (phrasebook_id, translation_id)
);

CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_phrasebooks_user ON phrasebooks(user_id);
CREATE INDEX IF NOT EXISTS idx_phrasebook_translation_translation
    ON phrasebook_translation(translation_id);
CREATE INDEX IF NOT EXISTS idx_translations_content
    ON translations(text_from, text_to, lang_to);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
"#;

#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
    // One writer at a time: a deferred read-then-write transaction fails
    // with SQLITE_BUSY_SNAPSHOT, which busy_timeout does not retry
    writer: Arc<Mutex<()>>,
}

/// A write transaction holding the process-wide writer slot.
///
/// Derefs to the underlying connection so store functions take it directly.
/// Dropping it without [`WriteTx::commit`] rolls back.
pub struct WriteTx {
    tx: Transaction<'static, Sqlite>,
    _writer: OwnedMutexGuard<()>,
}

impl WriteTx {
    pub async fn commit(self) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

impl Deref for WriteTx {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        &self.tx
    }
}

impl DerefMut for WriteTx {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }
}

impl Database {
    /// Connect using a `sqlite://` URL and create tables
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?;
        Self::connect(options).await
    }

    /// Open (or create) a database file at `path` and create tables
    pub async fn open(path: &Path) -> Result<Self> {
        Self::connect(SqliteConnectOptions::new().filename(path)).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        let options = options
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            // Writers queue on the file lock instead of failing with SQLITE_BUSY
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to open database")?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .context("Failed to create tables")?;

        info!("Database ready");
        Ok(Self {
            pool,
            writer: Arc::new(Mutex::new(())),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a request-scoped write transaction, waiting for any other
    /// writer to finish first
    pub async fn begin(&self) -> AppResult<WriteTx> {
        let writer = self.writer.clone().lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(WriteTx {
            tx,
            _writer: writer,
        })
    }

    /// Cheap connectivity check for `/health`
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
