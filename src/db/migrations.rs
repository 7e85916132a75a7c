//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use super::Database;

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        let current_version = current_version.unwrap_or(0);

        if current_version < 1 {
            Self::apply_migration(&mut conn, 1).await?;
        }
        if current_version < 2 {
            Self::apply_migration(&mut conn, 2).await?;
        }

        Ok(())
    }

    /// Apply one migration inside a transaction so a partial failure leaves
    /// the schema untouched
    async fn apply_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        tracing::info!(version, "Applying database migration");

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;

        let result = async {
            match version {
                1 => {
                    Self::create_processed_editions_schema(conn).await?;
                    Self::create_publications_table(conn).await?;
                    Self::create_recipients_schema(conn).await?;
                }
                2 => {
                    Self::create_delivery_ledger_table(conn).await?;
                    Self::create_tracking_meta_table(conn).await?;
                }
                other => {
                    return Err(Error::Database(DatabaseError::MigrationFailed(format!(
                        "Unknown migration version {}",
                        other
                    ))));
                }
            }
            Self::record_migration(conn, version).await?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Failed to commit migration v{}: {}",
                            version, e
                        )))
                    })?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!(version, "Database migration complete");
        Ok(())
    }

    /// Execute one DDL statement, labelling failures with `what`
    async fn execute_ddl(conn: &mut SqliteConnection, sql: &str, what: &str) -> Result<()> {
        sqlx::query(sql).execute(&mut *conn).await.map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create {}: {}",
                what, e
            )))
        })?;
        Ok(())
    }

    /// Create the processed_editions table and its index
    async fn create_processed_editions_schema(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE processed_editions (
                edition_key TEXT PRIMARY KEY,
                publication_id TEXT NOT NULL,
                title TEXT NOT NULL,
                issue TEXT NOT NULL,
                publication_date TEXT NOT NULL,
                source_ref TEXT,
                artifact_name TEXT,
                artifact_sha256 TEXT,
                archive_location TEXT,
                downloaded_at INTEGER,
                notified_at INTEGER,
                dropoff_completed_at INTEGER,
                archived_at INTEGER,
                processed_at INTEGER,
                created_at INTEGER NOT NULL
            )
            "#,
            "processed_editions table",
        )
        .await?;

        Self::execute_ddl(
            conn,
            "CREATE INDEX idx_processed_editions_publication ON processed_editions(publication_id)",
            "processed_editions index",
        )
        .await
    }

    /// Create the publications table
    async fn create_publications_table(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE publications (
                publication_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                notify_enabled INTEGER NOT NULL DEFAULT 0,
                dropoff_enabled INTEGER NOT NULL DEFAULT 0,
                dropoff_destination TEXT,
                organize_by_year INTEGER,
                enabled INTEGER NOT NULL DEFAULT 1,
                updated_at INTEGER NOT NULL
            )
            "#,
            "publications table",
        )
        .await
    }

    /// Create the recipients and recipient_preferences tables
    ///
    /// `has_preference_list` keeps "no list" and "empty list" apart.
    async fn create_recipients_schema(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE recipients (
                identity TEXT PRIMARY KEY,
                name TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                has_preference_list INTEGER NOT NULL DEFAULT 0,
                last_delivery_at INTEGER,
                updated_at INTEGER NOT NULL
            )
            "#,
            "recipients table",
        )
        .await?;

        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE recipient_preferences (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recipient TEXT NOT NULL REFERENCES recipients(identity) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                publication_id TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                notify_enabled INTEGER,
                dropoff_enabled INTEGER,
                custom_dropoff_destination TEXT,
                organize_by_year INTEGER,
                send_count INTEGER NOT NULL DEFAULT 0,
                last_sent_at INTEGER,
                UNIQUE(recipient, publication_id)
            )
            "#,
            "recipient_preferences table",
        )
        .await
    }

    /// Create the delivery_ledger table
    async fn create_delivery_ledger_table(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE delivery_ledger (
                edition_key TEXT NOT NULL,
                recipient TEXT NOT NULL,
                channel TEXT NOT NULL,
                delivered_at INTEGER NOT NULL,
                reference TEXT,
                PRIMARY KEY (edition_key, recipient, channel)
            )
            "#,
            "delivery_ledger table",
        )
        .await
    }

    /// Create the tracking_meta key/value table
    async fn create_tracking_meta_table(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE tracking_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            "tracking_meta table",
        )
        .await
    }

    /// Record a migration version
    async fn record_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
