//! SQLite database handle and schema migrations.
//!
//! [`Database`] wraps a single `rusqlite` connection behind an async mutex.
//! All work runs on `tokio::task::spawn_blocking` so queries never block the
//! runtime. Migrations are plain SQL applied in order and recorded in the
//! `schema_migrations` table.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::Mutex;

use crate::error::{AccountsError, AccountsResult};

/// An ordered, named schema change.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Unique name recorded once applied.
    pub name: &'static str,
    /// SQL executed as a batch.
    pub sql: &'static str,
}

/// The schema of the accounts application, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_create_users",
        sql: "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL DEFAULT '',
                password TEXT NOT NULL,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                is_active INTEGER NOT NULL DEFAULT 1,
                is_staff INTEGER NOT NULL DEFAULT 0,
                is_superuser INTEGER NOT NULL DEFAULT 0,
                last_login TEXT NULL,
                date_joined TEXT NOT NULL
              );
              CREATE INDEX users_email_idx ON users (email);",
    },
    Migration {
        name: "0002_create_activations",
        sql: "CREATE TABLE activations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                code TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
              );
              CREATE INDEX activations_user_idx ON activations (user_id);",
    },
    Migration {
        name: "0003_activation_email",
        sql: "ALTER TABLE activations ADD COLUMN email TEXT NULL;",
    },
    Migration {
        name: "0004_create_sessions",
        sql: "CREATE TABLE sessions (
                session_key TEXT PRIMARY KEY,
                session_data TEXT NOT NULL,
                expire_date TEXT NOT NULL
              );
              CREATE INDEX sessions_expire_idx ON sessions (expire_date);",
    },
    Migration {
        name: "0005_unique_user_email",
        sql: "DROP INDEX users_email_idx;
              CREATE UNIQUE INDEX users_email_unique ON users (lower(email)) WHERE email <> '';",
    },
];

/// Name of the index that keeps non-blank user emails unique.
pub const USER_EMAIL_INDEX: &str = "users_email_unique";

/// Formats a timestamp for storage.
///
/// The fixed-width UTC form sorts lexicographically in time order, so SQL
/// can compare stored timestamps as text.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a timestamp written by [`format_timestamp`] (any RFC 3339 form is accepted).
pub fn parse_timestamp(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// A shared SQLite connection.
///
/// Cloning is cheap; clones share the same connection.
#[derive(Clone)]
pub struct Database {
    path: PathBuf,
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish_non_exhaustive()
    }
}

impl Database {
    /// Opens the database at `path`, or an in-memory database for `":memory:"`.
    ///
    /// File databases use WAL journaling. Foreign keys are always enforced.
    pub fn open(path: impl Into<PathBuf>) -> AccountsResult<Self> {
        let path = path.into();
        let in_memory = path.to_str() == Some(":memory:");
        let conn = if in_memory {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| AccountsError::DatabaseError(format!("SQLite open failed: {e}")))?;

        if !in_memory {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
        }
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens a fresh in-memory database.
    pub fn memory() -> AccountsResult<Self> {
        Self::open(":memory:")
    }

    /// Returns the database path (`":memory:"` for in-memory databases).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `f` against the connection on the blocking thread pool.
    pub async fn call<F, T>(&self, f: F) -> AccountsResult<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> AccountsResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut conn)
        })
        .await
        .map_err(|e| AccountsError::DatabaseError(format!("Task join error: {e}")))?
    }

    /// Applies every migration in [`MIGRATIONS`] that has not run yet.
    ///
    /// Returns the names of the migrations applied by this call.
    pub async fn migrate(&self) -> AccountsResult<Vec<&'static str>> {
        self.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    name TEXT PRIMARY KEY,
                    applied_at TEXT NOT NULL
                 );",
            )?;

            let mut applied = Vec::new();
            for migration in MIGRATIONS {
                let done: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE name = ?1)",
                    [migration.name],
                    |row| row.get(0),
                )?;
                if done {
                    continue;
                }

                let tx = conn.transaction()?;
                tx.execute_batch(migration.sql)?;
                tx.execute(
                    "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, ?2)",
                    rusqlite::params![migration.name, format_timestamp(&Utc::now())],
                )?;
                tx.commit()?;

                tracing::info!(migration = migration.name, "applied migration");
                applied.push(migration.name);
            }
            Ok(applied)
        })
        .await
    }

    /// Returns the names of the migrations already applied, oldest first.
    pub async fn applied_migrations(&self) -> AccountsResult<Vec<String>> {
        self.call(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations')",
                [],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(Vec::new());
            }
            let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(names)
        })
        .await
    }
}
