//! Persistence for users and activations.
//!
//! [`UserStore`] is the seam between the account logic and storage. The
//! production implementation, [`SqliteUserStore`], runs hand-written SQL on
//! the shared [`Database`] handle.
//!
//! Email addresses are compared case-insensitively everywhere. Non-blank
//! emails are unique; a write that would duplicate one fails with a
//! [`ValidationError`] coded [`UNIQUE_EMAIL`].

use accounts_core::database::{format_timestamp, parse_timestamp, USER_EMAIL_INDEX};
use accounts_core::error::{AccountsError, AccountsResult, ValidationError};
use accounts_core::Database;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::activation::Activation;
use crate::user::{NewUser, User};

/// Storage operations for users and their activations.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user. Fails with `IntegrityError` on a duplicate username
    /// and with a [`UNIQUE_EMAIL`] validation error on a duplicate email.
    async fn create_user(&self, new_user: NewUser) -> AccountsResult<User>;

    /// Writes every column of `user` back to its row.
    async fn update_user(&self, user: &User) -> AccountsResult<()>;

    /// Deletes a user and, by cascade, their activations.
    async fn delete_user(&self, id: i64) -> AccountsResult<()>;

    async fn get_user(&self, id: i64) -> AccountsResult<Option<User>>;

    async fn get_by_username(&self, username: &str) -> AccountsResult<Option<User>>;

    /// The first user (by id) with this email.
    async fn get_by_email(&self, email: &str) -> AccountsResult<Option<User>>;

    /// The first user (by id) whose username or email equals `value`.
    async fn find_by_email_or_username(&self, value: &str) -> AccountsResult<Option<User>>;

    /// Every active user with this email.
    async fn active_users_with_email(&self, email: &str) -> AccountsResult<Vec<User>>;

    /// Returns `true` if a user other than `exclude` has this email.
    async fn email_in_use(&self, email: &str, exclude: Option<i64>) -> AccountsResult<bool>;

    async fn username_in_use(&self, username: &str) -> AccountsResult<bool>;

    async fn count_users(&self) -> AccountsResult<i64>;

    /// Records a new activation code for `user_id`.
    async fn create_activation(
        &self,
        user_id: i64,
        code: &str,
        email: Option<&str>,
    ) -> AccountsResult<Activation>;

    async fn activation_by_code(&self, code: &str) -> AccountsResult<Option<Activation>>;

    /// The latest sign-up activation (one without an email) of `user_id`.
    async fn activation_for_user(&self, user_id: i64) -> AccountsResult<Option<Activation>>;

    async fn delete_activation(&self, id: i64) -> AccountsResult<()>;

    /// Deletes all activations of `user_id`, returning how many were removed.
    async fn delete_activations_for_user(&self, user_id: i64) -> AccountsResult<usize>;

    /// Deletes the pending email-change activations of `user_id`, returning
    /// how many were removed.
    async fn delete_email_activations(&self, user_id: i64) -> AccountsResult<usize>;
}

/// Validation code of a write rejected because the email belongs to another user.
pub const UNIQUE_EMAIL: &str = "unique_email";

/// `true` if `err` is a write rejected by the unique email index.
pub fn is_email_conflict(err: &AccountsError) -> bool {
    matches!(err, AccountsError::ValidationError(e) if e.code == UNIQUE_EMAIL)
}

fn email_conflict(err: AccountsError) -> AccountsError {
    match err {
        AccountsError::IntegrityError(ref message) if message.contains(USER_EMAIL_INDEX) => {
            ValidationError::new("You can not use this email.", UNIQUE_EMAIL).into()
        }
        other => other,
    }
}

const USER_COLUMNS: &str = "id, username, email, password, first_name, last_name, \
                            is_active, is_staff, is_superuser, last_login, date_joined";

const ACTIVATION_COLUMNS: &str = "id, user_id, code, email, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let last_login: Option<String> = row.get(9)?;
    let date_joined: String = row.get(10)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        is_active: row.get(6)?,
        is_staff: row.get(7)?,
        is_superuser: row.get(8)?,
        last_login: last_login.as_deref().map(parse_timestamp).transpose()?,
        date_joined: parse_timestamp(&date_joined)?,
    })
}

fn activation_from_row(row: &Row<'_>) -> rusqlite::Result<Activation> {
    let created_at: String = row.get(4)?;
    Ok(Activation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        code: row.get(2)?,
        email: row.get(3)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// [`UserStore`] over SQLite.
#[derive(Debug, Clone)]
pub struct SqliteUserStore {
    db: Database,
}

impl SqliteUserStore {
    /// Wraps a migrated database.
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    pub const fn database(&self) -> &Database {
        &self.db
    }

    async fn query_user(&self, sql: String, arg: String) -> AccountsResult<Option<User>> {
        self.db
            .call(move |conn| {
                Ok(conn
                    .query_row(&sql, [arg], user_from_row)
                    .optional()?)
            })
            .await
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create_user(&self, new_user: NewUser) -> AccountsResult<User> {
        let date_joined = Utc::now();
        let joined = format_timestamp(&date_joined);
        let id = self
            .db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO users (username, email, password, first_name, last_name, \
                     is_active, is_staff, is_superuser, date_joined) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        new_user.username,
                        new_user.email,
                        new_user.password,
                        new_user.first_name,
                        new_user.last_name,
                        new_user.is_active,
                        new_user.is_staff,
                        new_user.is_superuser,
                        joined,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(email_conflict)?;

        tracing::debug!(user_id = id, "user row inserted");
        self.get_user(id)
            .await?
            .ok_or_else(|| AccountsError::DatabaseError(format!("user {id} vanished after insert")))
    }

    async fn update_user(&self, user: &User) -> AccountsResult<()> {
        let user = user.clone();
        let changed = self
            .db
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE users SET username = ?1, email = ?2, password = ?3, first_name = ?4, \
                     last_name = ?5, is_active = ?6, is_staff = ?7, is_superuser = ?8, \
                     last_login = ?9 WHERE id = ?10",
                    params![
                        user.username,
                        user.email,
                        user.password,
                        user.first_name,
                        user.last_name,
                        user.is_active,
                        user.is_staff,
                        user.is_superuser,
                        user.last_login.as_ref().map(format_timestamp),
                        user.id,
                    ],
                )?)
            })
            .await
            .map_err(email_conflict)?;
        if changed == 0 {
            return Err(AccountsError::DoesNotExist("User matching query does not exist.".into()));
        }
        Ok(())
    }

    async fn delete_user(&self, id: i64) -> AccountsResult<()> {
        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
                Ok(())
            })
            .await
    }

    async fn get_user(&self, id: i64) -> AccountsResult<Option<User>> {
        self.db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                        [id],
                        user_from_row,
                    )
                    .optional()?)
            })
            .await
    }

    async fn get_by_username(&self, username: &str) -> AccountsResult<Option<User>> {
        self.query_user(
            format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            username.to_string(),
        )
        .await
    }

    async fn get_by_email(&self, email: &str) -> AccountsResult<Option<User>> {
        self.query_user(
            format!(
                "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower(?1) \
                 ORDER BY id LIMIT 1"
            ),
            email.to_string(),
        )
        .await
    }

    async fn find_by_email_or_username(&self, value: &str) -> AccountsResult<Option<User>> {
        self.query_user(
            format!(
                "SELECT {USER_COLUMNS} FROM users \
                 WHERE username = ?1 OR lower(email) = lower(?1) ORDER BY id LIMIT 1"
            ),
            value.to_string(),
        )
        .await
    }

    async fn active_users_with_email(&self, email: &str) -> AccountsResult<Vec<User>> {
        let email = email.to_string();
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {USER_COLUMNS} FROM users \
                     WHERE lower(email) = lower(?1) AND is_active = 1 ORDER BY id"
                ))?;
                let users = stmt
                    .query_map([email], user_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(users)
            })
            .await
    }

    async fn email_in_use(&self, email: &str, exclude: Option<i64>) -> AccountsResult<bool> {
        let email = email.to_string();
        self.db
            .call(move |conn| {
                Ok(conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower(?1) \
                     AND (?2 IS NULL OR id != ?2))",
                    params![email, exclude],
                    |row| row.get(0),
                )?)
            })
            .await
    }

    async fn username_in_use(&self, username: &str) -> AccountsResult<bool> {
        let username = username.to_string();
        self.db
            .call(move |conn| {
                Ok(conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                    [username],
                    |row| row.get(0),
                )?)
            })
            .await
    }

    async fn count_users(&self) -> AccountsResult<i64> {
        self.db
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?))
            .await
    }

    async fn create_activation(
        &self,
        user_id: i64,
        code: &str,
        email: Option<&str>,
    ) -> AccountsResult<Activation> {
        let created_at = Utc::now();
        let activation = Activation {
            id: 0,
            user_id,
            code: code.to_string(),
            email: email.map(str::to_lowercase),
            created_at,
        };
        let row = activation.clone();
        let id = self
            .db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO activations (user_id, code, email, created_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![row.user_id, row.code, row.email, format_timestamp(&row.created_at)],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(Activation { id, ..activation })
    }

    async fn activation_by_code(&self, code: &str) -> AccountsResult<Option<Activation>> {
        let code = code.to_string();
        self.db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {ACTIVATION_COLUMNS} FROM activations WHERE code = ?1"),
                        [code],
                        activation_from_row,
                    )
                    .optional()?)
            })
            .await
    }

    async fn activation_for_user(&self, user_id: i64) -> AccountsResult<Option<Activation>> {
        self.db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!(
                            "SELECT {ACTIVATION_COLUMNS} FROM activations \
                             WHERE user_id = ?1 AND email IS NULL ORDER BY id DESC LIMIT 1"
                        ),
                        [user_id],
                        activation_from_row,
                    )
                    .optional()?)
            })
            .await
    }

    async fn delete_activation(&self, id: i64) -> AccountsResult<()> {
        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM activations WHERE id = ?1", [id])?;
                Ok(())
            })
            .await
    }

    async fn delete_activations_for_user(&self, user_id: i64) -> AccountsResult<usize> {
        self.db
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM activations WHERE user_id = ?1", [user_id])?)
            })
            .await
    }

    async fn delete_email_activations(&self, user_id: i64) -> AccountsResult<usize> {
        self.db
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM activations WHERE user_id = ?1 AND email IS NOT NULL",
                    [user_id],
                )?)
            })
            .await
    }
}
