//! The user record.
//!
//! [`User`] mirrors a row of the `users` table. [`NewUser`] carries the
//! columns supplied on insert; the store fills in `id` and `date_joined`.

use accounts_core::crypto::salted_hmac_hex;
use accounts_core::error::AccountsResult;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::hashers::{self, UserAttributes};

const SESSION_HASH_SALT: &str = "accounts.auth.User.session_auth_hash";

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Email address, stored lowercased. May be empty for users created
    /// from the command line.
    pub email: String,
    /// Encoded password hash. Starts with `!` when unusable.
    #[serde(skip_serializing)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Inactive users cannot sign in; new users stay inactive until they
    /// follow their activation link.
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// First and last name separated by a space, trimmed.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// The first name.
    pub fn short_name(&self) -> &str {
        &self.first_name
    }

    /// Hashes and stores a new password. The caller persists the change.
    pub async fn set_password(&mut self, raw_password: &str) -> AccountsResult<()> {
        self.password = hashers::make_password(raw_password).await?;
        Ok(())
    }

    /// Checks a password against the stored hash.
    pub async fn check_password(&self, raw_password: &str) -> AccountsResult<bool> {
        hashers::check_password(raw_password, &self.password).await
    }

    /// Replaces the password with one no input can match.
    pub fn set_unusable_password(&mut self) {
        self.password = hashers::make_unusable_password();
    }

    pub fn has_usable_password(&self) -> bool {
        hashers::is_password_usable(&self.password)
    }

    /// An HMAC of the password hash, stored in the session at login.
    ///
    /// Changing the password changes this value, which invalidates every
    /// session that stored the old one.
    pub fn session_auth_hash(&self, secret: &str) -> String {
        salted_hmac_hex(SESSION_HASH_SALT, &self.password, secret)
    }

    /// The attributes password validators compare against.
    pub fn attributes(&self) -> UserAttributes {
        UserAttributes {
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// The columns of a user about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    /// Already-encoded password hash.
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl NewUser {
    /// An active, non-staff user with an unusable password.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into().to_lowercase(),
            password: hashers::make_unusable_password(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
        }
    }

    /// Hashes `raw_password` into the record.
    pub async fn with_password(mut self, raw_password: &str) -> AccountsResult<Self> {
        self.password = hashers::make_password(raw_password).await?;
        Ok(self)
    }

    #[must_use]
    pub fn names(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }

    #[must_use]
    pub const fn active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Marks the user as staff and superuser.
    #[must_use]
    pub const fn superuser(mut self) -> Self {
        self.is_staff = true;
        self.is_superuser = true;
        self
    }
}
