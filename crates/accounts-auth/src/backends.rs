//! Credential checking.
//!
//! [`authenticate`] resolves a login identifier to a user according to the
//! configured [`LoginLookup`] and checks the password. Unlike a plain
//! yes/no answer it reports [`AuthOutcome::Inactive`] when the password is
//! right but the account has not been activated, so the sign-in form can
//! say so.

use accounts_core::error::AccountsResult;
use accounts_core::AccountSettings;

use crate::store::UserStore;
use crate::user::User;

/// How the sign-in identifier is matched against users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginLookup {
    /// Exact username match.
    Username,
    /// Case-insensitive email match.
    Email,
    /// Username, or failing that, email.
    EmailOrUsername,
}

impl LoginLookup {
    /// Picks the lookup the account settings ask for.
    ///
    /// `login_via_email_or_username` wins over `login_via_email`.
    pub const fn from_settings(settings: &AccountSettings) -> Self {
        if settings.login_via_email_or_username {
            Self::EmailOrUsername
        } else if settings.login_via_email {
            Self::Email
        } else {
            Self::Username
        }
    }

    /// Name of the identifier input on the sign-in form.
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
            Self::EmailOrUsername => "email_or_username",
        }
    }

    /// Human label of the identifier.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Username => "Username",
            Self::Email => "Email",
            Self::EmailOrUsername => "Email or Username",
        }
    }

    /// Finds the user `identifier` names, active or not.
    pub async fn find_user(
        self,
        store: &dyn UserStore,
        identifier: &str,
    ) -> AccountsResult<Option<User>> {
        match self {
            Self::Username => store.get_by_username(identifier).await,
            Self::Email => store.get_by_email(identifier).await,
            Self::EmailOrUsername => store.find_by_email_or_username(identifier).await,
        }
    }
}

/// Result of a credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Correct password, active account.
    Authenticated(User),
    /// Correct password, inactive account.
    Inactive(User),
    /// Unknown user or wrong password.
    InvalidCredentials,
}

/// Spends the hashing work of a password check when `identifier` matched no
/// user, so a miss takes about as long as a wrong password.
pub async fn hash_for_missing_user(password: &str) -> AccountsResult<()> {
    crate::hashers::make_password(password).await?;
    Ok(())
}

/// Checks `password` for the user `identifier` names.
pub async fn authenticate(
    store: &dyn UserStore,
    lookup: LoginLookup,
    identifier: &str,
    password: &str,
) -> AccountsResult<AuthOutcome> {
    let Some(user) = lookup.find_user(store, identifier).await? else {
        hash_for_missing_user(password).await?;
        return Ok(AuthOutcome::InvalidCredentials);
    };

    if !user.check_password(password).await? {
        tracing::debug!(user_id = user.id, "password mismatch");
        return Ok(AuthOutcome::InvalidCredentials);
    }

    if user.is_active {
        Ok(AuthOutcome::Authenticated(user))
    } else {
        Ok(AuthOutcome::Inactive(user))
    }
}
