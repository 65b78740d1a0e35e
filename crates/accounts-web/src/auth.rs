//! Session-based login state.
//!
//! A logged-in session stores the user id under [`SESSION_KEY`] and a hash of
//! the user's password hash under [`HASH_SESSION_KEY`]. [`current_user`]
//! rejects the session once the hash no longer matches, so changing the
//! password ends every other session of that user.

use accounts_auth::{User, UserStore};
use accounts_core::crypto::constant_time_eq;
use accounts_core::error::AccountsResult;
use chrono::Utc;

use crate::session::Session;

pub const SESSION_KEY: &str = "_auth_user_id";
pub const HASH_SESSION_KEY: &str = "_auth_user_hash";

/// Logs `user` into `session` and records the login time.
///
/// A session that belonged to someone else is flushed first; otherwise the
/// key is cycled so a pre-login key cannot be reused.
pub async fn login(
    session: &Session,
    store: &dyn UserStore,
    user: &mut User,
    secret: &str,
) -> AccountsResult<()> {
    let hash = user.session_auth_hash(secret);
    match session.get::<i64>(SESSION_KEY).await {
        Some(id) if id != user.id => session.flush().await,
        _ => session.cycle_key().await,
    }
    session.insert(SESSION_KEY, &user.id).await?;
    session.insert(HASH_SESSION_KEY, &hash).await?;

    user.last_login = Some(Utc::now());
    store.update_user(user).await?;
    tracing::info!(user_id = user.id, "user logged in");
    Ok(())
}

/// Ends the login and drops all session data.
pub async fn logout(session: &Session) {
    if let Some(id) = session.get::<i64>(SESSION_KEY).await {
        tracing::info!(user_id = id, "user logged out");
    }
    session.flush().await;
}

/// Returns the logged-in user, if the session still vouches for one.
///
/// The user must exist, be active, and have the password the session was
/// created with. A stale session is flushed.
pub async fn current_user(
    session: &Session,
    store: &dyn UserStore,
    secret: &str,
) -> AccountsResult<Option<User>> {
    let Some(id) = session.get::<i64>(SESSION_KEY).await else {
        return Ok(None);
    };
    let stored_hash = session
        .get::<String>(HASH_SESSION_KEY)
        .await
        .unwrap_or_default();

    let user = store.get_user(id).await?.filter(|u| u.is_active);
    match user {
        Some(user)
            if constant_time_eq(
                stored_hash.as_bytes(),
                user.session_auth_hash(secret).as_bytes(),
            ) =>
        {
            Ok(Some(user))
        }
        _ => {
            tracing::debug!(user_id = id, "discarding stale login session");
            session.flush().await;
            Ok(None)
        }
    }
}

/// Re-signs the session after `user` changed password, keeping them logged in.
pub async fn update_session_auth_hash(
    session: &Session,
    user: &User,
    secret: &str,
) -> AccountsResult<()> {
    session.cycle_key().await;
    if session.get::<i64>(SESSION_KEY).await == Some(user.id) {
        session
            .insert(HASH_SESSION_KEY, &user.session_auth_hash(secret))
            .await?;
    }
    Ok(())
}
