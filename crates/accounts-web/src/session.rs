//! Server-side sessions.
//!
//! The browser only holds a random session key in a cookie; the data lives in
//! a [`SessionBackend`]. [`session_middleware`] loads the session for each
//! request, hands handlers a [`Session`] through the request extensions and
//! persists it (and sets the cookie) after the handler returns.
//!
//! ## Backends
//!
//! - [`InMemorySessionBackend`] - Keeps sessions in a map (tests, `memory` setting)
//! - [`SqliteSessionBackend`] - Stores sessions in the `sessions` table

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use accounts_core::crypto::get_random_string;
use accounts_core::database::{format_timestamp, parse_timestamp};
use accounts_core::error::{AccountsError, AccountsResult};
use accounts_core::{Database, SessionSettings};
use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use http::header::{COOKIE, SET_COOKIE};
use http::request::Parts;
use http::{HeaderMap, HeaderValue, StatusCode};
use rusqlite::OptionalExtension;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

/// Length of generated session keys.
pub const SESSION_KEY_LENGTH: usize = 32;

/// Data key marking a session that ends when the browser closes.
const EXPIRY_KEY: &str = "_session_expiry";

/// The stored state of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    /// The key carried by the session cookie.
    pub session_key: String,
    /// Arbitrary JSON values.
    pub data: HashMap<String, Value>,
    /// When the server forgets the session.
    pub expire_date: DateTime<Utc>,
    /// Whether the data changed since it was loaded.
    pub modified: bool,
}

impl SessionData {
    /// Creates an empty session with a fresh key that lives for `lifetime`.
    pub fn new(lifetime: Duration) -> Self {
        Self {
            session_key: get_random_string(SESSION_KEY_LENGTH),
            data: HashMap::new(),
            expire_date: Utc::now() + lifetime,
            modified: false,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expire_date
    }

    /// Returns `true` if the cookie should not outlive the browser.
    pub fn expires_at_browser_close(&self) -> bool {
        self.data.get(EXPIRY_KEY).and_then(Value::as_i64) == Some(0)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Persistence for session data.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Loads an unexpired session; `None` if the key is unknown or expired.
    async fn load(&self, session_key: &str) -> AccountsResult<Option<SessionData>>;

    /// Inserts or replaces a session.
    async fn save(&self, session: &SessionData) -> AccountsResult<()>;

    async fn delete(&self, session_key: &str) -> AccountsResult<()>;

    async fn exists(&self, session_key: &str) -> AccountsResult<bool>;

    /// Removes every expired session, returning how many were removed.
    async fn clear_expired(&self) -> AccountsResult<usize>;
}

/// Sessions kept in process memory.
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionBackend {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
}

impl InMemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBackend for InMemorySessionBackend {
    async fn load(&self, session_key: &str) -> AccountsResult<Option<SessionData>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_key)
            .filter(|s| !s.is_expired())
            .cloned()
            .map(|mut s| {
                s.modified = false;
                s
            }))
    }

    async fn save(&self, session: &SessionData) -> AccountsResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.session_key.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_key: &str) -> AccountsResult<()> {
        self.sessions.write().await.remove(session_key);
        Ok(())
    }

    async fn exists(&self, session_key: &str) -> AccountsResult<bool> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_key).is_some_and(|s| !s.is_expired()))
    }

    async fn clear_expired(&self) -> AccountsResult<usize> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        Ok(before - sessions.len())
    }
}

/// Sessions stored in the `sessions` table.
///
/// `session_data` holds the JSON-encoded map; `expire_date` a sortable
/// timestamp so expiry checks run in SQL.
#[derive(Debug, Clone)]
pub struct SqliteSessionBackend {
    db: Database,
}

impl SqliteSessionBackend {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionBackend for SqliteSessionBackend {
    async fn load(&self, session_key: &str) -> AccountsResult<Option<SessionData>> {
        let key = session_key.to_string();
        let now = format_timestamp(&Utc::now());
        let row = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT session_data, expire_date FROM sessions
                         WHERE session_key = ?1 AND expire_date > ?2",
                        rusqlite::params![key, now],
                        |row| {
                            let data: String = row.get(0)?;
                            let expire: String = row.get(1)?;
                            Ok((data, parse_timestamp(&expire)?))
                        },
                    )
                    .optional()?)
            })
            .await?;

        let Some((raw, expire_date)) = row else {
            return Ok(None);
        };
        let data = match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable session");
                return Ok(None);
            }
        };
        Ok(Some(SessionData {
            session_key: session_key.to_string(),
            data,
            expire_date,
            modified: false,
        }))
    }

    async fn save(&self, session: &SessionData) -> AccountsResult<()> {
        let data = serde_json::to_string(&session.data)
            .map_err(|e| AccountsError::SerializationError(format!("session data: {e}")))?;
        let key = session.session_key.clone();
        let expire = format_timestamp(&session.expire_date);
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (session_key, session_data, expire_date)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(session_key) DO UPDATE SET
                        session_data = excluded.session_data,
                        expire_date = excluded.expire_date",
                    rusqlite::params![key, data, expire],
                )?;
                Ok(())
            })
            .await
    }

    async fn delete(&self, session_key: &str) -> AccountsResult<()> {
        let key = session_key.to_string();
        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM sessions WHERE session_key = ?1", [key])?;
                Ok(())
            })
            .await
    }

    async fn exists(&self, session_key: &str) -> AccountsResult<bool> {
        let key = session_key.to_string();
        let now = format_timestamp(&Utc::now());
        self.db
            .call(move |conn| {
                Ok(conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sessions WHERE session_key = ?1 AND expire_date > ?2)",
                    rusqlite::params![key, now],
                    |row| row.get(0),
                )?)
            })
            .await
    }

    async fn clear_expired(&self) -> AccountsResult<usize> {
        let now = format_timestamp(&Utc::now());
        self.db
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM sessions WHERE expire_date <= ?1", [now])?)
            })
            .await
    }
}

#[derive(Debug)]
struct SessionState {
    data: SessionData,
    /// Keys abandoned by `cycle_key`/`flush` that must be deleted on save.
    stale_keys: Vec<String>,
    lifetime: Duration,
}

/// The current request's session.
///
/// Cheap to clone; clones share state. Handlers receive it as an extractor
/// once [`session_middleware`] is installed.
#[derive(Debug, Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    fn from_data(data: SessionData, lifetime: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                data,
                stale_keys: Vec::new(),
                lifetime,
            })),
        }
    }

    /// A fresh, empty session that lives for `lifetime`.
    pub fn new(lifetime: Duration) -> Self {
        Self::from_data(SessionData::new(lifetime), lifetime)
    }

    pub async fn key(&self) -> String {
        self.state.lock().await.data.session_key.clone()
    }

    /// Reads and decodes a value; `None` if absent or of another shape.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let state = self.state.lock().await;
        state
            .data
            .data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub async fn insert<T: Serialize + Sync>(&self, key: &str, value: &T) -> AccountsResult<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| AccountsError::SerializationError(format!("session value '{key}': {e}")))?;
        let mut state = self.state.lock().await;
        state.data.data.insert(key.to_string(), value);
        state.data.modified = true;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.state.lock().await;
        let removed = state.data.data.remove(key);
        if removed.is_some() {
            state.data.modified = true;
        }
        removed
    }

    /// Drops all data and moves to a new key.
    pub async fn flush(&self) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let old = std::mem::replace(&mut state.data, SessionData::new(state.lifetime));
        state.stale_keys.push(old.session_key);
        state.data.modified = true;
    }

    /// Keeps the data under a new key.
    pub async fn cycle_key(&self) {
        let mut state = self.state.lock().await;
        let new_key = get_random_string(SESSION_KEY_LENGTH);
        let old = std::mem::replace(&mut state.data.session_key, new_key);
        state.stale_keys.push(old);
        state.data.modified = true;
    }

    /// Makes the cookie a browser-session cookie.
    pub async fn set_expire_at_browser_close(&self) {
        let mut state = self.state.lock().await;
        state.data.data.insert(EXPIRY_KEY.to_string(), Value::from(0));
        state.data.modified = true;
    }

    pub async fn expires_at_browser_close(&self) -> bool {
        self.state.lock().await.data.expires_at_browser_close()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.data.is_empty()
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "session middleware is not installed",
        ))
    }
}

/// Backend plus cookie configuration, the state of [`session_middleware`].
#[derive(Clone)]
pub struct SessionManager {
    backend: Arc<dyn SessionBackend>,
    settings: SessionSettings,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("cookie_name", &self.settings.cookie_name)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(backend: Arc<dyn SessionBackend>, settings: SessionSettings) -> Self {
        Self { backend, settings }
    }

    pub fn backend(&self) -> &Arc<dyn SessionBackend> {
        &self.backend
    }

    fn lifetime(&self) -> Duration {
        Duration::seconds(self.settings.cookie_age)
    }

    /// Loads the session named by the request cookie, or starts a new one.
    pub async fn open(&self, headers: &HeaderMap) -> Session {
        let lifetime = self.lifetime();
        if let Some(key) = cookie_value(headers, &self.settings.cookie_name) {
            match self.backend.load(&key).await {
                Ok(Some(data)) => return Session::from_data(data, lifetime),
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "failed to load session"),
            }
        }
        Session::new(lifetime)
    }

    /// Persists `session` and writes the cookie onto `response`.
    ///
    /// `had_cookie` says whether the request carried a session cookie, so an
    /// emptied session can clear it.
    pub async fn commit(
        &self,
        session: &Session,
        had_cookie: bool,
        response: &mut Response,
    ) -> AccountsResult<()> {
        let mut guard = session.state.lock().await;
        let state = &mut *guard;
        for key in std::mem::take(&mut state.stale_keys) {
            self.backend.delete(&key).await?;
        }
        if !state.data.modified {
            return Ok(());
        }

        if state.data.is_empty() {
            self.backend.delete(&state.data.session_key).await?;
            if had_cookie {
                set_cookie(response, &self.expired_cookie());
            }
            return Ok(());
        }

        state.data.expire_date = Utc::now() + state.lifetime;
        self.backend.save(&state.data).await?;
        state.data.modified = false;

        let max_age = (!state.data.expires_at_browser_close()).then_some(self.settings.cookie_age);
        let cookie = self.build_set_cookie(&state.data.session_key, max_age);
        set_cookie(response, &cookie);
        Ok(())
    }

    fn build_set_cookie(&self, session_key: &str, max_age: Option<i64>) -> String {
        let mut cookie = format!("{}={session_key}", self.settings.cookie_name);
        if let Some(age) = max_age {
            let _ = write!(cookie, "; Max-Age={age}");
        }
        cookie.push_str("; Path=/; HttpOnly; SameSite=Lax");
        if self.settings.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    fn expired_cookie(&self) -> String {
        self.build_set_cookie("", Some(0))
    }
}

fn set_cookie(response: &mut Response, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}

/// Finds cookie `name` in the request's `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v.to_string())
}

/// Loads the session before the handler runs and saves it afterwards.
pub async fn session_middleware(
    State(manager): State<SessionManager>,
    mut request: Request,
    next: Next,
) -> Response {
    let had_cookie = cookie_value(request.headers(), &manager.settings.cookie_name).is_some();
    let session = manager.open(request.headers()).await;
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;
    if let Err(e) = manager.commit(&session, had_cookie, &mut response).await {
        tracing::error!(error = %e, "failed to save session");
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(backend: Arc<dyn SessionBackend>) -> SessionManager {
        SessionManager::new(backend, SessionSettings::default())
    }

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_cookie_value_parsing() {
        let headers = headers_with_cookie("theme=dark; sessionid=abc123; other=1");
        assert_eq!(cookie_value(&headers, "sessionid").as_deref(), Some("abc123"));
        assert_eq!(cookie_value(&headers, "missing"), None);
        assert_eq!(cookie_value(&headers_with_cookie("sessionid="), "sessionid"), None);
    }

    #[tokio::test]
    async fn test_in_memory_backend_expiry() {
        let backend = InMemorySessionBackend::new();
        let mut live = SessionData::new(Duration::hours(1));
        live.data.insert("k".into(), Value::from(1));
        let mut dead = SessionData::new(Duration::hours(1));
        dead.expire_date = Utc::now() - Duration::seconds(1);
        backend.save(&live).await.unwrap();
        backend.save(&dead).await.unwrap();

        assert!(backend.exists(&live.session_key).await.unwrap());
        assert!(backend.load(&dead.session_key).await.unwrap().is_none());
        assert_eq!(backend.clear_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_backend_round_trip() {
        let db = Database::memory().unwrap();
        db.migrate().await.unwrap();
        let backend = SqliteSessionBackend::new(db);

        let mut session = SessionData::new(Duration::hours(1));
        session.data.insert("_auth_user_id".into(), Value::from(7));
        backend.save(&session).await.unwrap();

        let loaded = backend.load(&session.session_key).await.unwrap().unwrap();
        assert_eq!(loaded.data.get("_auth_user_id"), Some(&Value::from(7)));
        assert!(!loaded.modified);

        session.data.insert("extra".into(), Value::from("x"));
        backend.save(&session).await.unwrap();
        let loaded = backend.load(&session.session_key).await.unwrap().unwrap();
        assert_eq!(loaded.data.len(), 2);

        backend.delete(&session.session_key).await.unwrap();
        assert!(!backend.exists(&session.session_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_backend_clears_expired() {
        let db = Database::memory().unwrap();
        db.migrate().await.unwrap();
        let backend = SqliteSessionBackend::new(db);

        let mut old = SessionData::new(Duration::hours(1));
        old.data.insert("k".into(), Value::from(1));
        old.expire_date = Utc::now() - Duration::minutes(5);
        backend.save(&old).await.unwrap();
        assert!(backend.load(&old.session_key).await.unwrap().is_none());
        assert_eq!(backend.clear_expired().await.unwrap(), 1);
        assert_eq!(backend.clear_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_untouched_session_sets_no_cookie() {
        let backend = Arc::new(InMemorySessionBackend::new());
        let manager = manager(backend);
        let session = manager.open(&HeaderMap::new()).await;
        let mut response = Response::default();
        manager.commit(&session, false, &mut response).await.unwrap();
        assert!(set_cookies(&response).is_empty());
    }

    #[tokio::test]
    async fn test_commit_sets_cookie_and_reloads() {
        let backend = Arc::new(InMemorySessionBackend::new());
        let manager = manager(backend.clone());
        let session = manager.open(&HeaderMap::new()).await;
        session.insert("color", &"blue").await.unwrap();

        let mut response = Response::default();
        manager.commit(&session, false, &mut response).await.unwrap();
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        let cookie = &cookies[0];
        assert!(cookie.contains("Max-Age=1209600"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(!cookie.contains("Secure"));

        let key = session.key().await;
        let reopened = manager
            .open(&headers_with_cookie(&format!("sessionid={key}")))
            .await;
        assert_eq!(reopened.get::<String>("color").await.as_deref(), Some("blue"));
    }

    #[tokio::test]
    async fn test_browser_session_cookie_has_no_max_age() {
        let manager = manager(Arc::new(InMemorySessionBackend::new()));
        let session = manager.open(&HeaderMap::new()).await;
        session.insert("k", &1).await.unwrap();
        session.set_expire_at_browser_close().await;

        let mut response = Response::default();
        manager.commit(&session, false, &mut response).await.unwrap();
        assert!(!set_cookies(&response)[0].contains("Max-Age"));
    }

    #[tokio::test]
    async fn test_cycle_key_moves_data_and_drops_old_key() {
        let backend = Arc::new(InMemorySessionBackend::new());
        let manager = manager(backend.clone());
        let session = manager.open(&HeaderMap::new()).await;
        session.insert("k", &1).await.unwrap();
        manager
            .commit(&session, false, &mut Response::default())
            .await
            .unwrap();
        let old_key = session.key().await;

        session.cycle_key().await;
        manager
            .commit(&session, true, &mut Response::default())
            .await
            .unwrap();
        let new_key = session.key().await;

        assert_ne!(old_key, new_key);
        assert!(!backend.exists(&old_key).await.unwrap());
        assert!(backend.exists(&new_key).await.unwrap());
        assert_eq!(session.get::<i64>("k").await, Some(1));
    }

    #[tokio::test]
    async fn test_flush_clears_cookie() {
        let backend = Arc::new(InMemorySessionBackend::new());
        let manager = manager(backend.clone());
        let session = manager.open(&HeaderMap::new()).await;
        session.insert("k", &1).await.unwrap();
        manager
            .commit(&session, false, &mut Response::default())
            .await
            .unwrap();
        let old_key = session.key().await;

        session.flush().await;
        let mut response = Response::default();
        manager.commit(&session, true, &mut response).await.unwrap();

        assert!(!backend.exists(&old_key).await.unwrap());
        assert!(set_cookies(&response)[0].starts_with("sessionid=; Max-Age=0"));
    }

    #[test]
    fn test_secure_cookie() {
        let settings = SessionSettings {
            cookie_secure: true,
            ..SessionSettings::default()
        };
        let manager = SessionManager::new(Arc::new(InMemorySessionBackend::new()), settings);
        assert!(manager.build_set_cookie("k", Some(10)).ends_with("; Secure"));
    }
}
