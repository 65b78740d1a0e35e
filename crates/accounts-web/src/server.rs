//! Application assembly.
//!
//! [`AccountsApp`] wires settings, storage, sessions, email and templates into
//! an axum [`Router`] and can serve it directly.
//!
//! # Examples
//!
//! ```no_run
//! use accounts_core::Settings;
//! use accounts_web::AccountsApp;
//!
//! # async fn example() -> Result<(), accounts_core::AccountsError> {
//! let app = AccountsApp::from_settings(Settings::default()).await?;
//! app.run("127.0.0.1:8000").await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use accounts_auth::{PasswordResetTokenGenerator, SqliteUserStore, UserStore};
use accounts_core::error::{AccountsError, AccountsResult};
use accounts_core::{Database, Settings};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::mail::{backend_from_settings, EmailBackend};
use crate::session::{
    session_middleware, InMemorySessionBackend, SessionBackend, SessionManager,
    SqliteSessionBackend,
};
use crate::templates::Templates;
use crate::views;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn UserStore>,
    pub sessions: SessionManager,
    pub mailer: Arc<dyn EmailBackend>,
    pub templates: Arc<Templates>,
    pub tokens: Arc<PasswordResetTokenGenerator>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("site_domain", &self.settings.site_domain)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

/// Builder for the accounts web application.
pub struct AccountsApp {
    settings: Settings,
    store: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionBackend>,
    mailer: Arc<dyn EmailBackend>,
    templates: Arc<Templates>,
}

impl AccountsApp {
    /// Opens and migrates the database and picks the configured backends.
    pub async fn from_settings(settings: Settings) -> AccountsResult<Self> {
        let db = Database::open(&settings.database_path)?;
        let applied = db.migrate().await?;
        if !applied.is_empty() {
            tracing::info!(count = applied.len(), "database migrated");
        }

        let sessions: Arc<dyn SessionBackend> = match settings.session.backend.as_str() {
            "memory" => Arc::new(InMemorySessionBackend::new()),
            "db" => Arc::new(SqliteSessionBackend::new(db.clone())),
            other => {
                return Err(AccountsError::ConfigurationError(format!(
                    "unknown session backend '{other}'"
                )))
            }
        };
        let mailer = backend_from_settings(&settings.email)?;
        let templates = Arc::new(Templates::load(settings.template_dir.as_deref())?);

        Ok(Self {
            store: Arc::new(SqliteUserStore::new(db)),
            sessions,
            mailer,
            templates,
            settings,
        })
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn UserStore>) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionBackend>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Replaces the email backend, e.g. with an [`crate::mail::InMemoryBackend`] in tests.
    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn EmailBackend>) -> Self {
        self.mailer = mailer;
        self
    }

    #[must_use]
    pub fn with_templates(mut self, templates: Templates) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Builds the state shared by the handlers.
    pub fn state(&self) -> AppState {
        let tokens = PasswordResetTokenGenerator::new(
            self.settings.signing_key(),
            chrono::Duration::seconds(self.settings.accounts.password_reset_timeout_secs),
        );
        AppState {
            settings: Arc::new(self.settings.clone()),
            store: Arc::clone(&self.store),
            sessions: SessionManager::new(Arc::clone(&self.sessions), self.settings.session.clone()),
            mailer: Arc::clone(&self.mailer),
            templates: Arc::clone(&self.templates),
            tokens: Arc::new(tokens),
        }
    }

    /// Converts the application into an axum router.
    pub fn into_router(self) -> Router {
        router(self.state())
    }

    /// Serves the application on `addr` until the process is stopped.
    pub async fn run(self, addr: &str) -> AccountsResult<()> {
        let debug = self.settings.debug;
        let router = self.into_router();
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            AccountsError::ConfigurationError(format!("Failed to bind to {addr}: {e}"))
        })?;

        if debug {
            tracing::info!("Starting development server at http://{addr}/");
        } else {
            tracing::info!(%addr, "listening");
        }

        axum::serve(listener, router)
            .await
            .map_err(|e| AccountsError::InternalServerError(format!("Server error: {e}")))?;
        Ok(())
    }
}

impl std::fmt::Debug for AccountsApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountsApp")
            .field("database_path", &self.settings.database_path)
            .field("debug", &self.settings.debug)
            .finish_non_exhaustive()
    }
}

/// The URL map.
pub fn router(state: AppState) -> Router {
    let sessions = state.sessions.clone();
    Router::new()
        .route("/", get(views::index))
        .route(
            "/accounts/login/",
            get(views::auth::login_page).post(views::auth::login_submit),
        )
        .route(
            "/accounts/logout/",
            get(views::auth::logout).post(views::auth::logout),
        )
        .route(
            "/accounts/register/",
            get(views::auth::register_page).post(views::auth::register_submit),
        )
        .route(
            "/accounts/activate/resend/",
            get(views::auth::resend_activation_page).post(views::auth::resend_activation_submit),
        )
        .route("/accounts/activate/{code}/", get(views::auth::activate))
        .route(
            "/accounts/password/reset/",
            get(views::password::reset_page).post(views::password::reset_submit),
        )
        .route(
            "/accounts/password/reset/done/",
            get(views::password::reset_done),
        )
        .route(
            "/accounts/reset/{uidb64}/{token}/",
            get(views::password::reset_confirm_page).post(views::password::reset_confirm_submit),
        )
        .route("/accounts/reset/done/", get(views::password::reset_complete))
        .route(
            "/accounts/password/change/",
            get(views::password::change_page).post(views::password::change_submit),
        )
        .route(
            "/accounts/password/change/done/",
            get(views::password::change_done),
        )
        .route(
            "/accounts/recover/username/",
            get(views::profile::remind_username_page).post(views::profile::remind_username_submit),
        )
        .route(
            "/accounts/change/profile/",
            get(views::profile::change_profile_page).post(views::profile::change_profile_submit),
        )
        .route(
            "/accounts/change/email/",
            get(views::profile::change_email_page).post(views::profile::change_email_submit),
        )
        .route(
            "/accounts/change/email/{code}/",
            get(views::profile::change_email_activate),
        )
        .fallback(views::not_found)
        .layer(axum::middleware::from_fn_with_state(sessions, session_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
