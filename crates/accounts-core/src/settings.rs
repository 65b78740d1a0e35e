//! Application settings.
//!
//! [`Settings`] holds every knob the accounts application reads: the secret
//! key, database location, session cookie, email delivery and the account
//! feature flags in [`AccountSettings`]. All structs implement `Default`
//! with development-friendly values; see [`crate::settings_loader`] for
//! loading from TOML and the environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Account behavior flags.
///
/// These switch between the sign-in, sign-up, activation and password reset
/// variants the application supports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountSettings {
    /// New accounts stay inactive until the emailed activation link is opened.
    pub enable_user_activation: bool,
    /// Hide the username field; accounts get a generated `user_{id}` name.
    pub disable_username: bool,
    /// Sign in with email + password.
    pub login_via_email: bool,
    /// Sign in with either email or username + password.
    pub login_via_email_or_username: bool,
    /// Show a "remember me" checkbox on the sign-in form.
    pub use_remember_me: bool,
    /// Request a password reset by email or username instead of email only.
    pub password_reset_via_email_or_username: bool,
    /// Require confirming a changed email address through an emailed link.
    pub email_activation_after_changing: bool,
    /// Where to go after signing in when no safe `next` is given.
    pub login_redirect_url: String,
    /// Hours before another activation code may be requested.
    pub activation_resend_hours: i64,
    /// Lifetime of password reset links, in seconds.
    pub password_reset_timeout_secs: i64,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            enable_user_activation: true,
            disable_username: false,
            login_via_email: false,
            login_via_email_or_username: false,
            use_remember_me: true,
            password_reset_via_email_or_username: false,
            email_activation_after_changing: true,
            login_redirect_url: "/".to_string(),
            activation_resend_hours: 24,
            password_reset_timeout_secs: 60 * 60 * 24 * 3,
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSettings {
    /// Storage backend: `"db"` or `"memory"`.
    pub backend: String,
    /// The cookie carrying the session key.
    pub cookie_name: String,
    /// Session lifetime in seconds (two weeks by default).
    pub cookie_age: i64,
    /// Mark the cookie `Secure`.
    pub cookie_secure: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            backend: "db".to_string(),
            cookie_name: "sessionid".to_string(),
            cookie_age: 60 * 60 * 24 * 7 * 2,
            cookie_secure: false,
        }
    }
}

/// Outbound email configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailSettings {
    /// Delivery backend: `"console"`, `"file"`, `"memory"` or `"api"`.
    pub backend: String,
    /// Sender address for all outgoing mail.
    pub default_from_email: String,
    /// Directory used by the file backend.
    pub file_path: PathBuf,
    /// Endpoint of the HTTP email API.
    pub api_url: String,
    /// Bearer key for the HTTP email API.
    pub api_key: String,
    /// Request timeout for the HTTP email API, in seconds.
    pub timeout_secs: u64,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            backend: "console".to_string(),
            default_from_email: "webmaster@localhost".to_string(),
            file_path: PathBuf::from("sent_emails"),
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Top-level application settings.
///
/// # Examples
///
/// ```
/// use accounts_core::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert!(settings.accounts.enable_user_activation);
/// assert_eq!(settings.session.cookie_name, "sessionid");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Development mode: pretty logs and relaxed checks.
    pub debug: bool,
    /// Key for tokens and session hashes. Must be set outside debug mode.
    pub secret_key: String,
    /// Hosts accepted as redirect targets.
    pub allowed_hosts: Vec<String>,
    /// `tracing` filter directive, e.g. `"info"` or `"accounts_web=debug"`.
    pub log_level: String,
    /// SQLite database file, or `":memory:"`.
    pub database_path: PathBuf,
    /// Site name shown in page titles and emails.
    pub site_name: String,
    /// Public host (and port) used to build links in emails.
    pub site_domain: String,
    /// Build email links with `https`.
    pub use_https: bool,
    /// Optional directory of templates overriding the built-in ones.
    pub template_dir: Option<PathBuf>,
    /// Account behavior flags.
    pub accounts: AccountSettings,
    /// Session cookie configuration.
    pub session: SessionSettings,
    /// Outbound email configuration.
    pub email: EmailSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            secret_key: String::new(),
            allowed_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            log_level: "info".to_string(),
            database_path: PathBuf::from("db.sqlite3"),
            site_name: "Accounts".to_string(),
            site_domain: "localhost:8000".to_string(),
            use_https: false,
            template_dir: None,
            accounts: AccountSettings::default(),
            session: SessionSettings::default(),
            email: EmailSettings::default(),
        }
    }
}

impl Settings {
    /// Returns the URL scheme used for links in emails.
    pub const fn scheme(&self) -> &'static str {
        if self.use_https {
            "https"
        } else {
            "http"
        }
    }

    /// Returns the absolute URL for `path` on this site.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}://{}{path}", self.scheme(), self.site_domain)
    }

    /// Returns the secret key, falling back to a fixed development key in debug mode.
    ///
    /// [`Settings::check`] reports an empty key outside debug mode.
    pub fn signing_key(&self) -> &str {
        if self.secret_key.is_empty() && self.debug {
            "insecure-development-key"
        } else {
            &self.secret_key
        }
    }

    /// Validates the configuration and returns a list of problems.
    ///
    /// An empty list means the settings are usable.
    pub fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.secret_key.is_empty() && !self.debug {
            problems.push("secret_key must be set when debug is off".to_string());
        }
        if !self.debug && self.secret_key.len() < 32 && !self.secret_key.is_empty() {
            problems.push("secret_key should be at least 32 characters long".to_string());
        }
        if self.accounts.login_via_email && self.accounts.login_via_email_or_username {
            problems.push(
                "login_via_email and login_via_email_or_username are mutually exclusive"
                    .to_string(),
            );
        }
        if self.accounts.disable_username && self.accounts.login_via_email_or_username {
            problems.push(
                "login_via_email_or_username makes no sense with disable_username".to_string(),
            );
        }
        if self.accounts.disable_username
            && !self.accounts.login_via_email
            && !self.accounts.login_via_email_or_username
        {
            problems.push(
                "disable_username requires login_via_email so users can sign in".to_string(),
            );
        }
        if self.accounts.activation_resend_hours < 0 {
            problems.push("activation_resend_hours must not be negative".to_string());
        }
        if self.accounts.password_reset_timeout_secs <= 0 {
            problems.push("password_reset_timeout_secs must be positive".to_string());
        }
        if !self.accounts.login_redirect_url.starts_with('/') {
            problems.push("login_redirect_url must be a local path".to_string());
        }
        match self.session.backend.as_str() {
            "db" | "memory" => {}
            other => problems.push(format!("unknown session backend '{other}'")),
        }
        match self.email.backend.as_str() {
            "console" | "file" | "memory" => {}
            "api" => {
                if self.email.api_key.is_empty() {
                    problems.push("email.api_key is required by the api email backend".to_string());
                }
            }
            other => problems.push(format!("unknown email backend '{other}'")),
        }

        problems
    }
}
