//! Loading [`Settings`] from TOML files and the environment.
//!
//! ## Loading Order
//!
//! 1. Start with [`Settings::default`].
//! 2. Deep-merge a TOML document over the defaults, so a file only needs the
//!    keys it changes.
//! 3. Apply `ACCOUNTS_*` environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `ACCOUNTS_SECRET_KEY` | `secret_key` |
//! | `ACCOUNTS_DEBUG` | `debug` |
//! | `ACCOUNTS_ALLOWED_HOSTS` | `allowed_hosts` (comma-separated) |
//! | `ACCOUNTS_LOG_LEVEL` | `log_level` |
//! | `ACCOUNTS_DATABASE_PATH` | `database_path` |
//! | `ACCOUNTS_SITE_DOMAIN` | `site_domain` |
//! | `ACCOUNTS_EMAIL_BACKEND` | `email.backend` |
//! | `ACCOUNTS_DEFAULT_FROM_EMAIL` | `email.default_from_email` |
//! | `ACCOUNTS_EMAIL_API_KEY` | `email.api_key` |

use std::path::{Path, PathBuf};

use crate::error::AccountsError;
use crate::settings::Settings;

/// Loads settings from a TOML string merged over the defaults.
///
/// # Examples
///
/// ```
/// use accounts_core::settings_loader::from_toml_str;
///
/// let settings = from_toml_str("[accounts]\nlogin_via_email = true").unwrap();
/// assert!(settings.accounts.login_via_email);
/// assert!(settings.accounts.enable_user_activation);
/// ```
pub fn from_toml_str(toml_str: &str) -> Result<Settings, AccountsError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| AccountsError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    let defaults = serde_json::to_value(Settings::default()).map_err(|e| {
        AccountsError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(defaults, toml_to_json(toml_value));
    serde_json::from_value(merged).map_err(|e| {
        AccountsError::ConfigurationError(format!("Invalid settings: {e}"))
    })
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, AccountsError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        AccountsError::ConfigurationError(format!(
            "Failed to read settings file '{}': {e}",
            path.display()
        ))
    })?;
    from_toml_str(&content)
}

/// Loads settings the way the `accounts` binary does.
///
/// Reads `path` when given, otherwise `accounts.toml` in the working
/// directory if it exists, otherwise the defaults. Environment overrides are
/// applied last.
pub fn load(path: Option<&Path>) -> Result<Settings, AccountsError> {
    let mut settings = match path {
        Some(path) => from_toml_file(path)?,
        None => {
            let fallback = Path::new("accounts.toml");
            if fallback.exists() {
                from_toml_file(fallback)?
            } else {
                Settings::default()
            }
        }
    };
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Applies `ACCOUNTS_*` environment variables to `settings`.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Applies overrides read through `lookup`, which maps a variable name to its value.
pub fn apply_overrides_from<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("ACCOUNTS_SECRET_KEY") {
        settings.secret_key = val;
    }

    if let Some(val) = lookup("ACCOUNTS_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Some(val) = lookup("ACCOUNTS_ALLOWED_HOSTS") {
        settings.allowed_hosts = val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Some(val) = lookup("ACCOUNTS_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("ACCOUNTS_DATABASE_PATH") {
        settings.database_path = PathBuf::from(val);
    }

    if let Some(val) = lookup("ACCOUNTS_SITE_DOMAIN") {
        settings.site_domain = val;
    }

    if let Some(val) = lookup("ACCOUNTS_EMAIL_BACKEND") {
        settings.email.backend = val;
    }

    if let Some(val) = lookup("ACCOUNTS_DEFAULT_FROM_EMAIL") {
        settings.email.default_from_email = val;
    }

    if let Some(val) = lookup("ACCOUNTS_EMAIL_API_KEY") {
        settings.email.api_key = val;
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep-merges `overlay` into `base`; scalar and array values in `overlay` win.
fn merge_json(base: serde_json::Value, overlay: serde_json::Value) -> serde_json::Value {
    match (base, overlay) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => value,
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}
