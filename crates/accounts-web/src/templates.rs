//! Page and email templates.
//!
//! The built-in Bootstrap templates are compiled into the binary. A
//! `template_dir` in settings can override any of them by name: a file at
//! `{template_dir}/accounts/login.html` replaces the built-in login page.

use std::path::Path;

use accounts_core::error::{AccountsError, AccountsResult};
use tera::{Context, Tera};

const BUILTIN: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("macros.html", include_str!("../templates/macros.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("accounts/login.html", include_str!("../templates/accounts/login.html")),
    ("accounts/logout.html", include_str!("../templates/accounts/logout.html")),
    ("accounts/register.html", include_str!("../templates/accounts/register.html")),
    (
        "accounts/resend_activation_code.html",
        include_str!("../templates/accounts/resend_activation_code.html"),
    ),
    (
        "accounts/password_reset.html",
        include_str!("../templates/accounts/password_reset.html"),
    ),
    (
        "accounts/password_reset_done.html",
        include_str!("../templates/accounts/password_reset_done.html"),
    ),
    (
        "accounts/password_reset_confirm.html",
        include_str!("../templates/accounts/password_reset_confirm.html"),
    ),
    (
        "accounts/password_reset_complete.html",
        include_str!("../templates/accounts/password_reset_complete.html"),
    ),
    (
        "accounts/password_change.html",
        include_str!("../templates/accounts/password_change.html"),
    ),
    (
        "accounts/password_change_done.html",
        include_str!("../templates/accounts/password_change_done.html"),
    ),
    (
        "accounts/remind_username.html",
        include_str!("../templates/accounts/remind_username.html"),
    ),
    (
        "accounts/profile/change_profile.html",
        include_str!("../templates/accounts/profile/change_profile.html"),
    ),
    (
        "accounts/profile/change_email.html",
        include_str!("../templates/accounts/profile/change_email.html"),
    ),
    (
        "email/activation_profile.html",
        include_str!("../templates/email/activation_profile.html"),
    ),
    (
        "email/activation_change_email.html",
        include_str!("../templates/email/activation_change_email.html"),
    ),
    (
        "email/password_reset.html",
        include_str!("../templates/email/password_reset.html"),
    ),
    (
        "email/forgotten_username.html",
        include_str!("../templates/email/forgotten_username.html"),
    ),
];

/// Standalone error pages served without going through Tera.
pub const NOT_FOUND_PAGE: &str = include_str!("../templates/errors/404.html");
pub const SERVER_ERROR_PAGE: &str = include_str!("../templates/errors/500.html");

/// The template engine.
#[derive(Debug)]
pub struct Templates {
    tera: Tera,
}

impl Templates {
    /// Loads the built-in templates only.
    pub fn builtin() -> AccountsResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(BUILTIN.iter().copied())
            .map_err(|e| template_error(&e))?;
        Ok(Self { tera })
    }

    /// Loads `*.html` files under `dir`, falling back to the built-ins for
    /// names the directory does not provide.
    pub fn with_overrides(dir: &Path) -> AccountsResult<Self> {
        if !dir.is_dir() {
            return Err(AccountsError::ConfigurationError(format!(
                "template_dir '{}' is not a directory",
                dir.display()
            )));
        }
        let glob = format!("{}/**/*.html", dir.display());
        // Parsed without inheritance: overrides may extend built-in layouts.
        let mut tera = Tera::parse(&glob).map_err(|e| template_error(&e))?;
        let overridden = tera.get_template_names().count();
        // `extend` keeps templates already present, so the directory wins.
        tera.extend(&Self::builtin()?.tera)
            .map_err(|e| template_error(&e))?;
        tera.build_inheritance_chains()
            .map_err(|e| template_error(&e))?;
        tracing::info!(dir = %dir.display(), overridden, "loaded template overrides");
        Ok(Self { tera })
    }

    /// Picks [`Templates::with_overrides`] or [`Templates::builtin`].
    pub fn load(dir: Option<&Path>) -> AccountsResult<Self> {
        dir.map_or_else(Self::builtin, Self::with_overrides)
    }

    pub fn render(&self, name: &str, context: &Context) -> AccountsResult<String> {
        self.tera
            .render(name, context)
            .map_err(|e| template_error(&e))
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }
}

/// Flattens Tera's nested error chain into one message.
fn template_error(err: &tera::Error) -> AccountsError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    AccountsError::TemplateError(message)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_builtin_templates_load() {
        let templates = Templates::builtin().unwrap();
        for (name, _) in BUILTIN {
            assert!(templates.has_template(name), "{name}");
        }
    }

    #[test]
    fn test_render_form_page() {
        let templates = Templates::builtin().unwrap();
        let mut context = Context::new();
        context.insert("site_name", "Accounts");
        context.insert("user", &Option::<()>::None);
        context.insert("messages", &Vec::<()>::new());
        context.insert("enable_user_activation", &true);
        context.insert("next", "");
        context.insert(
            "form",
            &json!({
                "fields": [{
                    "name": "username", "label": "Username", "input_type": "text",
                    "value": "<bob>", "checked": false, "errors": ["Bad."],
                    "help_text": "", "required": true, "autofocus": true, "placeholder": ""
                }],
                "non_field_errors": ["Nope."],
                "is_bound": true,
                "has_errors": true,
            }),
        );
        let html = templates.render("accounts/login.html", &context).unwrap();
        assert!(html.contains("name=\"username\""));
        assert!(html.contains("&lt;bob&gt;"));
        assert!(html.contains("Bad."));
        assert!(html.contains("Nope."));
        assert!(html.contains("/accounts/activate/resend/"));
    }

    #[test]
    fn test_email_link_not_escaped() {
        let templates = Templates::builtin().unwrap();
        let mut context = Context::new();
        context.insert("site_name", "Accounts");
        context.insert("link", "http://localhost:8000/accounts/activate/abc/");
        let html = templates
            .render("email/activation_profile.html", &context)
            .unwrap();
        assert!(html.contains("href=\"http://localhost:8000/accounts/activate/abc/\""));
    }

    #[test]
    fn test_directory_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "custom index for {{ site_name }}").unwrap();

        let templates = Templates::load(Some(dir.path())).unwrap();
        let mut context = Context::new();
        context.insert("site_name", "Demo");
        assert_eq!(
            templates.render("index.html", &context).unwrap(),
            "custom index for Demo"
        );
        assert!(templates.has_template("accounts/login.html"));
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let templates = Templates::builtin().unwrap();
        let err = templates.render("nope.html", &Context::new()).unwrap_err();
        assert!(matches!(err, AccountsError::TemplateError(_)));
    }
}
