//! Account forms.
//!
//! - [`SignInForm`] - sign in by username, email, or either
//! - [`SignUpForm`] - registration
//! - [`ResendActivationCodeForm`] - request a fresh activation link
//! - [`PasswordResetForm`] - request a password reset link
//! - [`SetPasswordForm`] - choose a new password from a reset link
//! - [`PasswordChangeForm`] - change password while signed in
//! - [`ChangeProfileForm`] - edit first and last name
//! - [`ChangeEmailForm`] - change email address
//! - [`RemindUsernameForm`] - email a forgotten username
//!
//! Each form wraps a [`BaseForm`] for field-level cleaning and adds its own
//! cross-field and database checks in `validate`. Views bind the submitted
//! data, call `validate`, and re-render the form (via the [`Form`] trait)
//! when it returns `false`.

use accounts_core::error::AccountsResult;
use accounts_core::AccountSettings;
use accounts_forms::{BaseForm, Form, FormFieldDef, FormFieldType, WidgetType};
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::backends::{authenticate, hash_for_missing_user, AuthOutcome, LoginLookup};
use crate::hashers::{password_validators_help_text, validate_password, UserAttributes};
use crate::store::UserStore;
use crate::user::{NewUser, User};

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const NAME_MAX_LENGTH: usize = 50;
pub const EMAIL_MAX_LENGTH: usize = 255;

const INACTIVE: &str = "This account is inactive.";
const INCORRECT_DATA: &str = "You entered incorrect data.";
const PASSWORD_MISMATCH: &str = "The two password fields didn’t match.";

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+\-]+$").expect("valid regex"));

macro_rules! impl_form {
    ($($form:ty),+ $(,)?) => {
        $(
            impl Form for $form {
                fn base(&self) -> &BaseForm {
                    &self.inner
                }

                fn base_mut(&mut self) -> &mut BaseForm {
                    &mut self.inner
                }
            }
        )+
    };
}

impl_form!(
    SignInForm,
    SignUpForm,
    ResendActivationCodeForm,
    PasswordResetForm,
    SetPasswordForm,
    PasswordChangeForm,
    ChangeProfileForm,
    ChangeEmailForm,
    RemindUsernameForm,
);

fn email_field(name: &str) -> FormFieldDef {
    FormFieldDef::new(
        name,
        FormFieldType::Email {
            max_length: Some(EMAIL_MAX_LENGTH),
        },
    )
    .label("Email")
}

fn email_or_username_field() -> FormFieldDef {
    FormFieldDef::new("email_or_username", FormFieldType::text_max(EMAIL_MAX_LENGTH))
        .label("Email or Username")
        .autofocus()
}

fn password_field(name: &str, label: &str) -> FormFieldDef {
    FormFieldDef::new(name, FormFieldType::password())
        .label(label)
        .widget(WidgetType::PasswordInput)
}

fn name_fields() -> [FormFieldDef; 2] {
    [
        FormFieldDef::new("first_name", FormFieldType::text_max(NAME_MAX_LENGTH))
            .label("First Name")
            .help_text("Optional.")
            .required(false),
        FormFieldDef::new("last_name", FormFieldType::text_max(NAME_MAX_LENGTH))
            .label("Last Name")
            .help_text("Optional.")
            .required(false),
    ]
}

/// Checks that two new-password inputs match and pass the validators.
///
/// Errors go on `second`.
fn check_new_password(form: &mut BaseForm, first: &str, second: &str, user: &UserAttributes) {
    let (Some(p1), Some(p2)) = (form.cleaned_str(first), form.cleaned_str(second)) else {
        return;
    };
    if p1 != p2 {
        form.add_error(Some(second), PASSWORD_MISMATCH);
        return;
    }
    let password = p2.to_string();
    if let Err(messages) = validate_password(&password, user) {
        for message in messages {
            form.add_error(Some(second), message);
        }
    }
}

// ── SignInForm ───────────────────────────────────────────────────────

/// Sign-in by username, email, or either, depending on settings.
pub struct SignInForm {
    inner: BaseForm,
    lookup: LoginLookup,
    user: Option<User>,
}

impl SignInForm {
    pub fn new(settings: &AccountSettings) -> Self {
        let lookup = LoginLookup::from_settings(settings);
        let identifier = match lookup {
            LoginLookup::Username => {
                FormFieldDef::new("username", FormFieldType::text_max(USERNAME_MAX_LENGTH))
                    .autofocus()
            }
            LoginLookup::Email => email_field("email").placeholder("@").autofocus(),
            LoginLookup::EmailOrUsername => email_or_username_field(),
        };
        let mut fields = vec![identifier, password_field("password", "Password")];
        if settings.use_remember_me {
            fields.push(FormFieldDef::new("remember_me", FormFieldType::Boolean).label("Remember me"));
        }
        Self {
            inner: BaseForm::new(fields),
            lookup,
            user: None,
        }
    }

    pub const fn lookup(&self) -> LoginLookup {
        self.lookup
    }

    /// Checks the credentials. On success the user is available via [`SignInForm::user`].
    pub async fn validate(&mut self, store: &dyn UserStore) -> AccountsResult<bool> {
        self.user = None;
        if !self.inner.full_clean() {
            return Ok(false);
        }
        let field = self.lookup.field_name();
        let identifier = self.inner.cleaned_or_empty(field).to_string();
        let password = self.inner.cleaned_or_empty("password").to_string();

        if self.lookup == LoginLookup::Username {
            match authenticate(store, self.lookup, &identifier, &password).await? {
                AuthOutcome::Authenticated(user) => self.user = Some(user),
                AuthOutcome::Inactive(_) => self.inner.add_error(None, INACTIVE),
                AuthOutcome::InvalidCredentials => self.inner.add_error(
                    None,
                    "Please enter a correct username and password. Note that both fields may \
                     be case-sensitive.",
                ),
            }
            return Ok(self.inner.is_valid());
        }

        let invalid_login = if self.lookup == LoginLookup::Email {
            "Please enter a correct email and password. Note that both fields may be \
             case-sensitive."
        } else {
            "Please enter a correct email or username and password. Note that both fields \
             may be case-sensitive."
        };

        match self.lookup.find_user(store, &identifier).await? {
            Some(user) => {
                if !user.is_active {
                    self.inner.add_error(Some(field), INACTIVE);
                }
                if !user.check_password(&password).await? {
                    self.inner.add_error(Some(field), invalid_login);
                }
                if self.inner.is_valid() {
                    self.user = Some(user);
                }
            }
            None => {
                hash_for_missing_user(&password).await?;
                self.inner.add_error(Some(field), invalid_login);
            }
        }
        Ok(self.inner.is_valid())
    }

    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn into_user(self) -> Option<User> {
        self.user
    }

    /// `true` when the session should outlive the browser.
    ///
    /// Without a remember-me checkbox every session is persistent.
    pub fn remember_me(&self) -> bool {
        !self.inner.has_field("remember_me") || self.inner.cleaned_bool("remember_me")
    }
}

// ── SignUpForm ───────────────────────────────────────────────────────

/// Registration.
pub struct SignUpForm {
    inner: BaseForm,
    disable_username: bool,
}

impl SignUpForm {
    pub fn new(settings: &AccountSettings) -> Self {
        let mut fields = Vec::new();
        if !settings.disable_username {
            fields.push(
                FormFieldDef::new("username", FormFieldType::text_max(USERNAME_MAX_LENGTH))
                    .help_text(
                        "Required. 150 characters or fewer. Letters, digits and @/./+/-/_ only.",
                    )
                    .autofocus(),
            );
        }
        let [first_name, last_name] = name_fields();
        fields.push(if settings.disable_username {
            first_name.autofocus()
        } else {
            first_name
        });
        fields.push(last_name);
        fields.push(
            email_field("email")
                .help_text("Required. Type a valid email address.")
                .placeholder("@"),
        );
        fields.push(
            password_field("password1", "Password")
                .help_text(password_validators_help_text().join(" ")),
        );
        fields.push(
            password_field("password2", "Password confirmation")
                .help_text("Enter the same password as before, for verification."),
        );
        Self {
            inner: BaseForm::new(fields),
            disable_username: settings.disable_username,
        }
    }

    pub async fn validate(&mut self, store: &dyn UserStore) -> AccountsResult<bool> {
        self.inner.full_clean();

        if !self.disable_username {
            if let Some(username) = self.inner.cleaned_str("username").map(str::to_string) {
                if !USERNAME_RE.is_match(&username) {
                    self.inner.add_error(
                        Some("username"),
                        "Enter a valid username. This value may contain only letters, \
                         numbers, and @/./+/-/_ characters.",
                    );
                } else if store.username_in_use(&username).await? {
                    self.inner
                        .add_error(Some("username"), "A user with that username already exists.");
                }
            }
        }

        let attributes = self.attributes();
        check_new_password(&mut self.inner, "password1", "password2", &attributes);

        if let Some(email) = self.inner.cleaned_str("email").map(str::to_string) {
            if store.email_in_use(&email, None).await? {
                self.reject_email();
            }
        }

        Ok(self.inner.is_valid())
    }

    /// Marks the email as taken, e.g. when another sign-up claimed it first.
    pub fn reject_email(&mut self) {
        self.inner.add_error(Some("email"), "You can not use this email.");
    }

    fn attributes(&self) -> UserAttributes {
        UserAttributes {
            username: self.inner.cleaned_or_empty("username").to_string(),
            email: self.inner.cleaned_or_empty("email").to_string(),
            first_name: self.inner.cleaned_or_empty("first_name").to_string(),
            last_name: self.inner.cleaned_or_empty("last_name").to_string(),
        }
    }

    /// The submitted username, unless usernames are disabled.
    pub fn username(&self) -> Option<&str> {
        self.inner.cleaned_str("username")
    }

    /// The submitted password.
    pub fn password(&self) -> &str {
        self.inner.cleaned_or_empty("password1")
    }

    /// Builds the insert record with the password hashed.
    ///
    /// `username` replaces the submitted one (used when usernames are disabled).
    pub async fn to_new_user(&self, username: Option<&str>) -> AccountsResult<NewUser> {
        let username = username
            .or_else(|| self.username())
            .unwrap_or_default()
            .to_string();
        NewUser::new(username, self.inner.cleaned_or_empty("email"))
            .names(
                self.inner.cleaned_or_empty("first_name"),
                self.inner.cleaned_or_empty("last_name"),
            )
            .with_password(self.password())
            .await
    }
}

// ── ResendActivationCodeForm ─────────────────────────────────────────

/// Asks for a new activation code.
pub struct ResendActivationCodeForm {
    inner: BaseForm,
    via_email: bool,
    window_hours: i64,
    user: Option<User>,
}

impl ResendActivationCodeForm {
    /// Identified by email when usernames are disabled, otherwise by email or username.
    pub fn new(settings: &AccountSettings) -> Self {
        let via_email = settings.disable_username;
        let field = if via_email {
            email_field("email").autofocus()
        } else {
            email_or_username_field()
        };
        Self {
            inner: BaseForm::new(vec![field]),
            via_email,
            window_hours: settings.activation_resend_hours,
            user: None,
        }
    }

    pub async fn validate(&mut self, store: &dyn UserStore) -> AccountsResult<bool> {
        self.user = None;
        if !self.inner.full_clean() {
            return Ok(false);
        }
        let field = if self.via_email { "email" } else { "email_or_username" };
        let identifier = self.inner.cleaned_or_empty(field).to_string();

        let user = if self.via_email {
            store.get_by_email(&identifier).await?
        } else {
            store.find_by_email_or_username(&identifier).await?
        };
        let Some(user) = user else {
            self.inner.add_error(Some(field), INCORRECT_DATA);
            return Ok(false);
        };
        if user.is_active {
            self.inner
                .add_error(Some(field), "This profile has already been activated.");
            return Ok(false);
        }
        let Some(activation) = store.activation_for_user(user.id).await? else {
            self.inner.add_error(Some(field), INCORRECT_DATA);
            return Ok(false);
        };
        if !activation.resend_allowed(Utc::now(), Duration::hours(self.window_hours)) {
            self.inner.add_error(
                Some(field),
                format!(
                    "Activation code has already been sent. You can request a new code in {} \
                     hours.",
                    self.window_hours
                ),
            );
            return Ok(false);
        }
        self.user = Some(user);
        Ok(true)
    }

    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }
}

// ── PasswordResetForm ────────────────────────────────────────────────

/// Asks for a password reset link.
///
/// By email, the form always succeeds and targets every active user with
/// that email and a usable password, so it cannot be used to probe which
/// addresses are registered. By email or username it reports unknown and
/// inactive accounts.
pub struct PasswordResetForm {
    inner: BaseForm,
    via_email_or_username: bool,
    users: Vec<User>,
}

impl PasswordResetForm {
    pub fn new(settings: &AccountSettings) -> Self {
        let via_email_or_username = settings.password_reset_via_email_or_username;
        let field = if via_email_or_username {
            email_or_username_field()
        } else {
            email_field("email").autofocus()
        };
        Self {
            inner: BaseForm::new(vec![field]),
            via_email_or_username,
            users: Vec::new(),
        }
    }

    pub async fn validate(&mut self, store: &dyn UserStore) -> AccountsResult<bool> {
        self.users.clear();
        if !self.inner.full_clean() {
            return Ok(false);
        }

        if !self.via_email_or_username {
            let email = self.inner.cleaned_or_empty("email").to_string();
            self.users = store
                .active_users_with_email(&email)
                .await?
                .into_iter()
                .filter(User::has_usable_password)
                .collect();
            return Ok(true);
        }

        let field = "email_or_username";
        let identifier = self.inner.cleaned_or_empty(field).to_string();
        match store.find_by_email_or_username(&identifier).await? {
            None => self.inner.add_error(Some(field), INCORRECT_DATA),
            Some(user) if !user.is_active => self.inner.add_error(Some(field), INACTIVE),
            Some(user) => self.users.push(user),
        }
        Ok(self.inner.is_valid())
    }

    /// The users who should receive a reset link.
    pub fn users(&self) -> &[User] {
        &self.users
    }
}

// ── SetPasswordForm ──────────────────────────────────────────────────

/// Chooses a new password without knowing the old one.
pub struct SetPasswordForm {
    inner: BaseForm,
    attributes: UserAttributes,
}

impl SetPasswordForm {
    pub fn new(user: &User) -> Self {
        Self {
            inner: BaseForm::new(vec![
                password_field("new_password1", "New password")
                    .help_text(password_validators_help_text().join(" "))
                    .autofocus(),
                password_field("new_password2", "New password confirmation"),
            ]),
            attributes: user.attributes(),
        }
    }

    pub fn validate(&mut self) -> bool {
        self.inner.full_clean();
        check_new_password(&mut self.inner, "new_password1", "new_password2", &self.attributes);
        self.inner.is_valid()
    }

    pub fn new_password(&self) -> Option<&str> {
        self.inner.cleaned_str("new_password1")
    }
}

// ── PasswordChangeForm ───────────────────────────────────────────────

/// Changes the password of a signed-in user.
pub struct PasswordChangeForm {
    inner: BaseForm,
}

impl PasswordChangeForm {
    pub fn new() -> Self {
        Self {
            inner: BaseForm::new(vec![
                password_field("old_password", "Old password").autofocus(),
                password_field("new_password1", "New password")
                    .help_text(password_validators_help_text().join(" ")),
                password_field("new_password2", "New password confirmation"),
            ]),
        }
    }

    pub async fn validate(&mut self, user: &User) -> AccountsResult<bool> {
        self.inner.full_clean();
        if let Some(old) = self.inner.cleaned_str("old_password").map(str::to_string) {
            if !user.check_password(&old).await? {
                self.inner.add_error(
                    Some("old_password"),
                    "Your old password was entered incorrectly. Please enter it again.",
                );
            }
        }
        check_new_password(&mut self.inner, "new_password1", "new_password2", &user.attributes());
        Ok(self.inner.is_valid())
    }

    pub fn new_password(&self) -> Option<&str> {
        self.inner.cleaned_str("new_password1")
    }
}

impl Default for PasswordChangeForm {
    fn default() -> Self {
        Self::new()
    }
}

// ── ChangeProfileForm ────────────────────────────────────────────────

/// Edits first and last name.
pub struct ChangeProfileForm {
    inner: BaseForm,
}

impl ChangeProfileForm {
    /// Pre-filled with the user's current names.
    pub fn new(user: &User) -> Self {
        let [first_name, last_name] = name_fields();
        let mut inner = BaseForm::new(vec![first_name.autofocus(), last_name]);
        inner.set_initial("first_name", user.first_name.clone());
        inner.set_initial("last_name", user.last_name.clone());
        Self { inner }
    }

    pub fn validate(&mut self) -> bool {
        self.inner.full_clean()
    }

    /// Copies the cleaned names onto `user`.
    pub fn apply(&self, user: &mut User) {
        user.first_name = self.inner.cleaned_or_empty("first_name").to_string();
        user.last_name = self.inner.cleaned_or_empty("last_name").to_string();
    }
}

// ── ChangeEmailForm ──────────────────────────────────────────────────

/// Changes the email address of a signed-in user.
pub struct ChangeEmailForm {
    inner: BaseForm,
    user_id: i64,
    current_email: String,
}

impl ChangeEmailForm {
    /// Pre-filled with the current address.
    pub fn new(user: &User) -> Self {
        let mut inner = BaseForm::new(vec![email_field("email").placeholder("@").autofocus()]);
        inner.set_initial("email", user.email.clone());
        Self {
            inner,
            user_id: user.id,
            current_email: user.email.to_lowercase(),
        }
    }

    pub async fn validate(&mut self, store: &dyn UserStore) -> AccountsResult<bool> {
        if !self.inner.full_clean() {
            return Ok(false);
        }
        let Some(email) = self.email() else {
            return Ok(false);
        };
        if email == self.current_email {
            self.inner.add_error(Some("email"), "Please enter another email.");
        } else if store.email_in_use(&email, Some(self.user_id)).await? {
            self.reject_email();
        }
        Ok(self.inner.is_valid())
    }

    /// Marks the new address as taken.
    pub fn reject_email(&mut self) {
        self.inner.add_error(Some("email"), "You can not use this mail.");
    }

    /// The new address, lowercased.
    pub fn email(&self) -> Option<String> {
        self.inner.cleaned_str("email").map(str::to_lowercase)
    }
}

// ── RemindUsernameForm ───────────────────────────────────────────────

/// Emails the username registered to an address.
pub struct RemindUsernameForm {
    inner: BaseForm,
    user: Option<User>,
}

impl RemindUsernameForm {
    pub fn new() -> Self {
        Self {
            inner: BaseForm::new(vec![email_field("email").autofocus()]),
            user: None,
        }
    }

    pub async fn validate(&mut self, store: &dyn UserStore) -> AccountsResult<bool> {
        self.user = None;
        if !self.inner.full_clean() {
            return Ok(false);
        }
        let email = self.inner.cleaned_or_empty("email").to_string();
        self.user = store.active_users_with_email(&email).await?.into_iter().next();
        if self.user.is_none() {
            self.inner
                .add_error(Some("email"), "You entered an invalid email address.");
        }
        Ok(self.inner.is_valid())
    }

    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }
}

impl Default for RemindUsernameForm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Instant;

    use accounts_core::Database;

    use super::*;
    use crate::hashers::make_password;
    use crate::store::SqliteUserStore;

    const GOOD_PASSWORD: &str = "velvet-orbit-42";

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    async fn store() -> SqliteUserStore {
        let db = Database::memory().unwrap();
        db.migrate().await.unwrap();
        SqliteUserStore::new(db)
    }

    async fn add_user(store: &SqliteUserStore, username: &str, email: &str, active: bool) -> User {
        store
            .create_user(
                NewUser::new(username, email)
                    .active(active)
                    .with_password(GOOD_PASSWORD)
                    .await
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sign_in_by_username() {
        let store = store().await;
        add_user(&store, "alice", "alice@example.com", true).await;
        let settings = AccountSettings::default();

        let mut form = SignInForm::new(&settings);
        form.bind(&data(&[("username", "alice"), ("password", GOOD_PASSWORD)]));
        assert!(form.validate(&store).await.unwrap());
        assert_eq!(form.user().map(|u| u.username.as_str()), Some("alice"));
        assert!(!form.remember_me());

        let mut form = SignInForm::new(&settings);
        form.bind(&data(&[("username", "alice"), ("password", "bad")]));
        assert!(!form.validate(&store).await.unwrap());
        assert_eq!(
            form.base().non_field_errors(),
            ["Please enter a correct username and password. Note that both fields may be \
              case-sensitive."]
        );
    }

    #[tokio::test]
    async fn test_sign_in_inactive_with_username() {
        let store = store().await;
        add_user(&store, "bob", "bob@example.com", false).await;
        let mut form = SignInForm::new(&AccountSettings::default());
        form.bind(&data(&[("username", "bob"), ("password", GOOD_PASSWORD)]));
        assert!(!form.validate(&store).await.unwrap());
        assert_eq!(form.base().non_field_errors(), [INACTIVE]);
        assert!(form.user().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_by_email_reports_both_errors() {
        let store = store().await;
        add_user(&store, "carol", "carol@example.com", false).await;
        let settings = AccountSettings {
            login_via_email: true,
            ..AccountSettings::default()
        };

        let mut form = SignInForm::new(&settings);
        assert!(form.base().has_field("email"));
        form.bind(&data(&[("email", "CAROL@example.com"), ("password", "wrong")]));
        assert!(!form.validate(&store).await.unwrap());
        let errors = form.base().field_errors("email");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], INACTIVE);
        assert!(errors[1].starts_with("Please enter a correct email and password."));
    }

    #[tokio::test]
    async fn test_sign_in_by_email_hashes_for_unknown_accounts() {
        let store = store().await;
        let settings = AccountSettings {
            login_via_email: true,
            ..AccountSettings::default()
        };

        make_password(GOOD_PASSWORD).await.unwrap();
        let started = Instant::now();
        make_password(GOOD_PASSWORD).await.unwrap();
        let one_hash = started.elapsed();

        let mut form = SignInForm::new(&settings);
        form.bind(&data(&[("email", "nobody@example.com"), ("password", GOOD_PASSWORD)]));
        let started = Instant::now();
        assert!(!form.validate(&store).await.unwrap());
        assert!(
            started.elapsed() >= one_hash / 2,
            "unknown account answered in {:?}, one hash takes {one_hash:?}",
            started.elapsed()
        );
        assert!(form.base().field_errors("email")[0]
            .starts_with("Please enter a correct email and password."));
    }

    #[tokio::test]
    async fn test_sign_in_by_email_or_username() {
        let store = store().await;
        add_user(&store, "dave", "dave@example.com", true).await;
        let settings = AccountSettings {
            login_via_email_or_username: true,
            ..AccountSettings::default()
        };

        for identifier in ["dave", "Dave@Example.com"] {
            let mut form = SignInForm::new(&settings);
            form.bind(&data(&[
                ("email_or_username", identifier),
                ("password", GOOD_PASSWORD),
                ("remember_me", "on"),
            ]));
            assert!(form.validate(&store).await.unwrap(), "{identifier}");
            assert!(form.remember_me());
        }

        let mut form = SignInForm::new(&settings);
        form.bind(&data(&[("email_or_username", "nobody"), ("password", "x")]));
        assert!(!form.validate(&store).await.unwrap());
        assert!(form.base().field_errors("email_or_username")[0]
            .starts_with("Please enter a correct email or username and password."));
    }

    #[tokio::test]
    async fn test_sign_in_without_remember_me_checkbox() {
        let settings = AccountSettings {
            use_remember_me: false,
            ..AccountSettings::default()
        };
        let form = SignInForm::new(&settings);
        assert!(!form.base().has_field("remember_me"));
        assert!(form.remember_me());
    }

    #[tokio::test]
    async fn test_sign_up_valid() {
        let store = store().await;
        let mut form = SignUpForm::new(&AccountSettings::default());
        form.bind(&data(&[
            ("username", "erin"),
            ("first_name", "Erin"),
            ("email", "Erin@Example.com"),
            ("password1", GOOD_PASSWORD),
            ("password2", GOOD_PASSWORD),
        ]));
        assert!(form.validate(&store).await.unwrap());
        let new_user = form.to_new_user(None).await.unwrap();
        assert_eq!(new_user.username, "erin");
        assert_eq!(new_user.email, "erin@example.com");
        assert_eq!(new_user.first_name, "Erin");
        assert!(new_user.password.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_sign_up_errors() {
        let store = store().await;
        add_user(&store, "frank", "frank@example.com", true).await;
        let mut form = SignUpForm::new(&AccountSettings::default());
        form.bind(&data(&[
            ("username", "frank"),
            ("email", "FRANK@example.com"),
            ("password1", GOOD_PASSWORD),
            ("password2", "something-else-1"),
        ]));
        assert!(!form.validate(&store).await.unwrap());
        let base = form.base();
        assert_eq!(base.field_errors("username"), ["A user with that username already exists."]);
        assert_eq!(base.field_errors("email"), ["You can not use this email."]);
        assert_eq!(base.field_errors("password2"), [PASSWORD_MISMATCH]);
    }

    #[tokio::test]
    async fn test_sign_up_rejects_bad_username_and_weak_password() {
        let store = store().await;
        let mut form = SignUpForm::new(&AccountSettings::default());
        form.bind(&data(&[
            ("username", "bad name!"),
            ("email", "grace@example.com"),
            ("password1", "12345"),
            ("password2", "12345"),
        ]));
        assert!(!form.validate(&store).await.unwrap());
        assert!(form.base().field_errors("username")[0].starts_with("Enter a valid username."));
        let password_errors = form.base().field_errors("password2");
        assert!(password_errors.contains(&"This password is entirely numeric.".to_string()));
        assert!(password_errors.len() >= 2);
    }

    #[tokio::test]
    async fn test_sign_up_without_username_field() {
        let store = store().await;
        let settings = AccountSettings {
            disable_username: true,
            ..AccountSettings::default()
        };
        let mut form = SignUpForm::new(&settings);
        assert!(!form.base().has_field("username"));
        form.bind(&data(&[
            ("email", "heidi@example.com"),
            ("password1", GOOD_PASSWORD),
            ("password2", GOOD_PASSWORD),
        ]));
        assert!(form.validate(&store).await.unwrap());
        assert!(form.username().is_none());
        let new_user = form.to_new_user(Some("tmp-name")).await.unwrap();
        assert_eq!(new_user.username, "tmp-name");
    }

    #[tokio::test]
    async fn test_resend_activation_code() {
        let store = store().await;
        add_user(&store, "ivan", "ivan@example.com", true).await;
        let pending = add_user(&store, "judy", "judy@example.com", false).await;
        add_user(&store, "ken", "ken@example.com", false).await;
        store.create_activation(pending.id, "fresh-code", None).await.unwrap();
        let settings = AccountSettings::default();

        let cases = [
            ("nobody", INCORRECT_DATA.to_string()),
            ("ivan", "This profile has already been activated.".to_string()),
            ("ken", INCORRECT_DATA.to_string()),
            (
                "judy@example.com",
                "Activation code has already been sent. You can request a new code in 24 hours."
                    .to_string(),
            ),
        ];
        for (identifier, expected) in cases {
            let mut form = ResendActivationCodeForm::new(&settings);
            form.bind(&data(&[("email_or_username", identifier)]));
            assert!(!form.validate(&store).await.unwrap());
            assert_eq!(form.base().field_errors("email_or_username"), [expected]);
        }
    }

    #[tokio::test]
    async fn test_resend_allowed_after_window() {
        let store = store().await;
        let pending = add_user(&store, "leo", "leo@example.com", false).await;
        store.create_activation(pending.id, "old-code", None).await.unwrap();
        let settings = AccountSettings {
            disable_username: true,
            activation_resend_hours: 0,
            ..AccountSettings::default()
        };
        let mut form = ResendActivationCodeForm::new(&settings);
        form.bind(&data(&[("email", "leo@example.com")]));
        assert!(form.validate(&store).await.unwrap());
        assert_eq!(form.user().map(|u| u.id), Some(pending.id));
    }

    #[tokio::test]
    async fn test_password_reset_by_email_is_silent() {
        let store = store().await;
        add_user(&store, "mia", "mia@example.com", true).await;
        add_user(&store, "ola", "ola@example.com", false).await;
        let mut unusable = add_user(&store, "pia", "pia@example.com", true).await;
        unusable.set_unusable_password();
        store.update_user(&unusable).await.unwrap();

        let settings = AccountSettings::default();
        let mut form = PasswordResetForm::new(&settings);
        form.bind(&data(&[("email", "MIA@example.com")]));
        assert!(form.validate(&store).await.unwrap());
        let names: Vec<_> = form.users().iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["mia"]);

        for email in ["ola@example.com", "pia@example.com", "unknown@example.com"] {
            let mut form = PasswordResetForm::new(&settings);
            form.bind(&data(&[("email", email)]));
            assert!(form.validate(&store).await.unwrap(), "{email}");
            assert!(form.users().is_empty(), "{email}");
        }
    }

    #[tokio::test]
    async fn test_password_reset_by_email_or_username() {
        let store = store().await;
        add_user(&store, "quinn", "quinn@example.com", false).await;
        add_user(&store, "rita", "rita@example.com", true).await;
        let settings = AccountSettings {
            password_reset_via_email_or_username: true,
            ..AccountSettings::default()
        };

        let expectations = [("ghost", Some(INCORRECT_DATA)), ("quinn", Some(INACTIVE)), ("rita", None)];
        for (identifier, error) in expectations {
            let mut form = PasswordResetForm::new(&settings);
            form.bind(&data(&[("email_or_username", identifier)]));
            let valid = form.validate(&store).await.unwrap();
            match error {
                Some(message) => {
                    assert!(!valid);
                    assert_eq!(form.base().field_errors("email_or_username"), [message]);
                }
                None => assert_eq!(form.users().len(), 1),
            }
        }
    }

    #[tokio::test]
    async fn test_set_password_form() {
        let store = store().await;
        let user = add_user(&store, "sam", "sam@example.com", true).await;

        let mut form = SetPasswordForm::new(&user);
        form.bind(&data(&[("new_password1", "sam"), ("new_password2", "sam")]));
        assert!(!form.validate());
        assert!(form.base().has_error("new_password2"));

        let mut form = SetPasswordForm::new(&user);
        form.bind(&data(&[("new_password1", GOOD_PASSWORD), ("new_password2", GOOD_PASSWORD)]));
        assert!(form.validate());
        assert_eq!(form.new_password(), Some(GOOD_PASSWORD));
    }

    #[tokio::test]
    async fn test_password_change_form() {
        let store = store().await;
        let user = add_user(&store, "tom", "tom@example.com", true).await;

        let mut form = PasswordChangeForm::new();
        form.bind(&data(&[
            ("old_password", "not-it"),
            ("new_password1", "fresh-meadow-77"),
            ("new_password2", "fresh-meadow-77"),
        ]));
        assert!(!form.validate(&user).await.unwrap());
        assert_eq!(
            form.base().field_errors("old_password"),
            ["Your old password was entered incorrectly. Please enter it again."]
        );

        let mut form = PasswordChangeForm::new();
        form.bind(&data(&[
            ("old_password", GOOD_PASSWORD),
            ("new_password1", "fresh-meadow-77"),
            ("new_password2", "fresh-meadow-77"),
        ]));
        assert!(form.validate(&user).await.unwrap());
        assert_eq!(form.new_password(), Some("fresh-meadow-77"));
    }

    #[tokio::test]
    async fn test_change_profile_form() {
        let store = store().await;
        let mut user = add_user(&store, "uma", "uma@example.com", true).await;
        user.first_name = "Uma".to_string();

        let form = ChangeProfileForm::new(&user);
        assert_eq!(form.as_context()["fields"][0]["value"], "Uma");

        let mut form = ChangeProfileForm::new(&user);
        form.bind(&data(&[("first_name", " Una "), ("last_name", "")]));
        assert!(form.validate());
        form.apply(&mut user);
        assert_eq!(user.first_name, "Una");
        assert_eq!(user.last_name, "");
    }

    #[tokio::test]
    async fn test_change_email_form() {
        let store = store().await;
        let user = add_user(&store, "vic", "vic@example.com", true).await;
        add_user(&store, "wes", "wes@example.com", true).await;

        let cases = [
            ("VIC@example.com", Some("Please enter another email.")),
            ("wes@example.com", Some("You can not use this mail.")),
            ("Vic.New@Example.com", None),
        ];
        for (email, error) in cases {
            let mut form = ChangeEmailForm::new(&user);
            form.bind(&data(&[("email", email)]));
            let valid = form.validate(&store).await.unwrap();
            match error {
                Some(message) => {
                    assert!(!valid, "{email}");
                    assert_eq!(form.base().field_errors("email"), [message]);
                }
                None => {
                    assert!(valid);
                    assert_eq!(form.email().as_deref(), Some("vic.new@example.com"));
                }
            }
        }
    }

    #[tokio::test]
    async fn test_remind_username_form() {
        let store = store().await;
        add_user(&store, "xena", "xena@example.com", true).await;
        add_user(&store, "yuri", "yuri@example.com", false).await;

        let mut form = RemindUsernameForm::new();
        form.bind(&data(&[("email", "XENA@example.com")]));
        assert!(form.validate(&store).await.unwrap());
        assert_eq!(form.user().map(|u| u.username.as_str()), Some("xena"));

        for email in ["yuri@example.com", "zed@example.com"] {
            let mut form = RemindUsernameForm::new();
            form.bind(&data(&[("email", email)]));
            assert!(!form.validate(&store).await.unwrap());
            assert_eq!(
                form.base().field_errors("email"),
                ["You entered an invalid email address."]
            );
        }
    }
}
