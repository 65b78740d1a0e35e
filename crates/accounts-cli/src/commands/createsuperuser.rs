//! The `createsuperuser` command.

use accounts_auth::{
    validate_password, NewUser, SqliteUserStore, User, UserAttributes, UserStore, UNIQUE_EMAIL,
};
use accounts_core::{AccountsError, Settings, ValidationError};
use accounts_forms::fields::is_valid_email;
use async_trait::async_trait;

use super::migrate::migrate;
use crate::command::ManagementCommand;

/// Creates an active staff superuser from `--username`, `--email` and
/// `--password`. The password validators apply as they do on sign-up.
pub struct CreatesuperuserCommand;

fn invalid(message: impl Into<String>, code: &str) -> AccountsError {
    AccountsError::ValidationError(ValidationError::new(message, code))
}

/// Validates the input and inserts the superuser.
pub async fn create_superuser(
    store: &dyn UserStore,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, AccountsError> {
    let username = username.trim();
    let email = email.trim();
    if username.is_empty() {
        return Err(invalid("Username cannot be blank.", "required"));
    }
    if store.username_in_use(username).await? {
        return Err(invalid(
            "A user with that username already exists.",
            "unique_username",
        ));
    }
    if !email.is_empty() {
        if !is_valid_email(email) {
            return Err(invalid("Enter a valid email address.", "invalid_email"));
        }
        if store.email_in_use(email, None).await? {
            return Err(invalid("A user with that email already exists.", UNIQUE_EMAIL));
        }
    }
    let attributes = UserAttributes {
        username: username.to_string(),
        email: email.to_string(),
        first_name: String::new(),
        last_name: String::new(),
    };
    validate_password(password, &attributes)
        .map_err(|messages| invalid(messages.join(" "), "password_invalid"))?;

    let new_user = NewUser::new(username, email)
        .with_password(password)
        .await?
        .superuser();
    store.create_user(new_user).await
}

#[async_trait]
impl ManagementCommand for CreatesuperuserCommand {
    fn name(&self) -> &'static str {
        "createsuperuser"
    }

    fn help(&self) -> &'static str {
        "Create a superuser account"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("username")
                .long("username")
                .required(true)
                .help("Username for the superuser"),
        )
        .arg(
            clap::Arg::new("email")
                .long("email")
                .default_value("")
                .help("Email address for the superuser"),
        )
        .arg(
            clap::Arg::new("password")
                .long("password")
                .required(true)
                .help("Password for the superuser"),
        )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), AccountsError> {
        let arg = |name: &str| matches.get_one::<String>(name).map_or("", String::as_str);
        let (db, _) = migrate(settings).await?;
        let store = SqliteUserStore::new(db);
        let user = create_superuser(&store, arg("username"), arg("email"), arg("password")).await?;
        tracing::info!(user_id = user.id, "Superuser '{}' created successfully", user.username);
        Ok(())
    }
}
