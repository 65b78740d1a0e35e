//! The `sendtestemail` command.

use accounts_core::{AccountsError, Settings};
use accounts_web::mail::{backend_from_settings, EmailBackend, EmailMessage};
use async_trait::async_trait;

use crate::command::ManagementCommand;

/// Sends a test message through the configured email backend.
pub struct SendtestemailCommand;

pub fn test_message(settings: &Settings, to: Vec<String>) -> EmailMessage {
    EmailMessage::new(
        format!("Test email from {}", settings.site_name),
        format!(
            "If you're reading this, email delivery from {} works.",
            settings.site_domain
        ),
        settings.email.default_from_email.clone(),
        to,
    )
}

pub async fn send_test_email(
    mailer: &dyn EmailBackend,
    settings: &Settings,
    to: Vec<String>,
) -> Result<(), AccountsError> {
    mailer.send(&test_message(settings, to)).await
}

#[async_trait]
impl ManagementCommand for SendtestemailCommand {
    fn name(&self) -> &'static str {
        "sendtestemail"
    }

    fn help(&self) -> &'static str {
        "Send a test email to the given addresses"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("to")
                .required(true)
                .num_args(1..)
                .help("Recipient address(es)"),
        )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), AccountsError> {
        let to: Vec<String> = matches
            .get_many::<String>("to")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        let mailer = backend_from_settings(&settings.email)?;
        send_test_email(mailer.as_ref(), settings, to.clone()).await?;
        tracing::info!(backend = %settings.email.backend, "Test email sent to {}", to.join(", "));
        Ok(())
    }
}
