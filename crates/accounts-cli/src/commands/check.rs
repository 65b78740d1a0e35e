//! The `check` command.

use accounts_core::{AccountsError, Settings};
use accounts_web::mail::backend_from_settings;
use accounts_web::Templates;
use async_trait::async_trait;

use crate::command::ManagementCommand;

/// Validates the configuration and fails when anything is wrong.
pub struct CheckCommand;

/// Every problem with `settings`, including ones only found by building the
/// API email client and loading the templates.
pub fn run_checks(settings: &Settings) -> Vec<String> {
    let mut problems = settings.check();
    if settings.email.backend == "api" {
        if let Err(e) = backend_from_settings(&settings.email) {
            problems.push(format!("email: {e}"));
        }
    }
    if let Err(e) = Templates::load(settings.template_dir.as_deref()) {
        problems.push(format!("templates: {e}"));
    }
    problems
}

#[async_trait]
impl ManagementCommand for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn help(&self) -> &'static str {
        "Check the settings for problems"
    }

    async fn handle(
        &self,
        _matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), AccountsError> {
        let problems = run_checks(settings);
        if problems.is_empty() {
            tracing::info!("System check identified no issues");
            return Ok(());
        }
        for problem in &problems {
            tracing::error!("{problem}");
        }
        Err(AccountsError::ConfigurationError(format!(
            "System check identified {} issue(s)",
            problems.len()
        )))
    }
}
