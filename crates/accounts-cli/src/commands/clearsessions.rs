//! The `clearsessions` command.

use accounts_core::{AccountsError, Settings};
use accounts_web::session::{SessionBackend, SqliteSessionBackend};
use async_trait::async_trait;

use super::migrate::migrate;
use crate::command::ManagementCommand;

/// Deletes expired rows from the session table.
///
/// Meant to run periodically (e.g. from cron). In-memory sessions die with
/// the server process, so there is nothing to do for that backend.
pub struct ClearsessionsCommand;

#[async_trait]
impl ManagementCommand for ClearsessionsCommand {
    fn name(&self) -> &'static str {
        "clearsessions"
    }

    fn help(&self) -> &'static str {
        "Delete expired sessions"
    }

    async fn handle(
        &self,
        _matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), AccountsError> {
        if settings.session.backend != "db" {
            tracing::info!(
                backend = %settings.session.backend,
                "Session backend keeps no stored sessions"
            );
            return Ok(());
        }
        let (db, _) = migrate(settings).await?;
        let removed = SqliteSessionBackend::new(db).clear_expired().await?;
        tracing::info!(removed, "Expired sessions cleared");
        Ok(())
    }
}
