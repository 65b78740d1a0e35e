//! The `migrate` command.

use accounts_core::{AccountsError, Database, Settings};
use async_trait::async_trait;

use crate::command::ManagementCommand;

/// Applies pending schema migrations to the configured database.
pub struct MigrateCommand;

/// Opens the configured database and brings its schema up to date.
///
/// Returns the database with the names of the migrations just applied.
pub async fn migrate(settings: &Settings) -> Result<(Database, Vec<&'static str>), AccountsError> {
    let db = Database::open(&settings.database_path)?;
    let applied = db.migrate().await?;
    Ok((db, applied))
}

#[async_trait]
impl ManagementCommand for MigrateCommand {
    fn name(&self) -> &'static str {
        "migrate"
    }

    fn help(&self) -> &'static str {
        "Apply database migrations"
    }

    async fn handle(
        &self,
        _matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), AccountsError> {
        tracing::info!(
            "Running migrations on '{}'",
            settings.database_path.display()
        );
        let (_, applied) = migrate(settings).await?;
        if applied.is_empty() {
            tracing::info!("No migrations to apply");
        }
        for name in applied {
            tracing::info!("Applied {name}");
        }
        Ok(())
    }
}
