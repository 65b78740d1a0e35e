//! Management command framework.
//!
//! A [`ManagementCommand`] names itself, declares its clap arguments and
//! handles a parsed invocation. [`CommandRegistry`] collects commands and
//! turns them into one clap CLI with a global `--settings` option.
//!
//! ## Defining a Command
//!
//! ```rust,no_run
//! use accounts_cli::command::ManagementCommand;
//! use accounts_core::{AccountsError, Settings};
//! use async_trait::async_trait;
//!
//! struct GreetCommand;
//!
//! #[async_trait]
//! impl ManagementCommand for GreetCommand {
//!     fn name(&self) -> &'static str { "greet" }
//!     fn help(&self) -> &'static str { "Say hello" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         settings: &Settings,
//!     ) -> Result<(), AccountsError> {
//!         tracing::info!("Hello from {}", settings.site_name);
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use accounts_core::{AccountsError, Settings};
use async_trait::async_trait;

/// Name of the global option pointing at a TOML settings file.
pub const SETTINGS_ARG: &str = "settings";

/// A command invocable as `accounts <name>`.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// The subcommand name.
    fn name(&self) -> &'static str;

    /// One-line help shown in `accounts --help`.
    fn help(&self) -> &'static str;

    /// Adds the command's own arguments. The default adds none.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), AccountsError>;
}

/// Registered commands, kept sorted by name.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Box<dyn ManagementCommand>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command, replacing any command with the same name.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        self.commands.insert(command.name(), command);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    pub fn list_commands(&self) -> Vec<&'static str> {
        self.commands.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the top-level clap command with one subcommand per registration.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new("accounts")
            .about("accounts-rs management utility")
            .version(env!("CARGO_PKG_VERSION"))
            .subcommand_required(true)
            .arg_required_else_help(true)
            .arg(
                clap::Arg::new(SETTINGS_ARG)
                    .long(SETTINGS_ARG)
                    .global(true)
                    .value_name("FILE")
                    .value_parser(clap::value_parser!(PathBuf))
                    .help("TOML settings file (defaults to ./accounts.toml if present)"),
            );

        for (name, cmd) in &self.commands {
            let subcmd = clap::Command::new(*name).about(cmd.help());
            app = app.subcommand(cmd.add_arguments(subcmd));
        }
        app
    }

    /// Dispatches to the subcommand named in `matches`.
    pub async fn execute(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), AccountsError> {
        let (name, sub_matches) = matches.subcommand().ok_or_else(|| {
            AccountsError::ConfigurationError("No subcommand specified".to_string())
        })?;
        let cmd = self
            .get(name)
            .ok_or_else(|| AccountsError::ConfigurationError(format!("Unknown command: {name}")))?;
        cmd.handle(sub_matches, settings).await
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.list_commands())
            .finish()
    }
}
