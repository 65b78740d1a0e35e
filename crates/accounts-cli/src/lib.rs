//! # accounts-cli
//!
//! The `accounts` management utility.
//!
//! ```rust
//! use accounts_cli::command::CommandRegistry;
//! use accounts_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//!
//! let names = registry.list_commands();
//! assert!(names.contains(&"runserver"));
//! assert!(names.contains(&"createsuperuser"));
//! ```

pub mod command;
pub mod commands;

use std::path::PathBuf;

pub use command::{CommandRegistry, ManagementCommand, SETTINGS_ARG};

/// A registry holding every built-in command.
pub fn default_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    commands::register_builtin_commands(&mut registry);
    registry
}

/// The `--settings` value, if given.
pub fn settings_path(matches: &clap::ArgMatches) -> Option<&PathBuf> {
    matches.get_one::<PathBuf>(SETTINGS_ARG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = default_registry();
        assert_eq!(
            registry.list_commands(),
            vec![
                "check",
                "clearsessions",
                "createsuperuser",
                "migrate",
                "runserver",
                "sendtestemail"
            ]
        );
    }

    #[test]
    fn test_settings_path() {
        let cli = default_registry().build_cli();
        let matches = cli
            .clone()
            .try_get_matches_from(["accounts", "--settings", "a.toml", "migrate"])
            .unwrap();
        assert_eq!(settings_path(&matches), Some(&PathBuf::from("a.toml")));

        let matches = cli
            .try_get_matches_from(["accounts", "runserver", "--port", "9000"])
            .unwrap();
        assert!(settings_path(&matches).is_none());
    }
}
