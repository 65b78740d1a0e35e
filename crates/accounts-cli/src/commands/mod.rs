//! Built-in management commands.

pub mod check;
pub mod clearsessions;
pub mod createsuperuser;
pub mod migrate;
pub mod runserver;
pub mod sendtestemail;

pub use check::CheckCommand;
pub use clearsessions::ClearsessionsCommand;
pub use createsuperuser::CreatesuperuserCommand;
pub use migrate::MigrateCommand;
pub use runserver::RunserverCommand;
pub use sendtestemail::SendtestemailCommand;

use crate::command::CommandRegistry;

/// Registers every built-in command.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(RunserverCommand));
    registry.register(Box::new(MigrateCommand));
    registry.register(Box::new(CreatesuperuserCommand));
    registry.register(Box::new(ClearsessionsCommand));
    registry.register(Box::new(CheckCommand));
    registry.register(Box::new(SendtestemailCommand));
}
