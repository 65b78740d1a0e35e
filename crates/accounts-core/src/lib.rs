//! # accounts-core
//!
//! Foundation types shared by the accounts-rs crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Application settings and feature flags
//! - [`settings_loader`] - TOML and environment loading
//! - [`logging`] - Tracing subscriber setup
//! - [`crypto`] - Random strings, salted HMACs, constant-time comparison
//! - [`text`] - HTML stripping and redirect safety checks
//! - [`database`] - SQLite handle and schema migrations

pub mod crypto;
pub mod database;
pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod text;

// Re-export the most commonly used types at the crate root.
pub use database::Database;
pub use error::{AccountsError, AccountsResult, ValidationError};
pub use settings::{AccountSettings, EmailSettings, SessionSettings, Settings};
