//! # accounts-web
//!
//! The HTTP side of accounts-rs, built on axum.
//!
//! ## Modules
//!
//! - [`session`] - Cookie sessions with database or in-memory storage
//! - [`auth`] - Logging users in and out of a session
//! - [`messages`] - One-time flash messages
//! - [`mail`] - Email messages and delivery backends
//! - [`notifications`] - The account emails (activation, reset, reminders)
//! - [`templates`] - Tera templates, built in or overridden from disk
//! - [`views`] - Request handlers and access extractors
//! - [`server`] - Application assembly, router and server
//! - [`error`] - Error to response conversion

pub mod auth;
pub mod error;
pub mod mail;
pub mod messages;
pub mod notifications;
pub mod server;
pub mod session;
pub mod templates;
pub mod views;

pub use error::{WebError, WebResult};
pub use mail::{EmailBackend, EmailMessage, InMemoryBackend};
pub use server::{router, AccountsApp, AppState};
pub use session::{Session, SessionBackend, SessionManager};
pub use templates::Templates;
