//! One-time flash messages.
//!
//! Views queue a message before redirecting; the next rendered page drains
//! the queue. Messages live in the session under `_messages`.

use accounts_core::error::AccountsResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::session::Session;

const MESSAGES_KEY: &str = "_messages";

/// Message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl MessageLevel {
    /// Numeric level (Debug 10 .. Error 40).
    pub const fn value(self) -> u8 {
        match self {
            Self::Debug => 10,
            Self::Info => 20,
            Self::Success => 25,
            Self::Warning => 30,
            Self::Error => 40,
        }
    }

    /// Bootstrap alert class suffix.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Debug => "secondary",
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: MessageLevel,
    pub message: String,
}

impl Message {
    /// Template form: `{ message, level, tags }`.
    pub fn to_context(&self) -> Value {
        json!({
            "message": self.message,
            "level": self.level.value(),
            "tags": self.level.tag(),
        })
    }
}

/// Queues a message for the next page.
pub async fn add_message(
    session: &Session,
    level: MessageLevel,
    message: impl Into<String>,
) -> AccountsResult<()> {
    let mut queued: Vec<Message> = session.get(MESSAGES_KEY).await.unwrap_or_default();
    queued.push(Message {
        level,
        message: message.into(),
    });
    session.insert(MESSAGES_KEY, &queued).await
}

pub async fn success(session: &Session, message: impl Into<String>) -> AccountsResult<()> {
    add_message(session, MessageLevel::Success, message).await
}

pub async fn info(session: &Session, message: impl Into<String>) -> AccountsResult<()> {
    add_message(session, MessageLevel::Info, message).await
}

pub async fn warning(session: &Session, message: impl Into<String>) -> AccountsResult<()> {
    add_message(session, MessageLevel::Warning, message).await
}

pub async fn error(session: &Session, message: impl Into<String>) -> AccountsResult<()> {
    add_message(session, MessageLevel::Error, message).await
}

/// Removes and returns every queued message.
pub async fn take_messages(session: &Session) -> Vec<Message> {
    session
        .remove(MESSAGES_KEY)
        .await
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}
