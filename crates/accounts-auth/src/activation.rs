//! Activation codes.
//!
//! An [`Activation`] is created when a user signs up (with `email` unset) or
//! asks to change their email (with `email` holding the new address). The
//! code is emailed as part of a link; following the link consumes the record.

use accounts_core::crypto::get_random_string;
use chrono::{DateTime, Duration, Utc};

/// Length of generated activation codes.
pub const ACTIVATION_CODE_LENGTH: usize = 20;

/// A pending activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub id: i64,
    pub user_id: i64,
    /// Random `[a-zA-Z0-9]` code, unique across all activations.
    pub code: String,
    /// The new address for an email change; `None` for sign-up activations.
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Activation {
    /// Returns `true` if a replacement code may be sent at `now`.
    ///
    /// A new code is only sent once `window` has passed since this one was
    /// created, so the activation endpoint cannot be used to flood a mailbox.
    pub fn resend_allowed(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.created_at <= now - window
    }

    /// Returns `true` for email-change activations.
    pub const fn is_email_change(&self) -> bool {
        self.email.is_some()
    }
}

/// Generates a new activation code.
pub fn generate_code() -> String {
    get_random_string(ACTIVATION_CODE_LENGTH)
}
