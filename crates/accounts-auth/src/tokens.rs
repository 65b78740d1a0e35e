//! One-time password reset tokens.
//!
//! A token is `"{timestamp}-{hash}"`: the timestamp is seconds since
//! 2001-01-01 in base 36, the hash a truncated HMAC over the user's id,
//! password hash, last login, email and the timestamp. Nothing is stored
//! server-side. A token stops working once it is older than the timeout, or
//! as soon as the user changes password or logs in.

use accounts_core::crypto::{constant_time_eq, salted_hmac_hex};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, TimeZone as _, Utc};

use crate::user::User;

const KEY_SALT: &str = "accounts.auth.tokens.PasswordResetTokenGenerator";

/// Longest base-36 timestamp accepted; guards the integer parse.
const MAX_TIMESTAMP_DIGITS: usize = 13;

/// Makes and checks password reset tokens.
#[derive(Debug, Clone)]
pub struct PasswordResetTokenGenerator {
    secret: String,
    timeout: Duration,
}

impl PasswordResetTokenGenerator {
    /// Creates a generator signing with `secret` whose tokens last `timeout`.
    pub fn new(secret: impl Into<String>, timeout: Duration) -> Self {
        Self {
            secret: secret.into(),
            timeout,
        }
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Makes a token for `user` valid from now.
    pub fn make_token(&self, user: &User) -> String {
        self.make_token_at(user, Utc::now())
    }

    /// Makes a token as if issued at `now`.
    pub fn make_token_at(&self, user: &User, now: DateTime<Utc>) -> String {
        self.token_with_timestamp(user, seconds_since_epoch(now))
    }

    /// Checks a token against `user` at the current time.
    pub fn check_token(&self, user: &User, token: &str) -> bool {
        self.check_token_at(user, token, Utc::now())
    }

    /// Checks a token against `user` as of `now`.
    pub fn check_token_at(&self, user: &User, token: &str, now: DateTime<Utc>) -> bool {
        let Some((ts_b36, _)) = token.split_once('-') else {
            return false;
        };
        let Some(ts) = base36_to_int(ts_b36) else {
            return false;
        };

        let expected = self.token_with_timestamp(user, ts);
        if !constant_time_eq(expected.as_bytes(), token.as_bytes()) {
            return false;
        }

        let age = seconds_since_epoch(now) - ts;
        age >= 0 && age <= self.timeout.num_seconds()
    }

    fn token_with_timestamp(&self, user: &User, timestamp: i64) -> String {
        let ts_b36 = int_to_base36(timestamp);
        let hash = salted_hmac_hex(KEY_SALT, &hash_value(user, timestamp), &self.secret);
        // Every other character keeps the URL short.
        let short: String = hash.chars().step_by(2).collect();
        format!("{ts_b36}-{short}")
    }
}

fn hash_value(user: &User, timestamp: i64) -> String {
    let login = user
        .last_login
        .map(|dt| dt.timestamp_micros().to_string())
        .unwrap_or_default();
    format!(
        "{}{}{}{}{}",
        user.id, user.password, login, timestamp, user.email
    )
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn seconds_since_epoch(now: DateTime<Utc>) -> i64 {
    (now - epoch()).num_seconds()
}

fn int_to_base36(mut value: i64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value <= 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        // `value % 36` is in 0..36.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let digit = (value % 36) as usize;
        out.push(DIGITS[digit]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn base36_to_int(s: &str) -> Option<i64> {
    if s.is_empty() || s.len() > MAX_TIMESTAMP_DIGITS {
        return None;
    }
    i64::from_str_radix(s, 36).ok().filter(|v| *v >= 0)
}

/// Encodes a user id for reset links.
pub fn encode_uid(id: i64) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

/// Decodes a value made by [`encode_uid`]; `None` for anything else.
pub fn decode_uid(uidb64: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()?.parse().ok()
}
