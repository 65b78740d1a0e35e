//! Password hashing and password validation.
//!
//! New passwords are hashed with Argon2id. Bcrypt hashes are still verified
//! so accounts imported from older systems can sign in. Hashing runs on
//! `tokio::task::spawn_blocking` because both algorithms are deliberately slow.
//!
//! # Hashers
//!
//! - [`Argon2Hasher`] - used for every new password
//! - [`BcryptHasher`] - verification of legacy `$2a$`/`$2b$`/`$2y$` hashes
//!
//! # Validators
//!
//! - [`MinimumLengthValidator`]
//! - [`CommonPasswordValidator`]
//! - [`NumericPasswordValidator`]
//! - [`UserAttributeSimilarityValidator`]

use accounts_core::crypto::get_random_string;
use accounts_core::error::{AccountsError, AccountsResult};
use async_trait::async_trait;

/// Prefix of hashes that can never match a password.
pub const UNUSABLE_PASSWORD_PREFIX: &str = "!";

/// Random characters appended to [`UNUSABLE_PASSWORD_PREFIX`].
const UNUSABLE_PASSWORD_SUFFIX_LENGTH: usize = 40;

/// A password hashing algorithm.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Returns the algorithm name.
    fn algorithm(&self) -> &'static str;

    /// Returns `true` if this hasher produced `encoded`.
    fn recognizes(&self, encoded: &str) -> bool;

    /// Hashes `password` into a self-describing encoded string.
    async fn hash(&self, password: &str) -> AccountsResult<String>;

    /// Checks `password` against `encoded`.
    async fn verify(&self, password: &str, encoded: &str) -> AccountsResult<bool>;
}

async fn run_blocking<T, F>(f: F) -> AccountsResult<T>
where
    F: FnOnce() -> AccountsResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AccountsError::InternalServerError(format!("Task join error: {e}")))?
}

/// Argon2id with the crate's default parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

#[async_trait]
impl PasswordHasher for Argon2Hasher {
    fn algorithm(&self) -> &'static str {
        "argon2"
    }

    fn recognizes(&self, encoded: &str) -> bool {
        encoded.starts_with("$argon2")
    }

    async fn hash(&self, password: &str) -> AccountsResult<String> {
        let password = password.to_string();
        run_blocking(move || {
            use argon2::password_hash::{rand_core::OsRng, PasswordHasher as _, SaltString};

            let salt = SaltString::generate(&mut OsRng);
            argon2::Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AccountsError::InternalServerError(format!("Argon2 hash error: {e}")))
        })
        .await
    }

    async fn verify(&self, password: &str, encoded: &str) -> AccountsResult<bool> {
        let password = password.to_string();
        let encoded = encoded.to_string();
        run_blocking(move || {
            use argon2::password_hash::{PasswordHash, PasswordVerifier as _};

            let parsed = PasswordHash::new(&encoded)
                .map_err(|e| AccountsError::InternalServerError(format!("Invalid hash: {e}")))?;
            Ok(argon2::Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        })
        .await
    }
}

/// Bcrypt, kept for verifying hashes created elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    /// Cost used when hashing.
    pub cost: u32,
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[async_trait]
impl PasswordHasher for BcryptHasher {
    fn algorithm(&self) -> &'static str {
        "bcrypt"
    }

    fn recognizes(&self, encoded: &str) -> bool {
        ["$2a$", "$2b$", "$2y$"]
            .iter()
            .any(|prefix| encoded.starts_with(prefix))
    }

    async fn hash(&self, password: &str) -> AccountsResult<String> {
        let password = password.to_string();
        let cost = self.cost;
        run_blocking(move || {
            bcrypt::hash(password, cost)
                .map_err(|e| AccountsError::InternalServerError(format!("Bcrypt hash error: {e}")))
        })
        .await
    }

    async fn verify(&self, password: &str, encoded: &str) -> AccountsResult<bool> {
        let password = password.to_string();
        let encoded = encoded.to_string();
        run_blocking(move || {
            bcrypt::verify(password, &encoded)
                .map_err(|e| AccountsError::InternalServerError(format!("Bcrypt verify error: {e}")))
        })
        .await
    }
}

fn identify_hasher(encoded: &str) -> Option<Box<dyn PasswordHasher>> {
    let candidates: [Box<dyn PasswordHasher>; 2] =
        [Box::new(Argon2Hasher), Box::new(BcryptHasher::default())];
    candidates.into_iter().find(|h| h.recognizes(encoded))
}

/// Hashes a password with Argon2id.
pub async fn make_password(password: &str) -> AccountsResult<String> {
    Argon2Hasher.hash(password).await
}

/// Checks `password` against an encoded hash of any supported algorithm.
///
/// Unusable hashes never match.
pub async fn check_password(password: &str, encoded: &str) -> AccountsResult<bool> {
    if !is_password_usable(encoded) {
        return Ok(false);
    }
    let Some(hasher) = identify_hasher(encoded) else {
        tracing::warn!(
            prefix = %encoded.chars().take(8).collect::<String>(),
            "unknown password hash algorithm"
        );
        return Ok(false);
    };
    hasher.verify(password, encoded).await
}

/// Returns `false` for empty hashes and hashes starting with `!`.
pub fn is_password_usable(encoded: &str) -> bool {
    !encoded.is_empty() && !encoded.starts_with(UNUSABLE_PASSWORD_PREFIX)
}

/// Returns a hash that no password matches.
///
/// The random suffix keeps unusable hashes distinct, so the reset token of
/// one such account tells nothing about another.
pub fn make_unusable_password() -> String {
    format!(
        "{UNUSABLE_PASSWORD_PREFIX}{}",
        get_random_string(UNUSABLE_PASSWORD_SUFFIX_LENGTH)
    )
}

// ── Password Validators ──────────────────────────────────────────────

/// The personal details a password should not resemble.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAttributes {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl UserAttributes {
    fn values(&self) -> [(&'static str, &str); 4] {
        [
            ("username", self.username.as_str()),
            ("email address", self.email.as_str()),
            ("first name", self.first_name.as_str()),
            ("last name", self.last_name.as_str()),
        ]
    }
}

/// A rule a new password must satisfy.
pub trait PasswordValidator: Send + Sync {
    /// Returns an error message if `password` breaks the rule.
    fn validate(&self, password: &str, user: &UserAttributes) -> Result<(), String>;

    /// Describes the rule for help text.
    fn help_text(&self) -> String;
}

/// Rejects passwords shorter than `min_length` characters.
#[derive(Debug, Clone, Copy)]
pub struct MinimumLengthValidator {
    pub min_length: usize,
}

impl Default for MinimumLengthValidator {
    fn default() -> Self {
        Self { min_length: 8 }
    }
}

impl PasswordValidator for MinimumLengthValidator {
    fn validate(&self, password: &str, _user: &UserAttributes) -> Result<(), String> {
        if password.chars().count() < self.min_length {
            return Err(format!(
                "This password is too short. It must contain at least {} characters.",
                self.min_length
            ));
        }
        Ok(())
    }

    fn help_text(&self) -> String {
        format!(
            "Your password must contain at least {} characters.",
            self.min_length
        )
    }
}

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "123456", "1234567", "12345678",
    "123456789", "1234567890", "12345", "1234", "111111", "000000", "123123",
    "654321", "666666", "121212", "qwerty", "qwerty123", "qwertyuiop",
    "asdfgh", "asdfghjkl", "zxcvbnm", "1q2w3e4r", "abc123", "abcd1234",
    "iloveyou", "letmein", "welcome", "welcome1", "monkey", "dragon",
    "baseball", "football", "superman", "batman", "trustno1", "sunshine",
    "princess", "starwars", "whatever", "freedom", "shadow", "master",
    "michael", "jennifer", "jordan", "hunter", "hunter2", "ranger", "buster",
    "thomas", "tigger", "robert", "soccer", "hockey", "charlie", "andrew",
    "michelle", "jessica", "pepper", "daniel", "access", "joshua", "maggie",
    "silver", "william", "dallas", "yankees", "ashley", "hello", "amanda",
    "orange", "computer", "thunder", "nicole", "ginger", "heather", "hammer",
    "summer", "corvette", "taylor", "austin", "merlin", "matthew", "golfer",
    "cheese", "martin", "chelsea", "patrick", "richard", "diamond", "yellow",
    "secret", "sparky", "cowboy", "admin", "administrator", "changeme",
    "passw0rd", "p@ssw0rd", "login", "guest", "test", "default",
];

/// Rejects passwords from a list of commonly used ones (case-insensitive).
#[derive(Debug, Clone)]
pub struct CommonPasswordValidator {
    pub passwords: Vec<String>,
}

impl Default for CommonPasswordValidator {
    fn default() -> Self {
        Self {
            passwords: COMMON_PASSWORDS.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

impl PasswordValidator for CommonPasswordValidator {
    fn validate(&self, password: &str, _user: &UserAttributes) -> Result<(), String> {
        let lower = password.trim().to_lowercase();
        if self.passwords.iter().any(|p| *p == lower) {
            return Err("This password is too common.".to_string());
        }
        Ok(())
    }

    fn help_text(&self) -> String {
        "Your password can’t be a commonly used password.".to_string()
    }
}

/// Rejects passwords made only of digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericPasswordValidator;

impl PasswordValidator for NumericPasswordValidator {
    fn validate(&self, password: &str, _user: &UserAttributes) -> Result<(), String> {
        if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
            return Err("This password is entirely numeric.".to_string());
        }
        Ok(())
    }

    fn help_text(&self) -> String {
        "Your password can’t be entirely numeric.".to_string()
    }
}

/// Rejects passwords too close to the user's username, email or name.
///
/// Each attribute is compared whole and split on non-alphanumeric
/// characters, so `alice.smith@example.com` also checks `alice` and `smith`.
#[derive(Debug, Clone, Copy)]
pub struct UserAttributeSimilarityValidator {
    /// Similarity ratio (0.0 to 1.0) at which a password is rejected.
    pub max_similarity: f64,
}

impl Default for UserAttributeSimilarityValidator {
    fn default() -> Self {
        Self {
            max_similarity: 0.7,
        }
    }
}

impl PasswordValidator for UserAttributeSimilarityValidator {
    fn validate(&self, password: &str, user: &UserAttributes) -> Result<(), String> {
        let password = password.to_lowercase();
        for (label, value) in user.values() {
            if value.is_empty() {
                continue;
            }
            let value = value.to_lowercase();
            let parts = std::iter::once(value.as_str()).chain(
                value
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|part| part.chars().count() >= 3),
            );
            for part in parts {
                if similarity(&password, part) >= self.max_similarity {
                    return Err(format!("The password is too similar to the {label}."));
                }
            }
        }
        Ok(())
    }

    fn help_text(&self) -> String {
        "Your password can’t be too similar to your other personal information.".to_string()
    }
}

/// Ratio of twice the longest common subsequence to the combined length.
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    #[allow(clippy::cast_precision_loss)]
    let ratio = (2 * prev[b.len()]) as f64 / (a.len() + b.len()) as f64;
    ratio
}

/// Returns the validators applied to every new password.
pub fn default_validators() -> Vec<Box<dyn PasswordValidator>> {
    vec![
        Box::new(UserAttributeSimilarityValidator::default()),
        Box::new(MinimumLengthValidator::default()),
        Box::new(CommonPasswordValidator::default()),
        Box::new(NumericPasswordValidator),
    ]
}

/// Runs every default validator and collects all messages.
pub fn validate_password(password: &str, user: &UserAttributes) -> Result<(), Vec<String>> {
    let errors: Vec<String> = default_validators()
        .iter()
        .filter_map(|v| v.validate(password, user).err())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Help text for a new-password input.
pub fn password_validators_help_text() -> Vec<String> {
    default_validators().iter().map(|v| v.help_text()).collect()
}
