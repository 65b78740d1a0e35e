//! Small cryptographic helpers: random strings, salted HMACs and
//! constant-time comparison.

use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Returns a random string of `length` characters drawn from `[a-zA-Z0-9]`.
///
/// # Examples
///
/// ```
/// use accounts_core::crypto::get_random_string;
///
/// let code = get_random_string(20);
/// assert_eq!(code.len(), 20);
/// assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn get_random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Computes HMAC-SHA256 of `value`, keyed by `SHA256(key_salt + secret)`.
///
/// Different `key_salt`s give independent MACs under the same secret, so a
/// value signed for one purpose can't be replayed for another.
pub fn salted_hmac(key_salt: &str, value: &str, secret: &str) -> Vec<u8> {
    let key = Sha256::digest(format!("{key_salt}{secret}").as_bytes());
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(&key).expect("HMAC accepts any key size");
    mac.update(value.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Hex-encoded [`salted_hmac`].
pub fn salted_hmac_hex(key_salt: &str, value: &str, secret: &str) -> String {
    hex::encode(salted_hmac(key_salt, value, secret))
}

/// Compares two byte strings in time independent of where they differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
