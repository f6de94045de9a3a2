//! Password hashing and session tokens
//!
//! Passwords are stored as a salted, iterated SHA-256 digest together with
//! the salt. Session tokens are random; only their SHA-256 is persisted.

use crate::{Error, Result};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Hash rounds applied to every password
const PASSWORD_ROUNDS: u32 = 10_000;

/// Salt length in bytes
const SALT_LEN: usize = 16;

/// Session token length in bytes
const TOKEN_LEN: usize = 32;

/// Minimum password length in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Stored form of a password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub hash: String,
    pub salt: String,
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    to_hex(&bytes)
}

fn derive(password: &str, salt: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();

    for _ in 1..PASSWORD_ROUNDS {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt.as_bytes())
            .chain_update(password.as_bytes())
            .finalize();
    }

    format!("{:x}", digest)
}

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> PasswordHash {
    let salt = random_hex(SALT_LEN);
    let hash = derive(password, &salt);
    PasswordHash { hash, salt }
}

/// Check a password against a stored hash (constant time over the digest)
pub fn verify_password(password: &str, stored: &PasswordHash) -> bool {
    let candidate = derive(password, &stored.salt);
    constant_time_eq(candidate.as_bytes(), stored.hash.as_bytes())
}

/// Byte comparison whose duration does not depend on where inputs differ
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Enforce the password policy
///
/// At least [`MIN_PASSWORD_LEN`] characters with at least one letter and
/// one digit.
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if !password.chars().any(char::is_alphabetic) || !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidInput(
            "Password must contain letters and digits".to_string(),
        ));
    }
    Ok(())
}

/// Generate a new session token (64 hex chars)
pub fn generate_token() -> String {
    random_hex(TOKEN_LEN)
}

/// Digest under which a token is stored
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Normalize and validate an email address
///
/// Trims and lowercases; requires a non-empty local part and a domain
/// containing a dot that neither starts nor ends the domain.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let invalid = || Error::InvalidInput(format!("Invalid email address: {}", email));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }

    Ok(email)
}
