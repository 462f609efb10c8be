//! Password hashing.
//!
//! Stored form: `sha256$<iterations>$<salt hex>$<hash hex>`.

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 8;

const SCHEME: &str = "sha256";
const ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;

/// Well-formed hash that no password derives to. Unknown accounts are
/// checked against it so a failed login costs the same either way.
const UNKNOWN_ACCOUNT_HASH: &str = concat!(
    "sha256$100000$",
    "00000000000000000000000000000000$",
    "0000000000000000000000000000000000000000000000000000000000000000"
);

/// Rejects passwords shorter than [`MIN_PASSWORD_LEN`] characters.
pub fn check_password_strength(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Hashes a password with a fresh random salt.
pub fn hash_password(password: &str) -> AppResult<String> {
    check_password_strength(password)?;

    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = derive(password, &salt, ITERATIONS);

    Ok(format!(
        "{}${}${}${}",
        SCHEME,
        ITERATIONS,
        hex::encode(salt),
        hex::encode(digest)
    ))
}

/// Checks a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }

    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
        return false;
    };
    if iterations == 0 {
        return false;
    }

    constant_time_eq(&derive(password, &salt, iterations), &expected)
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_async(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

/// Checks a login attempt on the blocking pool. `stored` is `None` when no
/// account matched; the check still runs and always fails.
pub async fn verify_login(password: String, stored: Option<String>) -> AppResult<bool> {
    let matched = tokio::task::spawn_blocking(move || match stored {
        Some(hash) => verify_password(&password, &hash),
        None => {
            let _ = verify_password(&password, UNKNOWN_ACCOUNT_HASH);
            false
        }
    })
    .await?;
    Ok(matched)
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let mut digest: [u8; 32] = hasher.finalize().into();

    for _ in 1..iterations {
        let mut hasher = Sha256::new();
        hasher.update(digest);
        hasher.update(salt);
        digest = hasher.finalize().into();
    }
    digest
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
