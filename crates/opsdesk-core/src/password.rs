//! Password hashing with bcrypt.

use std::sync::LazyLock;

use anyhow::anyhow;
use bcrypt::{DEFAULT_COST, hash, verify};

use crate::errors::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::internal(anyhow!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::internal(anyhow!("Failed to verify password: {}", e)))
}

/// Hashed once at the same cost as stored hashes.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash("opsdesk-unmatched-password", DEFAULT_COST).ok());

/// Runs a full bcrypt check that never matches. Used when there is no stored
/// hash to check against, so an unknown account takes as long to refuse as a
/// wrong password.
pub fn verify_dummy_password(password: &str) -> bool {
    DUMMY_HASH
        .as_deref()
        .is_some_and(|dummy| verify(password, dummy).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_dummy_check_does_real_work_and_never_matches() {
        let dummy = DUMMY_HASH.as_deref().unwrap();
        assert!(dummy.starts_with(&format!("$2b${:02}$", DEFAULT_COST)));
        assert!(!verify_dummy_password("opsdesk-anything"));
        assert!(!verify_dummy_password(""));
    }

    #[test]
    fn test_verify_invalid_hash_errors() {
        assert!(verify_password("anything", "not_a_bcrypt_hash").is_err());
    }
}
