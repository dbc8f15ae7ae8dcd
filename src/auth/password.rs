/// Credential Verifier
///
/// bcrypt hashing and verification. Comparison is salted and
/// constant-time inside bcrypt; plaintext equality never happens here.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::AppError;

/// Hash a password using bcrypt.
///
/// Registration lives with an external collaborator; this stays public
/// for it and for test seeding.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its stored hash.
///
/// Returns Ok(false) for a wrong password; Err only when the hash
/// itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_not_plaintext() {
        let password = "CorrectHorse1";
        let hashed = hash_password(password).expect("Failed to hash password");

        assert_ne!(password, hashed);
        assert!(hashed.starts_with("$2"));
    }

    #[test]
    fn correct_password_verifies() {
        let password = "CorrectHorse1";
        let hashed = hash_password(password).expect("Failed to hash password");

        assert!(verify_password(password, &hashed).expect("Failed to verify password"));
    }

    #[test]
    fn wrong_password_does_not_verify() {
        let hashed = hash_password("CorrectHorse1").expect("Failed to hash password");

        assert!(!verify_password("WrongHorse1", &hashed).expect("Failed to verify password"));
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-bcrypt-hash").is_err());
    }
}
