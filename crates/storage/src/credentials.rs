//! Credential checks and password hashing for the local account store.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use uuid::Uuid;

use crate::repository::StorageError;

const MIN_PASSWORD_LEN: usize = 6;

/// Normalizes an e-mail for lookups and rejects obviously invalid input.
///
/// # Errors
///
/// Returns `StorageError::Invalid` for empty or `@`-less addresses.
pub fn normalize_email(email: &str) -> Result<String, StorageError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(StorageError::Invalid(format!("invalid e-mail address: {email:?}"))),
    }
}

/// # Errors
///
/// Returns `StorageError::Invalid` if the password is shorter than six characters.
pub fn check_password_strength(password: &str) -> Result<(), StorageError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(StorageError::Invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Hashes `password` with Argon2id and a fresh random salt.
///
/// The result is a PHC string (`$argon2id$v=19$...`) that carries its own
/// parameters and salt.
///
/// # Errors
///
/// Returns `StorageError::Invalid` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, StorageError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| StorageError::Invalid(format!("failed to build salt: {e}")))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| StorageError::Invalid(format!("failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Checks `password` against a value produced by `hash_password`.
///
/// Malformed stored values never verify.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_same_password() {
        let stored = hash_password("hunter22").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &stored));
        assert!(!verify_password("hunter23", &stored));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(
            hash_password("same-pass").unwrap(),
            hash_password("same-pass").unwrap()
        );
    }

    #[test]
    fn verify_rejects_malformed_hashes() {
        assert!(!verify_password("x", "plain"));
        assert!(!verify_password("x", "md5$1$salt$abc"));
        assert!(!verify_password("x", "$argon2id$v=19$m=65536,t=2,p=1$salt$hash"));
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ann@Example.COM ").unwrap(), "ann@example.com");
        assert!(normalize_email("nobody").is_err());
        assert!(normalize_email("@example.com").is_err());
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(check_password_strength("12345").is_err());
        assert!(check_password_strength("123456").is_ok());
    }
}
