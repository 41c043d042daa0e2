use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use sha2::Sha256;
use thiserror::Error;
use tracing::error;

use crate::error::AppError;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("PASSWORD_PEPPER is not configured")]
    MissingPepper,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        AppError::Internal(anyhow::Error::new(e))
    }
}

/// Keyed pre-hash: HMAC-SHA256(pepper, plain) as 64 hex chars.
fn pepper(plain: &str, pepper: Option<&str>) -> Result<String, PasswordError> {
    let secret = pepper
        .filter(|p| !p.is_empty())
        .ok_or(PasswordError::MissingPepper)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    mac.update(plain.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn hash_password(plain: &str, pepper_secret: Option<&str>) -> Result<String, PasswordError> {
    let peppered = pepper(plain, pepper_secret)?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(peppered.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            PasswordError::Hash(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(
    plain: &str,
    hash: &str,
    pepper_secret: Option<&str>,
) -> Result<bool, PasswordError> {
    let peppered = pepper(plain, pepper_secret)?;
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        PasswordError::MalformedHash(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(peppered.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEPPER: Option<&str> = Some("server-pepper");

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password, PEPPER).expect("hashing should succeed");
        assert!(verify_password(password, &hash, PEPPER).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("correct-horse-battery-staple", PEPPER).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash, PEPPER).expect("verify should not error"));
    }

    #[test]
    fn verify_rejects_other_pepper() {
        let hash = hash_password("same-password", PEPPER).expect("hashing should succeed");
        assert!(!verify_password("same-password", &hash, Some("rotated")).unwrap());
    }

    #[test]
    fn missing_pepper_is_a_configuration_error() {
        assert!(matches!(
            hash_password("anything", None),
            Err(PasswordError::MissingPepper)
        ));
        assert!(matches!(
            hash_password("anything", Some("")),
            Err(PasswordError::MissingPepper)
        ));
        assert!(matches!(
            verify_password("anything", "$argon2id$whatever", None),
            Err(PasswordError::MissingPepper)
        ));
    }

    #[test]
    fn stored_hash_is_salted_argon2id() {
        let a = hash_password("pw-12345678", PEPPER).unwrap();
        let b = hash_password("pw-12345678", PEPPER).unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash", PEPPER).unwrap_err();
        assert!(matches!(err, PasswordError::MalformedHash(_)));
    }
}
