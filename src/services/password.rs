//! Argon2id password hashing.

use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::models::PasswordHash;

/// Hash a password using Argon2id with the configured cost parameters.
///
/// Used to provision user records; the result is a PHC string.
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None,
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Verify `password` against a stored PHC string.
///
/// Runs on the blocking pool. The parameters are read from the PHC string,
/// so hashes produced under older cost settings still verify.
pub async fn verify_password(password: &str, hash: &PasswordHash) -> Result<bool> {
    let password_hash = hash.expose().to_string();
    let password = password.to_string();

    task::spawn_blocking(move || {
        let parsed_hash = argon2::PasswordHash::new(&password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

        Ok::<bool, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await
    .context("Password verification task panicked")?
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Cheap parameters so tests do not spend seconds hashing.
    pub(crate) fn fast_params() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 64,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
        }
    }

    #[tokio::test]
    async fn hash_then_verify() {
        let phc = hash_password("correct-password", &fast_params()).unwrap();
        assert!(phc.starts_with("$argon2id$"));

        let hash = PasswordHash::new(phc);
        assert!(verify_password("correct-password", &hash).await.unwrap());
        assert!(!verify_password("wrong-password", &hash).await.unwrap());
    }

    #[test]
    fn salts_differ() {
        let a = hash_password("same", &fast_params()).unwrap();
        let b = hash_password("same", &fast_params()).unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        let hash = PasswordHash::new("not-a-phc-string".to_string());
        assert!(verify_password("anything", &hash).await.is_err());
    }

    #[test]
    fn rejects_invalid_params() {
        let config = SecurityConfig {
            argon2_memory_cost_kib: 1,
            ..fast_params()
        };
        assert!(hash_password("x", &config).is_err());
    }
}
