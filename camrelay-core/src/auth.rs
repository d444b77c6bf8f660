// Login collaborator: single-password verification against hashes stored
// in the environment (`PASS_HASH_AR` for argon2, `PASS_HASH_BC` for
// bcrypt). No sessions or tokens are issued.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tokio::task;
use tracing::warn;

use crate::config::AuthConfig;
use crate::{Error, Result};

/// Verifies the relay password against environment-stored hashes.
///
/// Either hash matching authorizes; a missing variable just disables that
/// scheme. Verification is CPU-heavy and runs on a blocking thread.
pub struct PasswordGate {
    argon2_hash: Option<String>,
    bcrypt_hash: Option<String>,
}

impl PasswordGate {
    /// Read the hash environment variables named in `config`.
    #[must_use]
    pub fn from_env(config: &AuthConfig) -> Self {
        let argon2_hash = std::env::var(&config.argon2_hash_env).ok();
        let bcrypt_hash = std::env::var(&config.bcrypt_hash_env).ok();
        if argon2_hash.is_none() && bcrypt_hash.is_none() {
            warn!(
                "neither {} nor {} is set; login is disabled",
                config.argon2_hash_env, config.bcrypt_hash_env
            );
        }
        Self {
            argon2_hash,
            bcrypt_hash,
        }
    }

    #[cfg(test)]
    fn with_hashes(argon2_hash: Option<String>, bcrypt_hash: Option<String>) -> Self {
        Self {
            argon2_hash,
            bcrypt_hash,
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.argon2_hash.is_some() || self.bcrypt_hash.is_some()
    }

    /// Verify a submitted password against whichever hashes are configured.
    pub async fn verify(&self, password: &str) -> Result<bool> {
        let password = password.to_string();
        let argon2_hash = self.argon2_hash.clone();
        let bcrypt_hash = self.bcrypt_hash.clone();

        task::spawn_blocking(move || {
            if let Some(hash) = argon2_hash {
                if verify_argon2(&password, &hash)? {
                    return Ok(true);
                }
            }
            if let Some(hash) = bcrypt_hash {
                if verify_bcrypt(&password, &hash)? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .await
        .map_err(|e| Error::Internal(format!("Password verification task failed: {e}")))?
    }
}

/// Hash a password with Argon2id and default parameters, in PHC format.
/// Used to provision `PASS_HASH_AR`.
pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();

    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("Failed to hash password: {e}")))?
            .to_string();
        Ok(hash)
    })
    .await
    .map_err(|e| Error::Internal(format!("Password hashing task failed: {e}")))?
}

fn verify_argon2(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| Error::Internal(format!("Invalid argon2 hash format: {e}")))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::Internal(format!(
            "Password verification failed: {e}"
        ))),
    }
}

fn verify_bcrypt(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash)
        .map_err(|e| Error::Internal(format!("Invalid bcrypt hash: {e}")))
}
