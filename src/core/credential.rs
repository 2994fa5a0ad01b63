//! # Credential Verification
//!
//! The shared secret is hashed exactly once, at startup, with Argon2id.
//! Every submit afterwards verifies the typed attempt against that stored
//! PHC string. The plain secret is dropped as soon as the hash exists.
//!
//! ```text
//! PASSWORD ──hash once──▶ Argon2Verifier { phc }
//!                               │
//!            attempt ──verify──▶ Ok(true) / Ok(false) / Err(_)
//! ```
//!
//! The [`Verifier`] trait is the seam the session model depends on, so tests
//! can swap in verifiers that always fail or always error.

use std::fmt;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

/// Memory cost in KiB (19 MiB, the OWASP baseline for Argon2id).
pub const DEFAULT_MEMORY_COST: u32 = 19456;
pub const DEFAULT_TIME_COST: u32 = 2;
pub const DEFAULT_PARALLELISM: u32 = 1;

#[derive(Debug)]
pub enum CredentialError {
    /// The configured secret is empty.
    EmptySecret,
    /// Argon2 rejected its parameters.
    Params(String),
    /// Hashing the secret failed.
    Hash(String),
    /// The stored hash could not be parsed or the verifier itself failed.
    Verify(String),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::EmptySecret => write!(f, "shared secret is empty"),
            CredentialError::Params(msg) => write!(f, "invalid argon2 parameters: {msg}"),
            CredentialError::Hash(msg) => write!(f, "failed to hash secret: {msg}"),
            CredentialError::Verify(msg) => write!(f, "credential check failed: {msg}"),
        }
    }
}

impl std::error::Error for CredentialError {}

/// One-way credential check shared by every session.
///
/// `Ok(false)` is a wrong attempt. `Err(_)` means the check itself broke;
/// callers must treat it as a failed attempt, never as a match.
pub trait Verifier: Send + Sync {
    fn verify(&self, attempt: &str) -> Result<bool, CredentialError>;
}

/// Argon2id verifier holding the PHC-encoded hash of the shared secret.
pub struct Argon2Verifier {
    phc: String,
    argon2: Argon2<'static>,
}

impl Argon2Verifier {
    /// Hash `secret` with the default cost parameters.
    pub fn from_secret(secret: &str) -> Result<Self, CredentialError> {
        Self::with_params(
            secret,
            DEFAULT_MEMORY_COST,
            DEFAULT_TIME_COST,
            DEFAULT_PARALLELISM,
        )
    }

    pub fn with_params(
        secret: &str,
        memory_cost: u32,
        time_cost: u32,
        parallelism: u32,
    ) -> Result<Self, CredentialError> {
        if secret.is_empty() {
            return Err(CredentialError::EmptySecret);
        }
        let params = Params::new(memory_cost, time_cost, parallelism, None)
            .map_err(|e| CredentialError::Params(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let salt = SaltString::generate(&mut OsRng);
        let phc = argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hash(e.to_string()))?
            .to_string();
        Ok(Self { phc, argon2 })
    }

    /// The stored PHC string (`$argon2id$v=19$...`).
    pub fn phc(&self) -> &str {
        &self.phc
    }
}

impl Verifier for Argon2Verifier {
    fn verify(&self, attempt: &str) -> Result<bool, CredentialError> {
        let parsed =
            PasswordHash::new(&self.phc).map_err(|e| CredentialError::Verify(e.to_string()))?;
        match self.argon2.verify_password(attempt.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::Verify(e.to_string())),
        }
    }
}

impl fmt::Debug for Argon2Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Argon2Verifier").finish_non_exhaustive()
    }
}
