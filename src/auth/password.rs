use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::HashConfig;

/// One-way salted password hashing. `verify` is the only way to compare a
/// candidate password with a stored hash.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> anyhow::Result<String>;

    fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool>;

    /// A valid hash that matches no real password. Verified against when a
    /// username is unknown so both rejection paths do the same work.
    fn decoy_hash(&self) -> &str;
}

#[derive(Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
    decoy: String,
}

impl Argon2Hasher {
    pub fn new(cfg: &HashConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let decoy = hash_with(&argon2, "doorman-decoy-password")?;
        Ok(Self { argon2, decoy })
    }
}

fn hash_with(argon2: &Argon2<'_>, plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        hash_with(&self.argon2, plain)
    }

    fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self
            .argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    fn decoy_hash(&self) -> &str {
        &self.decoy
    }
}

/// Hash on the blocking pool; Argon2 is deliberately slow.
pub async fn hash_off_thread(hasher: Arc<dyn PasswordHasher>, plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hasher.hash(&plain)).await?
}

pub async fn verify_off_thread(
    hasher: Arc<dyn PasswordHasher>,
    plain: String,
    hash: String,
) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash)).await?
}

#[cfg(test)]
pub(crate) fn test_hasher() -> Argon2Hasher {
    let cfg = HashConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    };
    Argon2Hasher::new(&cfg).expect("cheap argon2 params are valid")
}
