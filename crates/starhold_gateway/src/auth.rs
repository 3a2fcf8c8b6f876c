//! Credential verification: password hashing happens
//! here, one layer above `starhold_sim::Engine`, which never sees a raw
//! password — it only stores and compares hashes. Per-IP sliding-minute
//! rate limits on login/register reuse [`crate::security::rate_limiter::RateLimiter`]'s
//! token-bucket implementation.

use crate::config::ServerConfig;
use crate::security::rate_limiter::RateLimiter;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use starhold_core::{GameError, GameResult};
use std::net::IpAddr;
use std::time::Duration;

pub struct AuthService {
    login_limiter: RateLimiter,
    register_limiter: RateLimiter,
}

impl AuthService {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            login_limiter: RateLimiter::new(config.login_rate_limit_per_min, Duration::from_secs(60)),
            register_limiter: RateLimiter::new(config.register_rate_limit_per_min, Duration::from_secs(60)),
        }
    }

    pub async fn check_login_rate(&self, ip: IpAddr) -> GameResult<()> {
        if self.login_limiter.check_rate_limit(ip).await {
            Ok(())
        } else {
            Err(GameError::Auth("Rate limited".to_string()))
        }
    }

    pub async fn check_register_rate(&self, ip: IpAddr) -> GameResult<()> {
        if self.register_limiter.check_rate_limit(ip).await {
            Ok(())
        } else {
            Err(GameError::Auth("Rate limited".to_string()))
        }
    }

    /// Hashes a raw password with Argon2 (the "standard password KDF"
    /// treated as an assumed external primitive).
    pub fn hash_password(&self, password: &str) -> GameResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| GameError::Internal(format!("password hashing failed: {e}")))
    }

    /// Verifies `password` against a stored hash. Never distinguishes
    /// "user not found" from "wrong password" to the caller — both map to
    /// a generic "Invalid credentials".
    pub fn verify_password(&self, password: &str, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_roundtrips() {
        let config = ServerConfig::default();
        let auth = AuthService::new(&config);
        let hash = auth.hash_password("correct horse battery staple").unwrap();
        assert!(auth.verify_password("correct horse battery staple", &hash));
        assert!(!auth.verify_password("wrong password", &hash));
    }
}
