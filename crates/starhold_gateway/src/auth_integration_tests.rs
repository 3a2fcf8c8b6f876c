//! Integration tests for the register/login credential flow, independent
//! of a live database: [`AuthService`] only ever sees hashes and rate
//! limit counters, never [`starhold_sim::Engine`] or [`Store`].

#[cfg(test)]
mod tests {
    use crate::auth::AuthService;
    use crate::config::ServerConfig;
    use std::net::{IpAddr, Ipv4Addr};

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
    }

    #[tokio::test]
    async fn login_rate_limit_trips_after_the_configured_count() {
        let config = ServerConfig {
            login_rate_limit_per_min: 3,
            ..Default::default()
        };
        let auth = AuthService::new(&config);

        for _ in 0..3 {
            assert!(auth.check_login_rate(ip()).await.is_ok());
        }
        assert!(auth.check_login_rate(ip()).await.is_err());
    }

    #[tokio::test]
    async fn register_rate_limit_is_tracked_independently_of_login() {
        let config = ServerConfig {
            login_rate_limit_per_min: 1,
            register_rate_limit_per_min: 2,
            ..Default::default()
        };
        let auth = AuthService::new(&config);

        assert!(auth.check_login_rate(ip()).await.is_ok());
        assert!(auth.check_login_rate(ip()).await.is_err());

        // Register has its own budget and is unaffected by login's.
        assert!(auth.check_register_rate(ip()).await.is_ok());
        assert!(auth.check_register_rate(ip()).await.is_ok());
        assert!(auth.check_register_rate(ip()).await.is_err());
    }

    #[tokio::test]
    async fn hashed_password_never_matches_a_different_password() {
        let auth = AuthService::new(&ServerConfig::default());
        let hash = auth.hash_password("hunter2").expect("hashing succeeds");

        assert!(auth.verify_password("hunter2", &hash));
        assert!(!auth.verify_password("hunter3", &hash));
        assert!(!auth.verify_password("", &hash));
    }

    #[tokio::test]
    async fn garbage_stored_hash_fails_closed() {
        let auth = AuthService::new(&ServerConfig::default());
        assert!(!auth.verify_password("anything", "not-a-real-argon2-hash"));
    }
}
