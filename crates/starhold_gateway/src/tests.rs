#[cfg(test)]
mod tests {
    use crate::config::ServerConfig;
    use crate::connection::ConnectionManager;
    use crate::session::SessionManager;
    use starhold_core::{AuthenticationStatus, UserId};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.connection_timeout_secs, 60);
        assert_eq!(config.tick_interval_ms, starhold_core::constants::TICK_MS);
        assert_eq!(config.login_rate_limit_per_min, 10);
        assert_eq!(config.register_rate_limit_per_min, 5);
    }

    #[test]
    fn new_connection_starts_unauthenticated() {
        let connections = ConnectionManager::new();
        let (tx, _rx) = mpsc::channel::<Message>(8);
        let id = connections.add_connection(addr(), tx);

        assert_eq!(connections.auth_status(id), Some(AuthenticationStatus::Unauthenticated));
        assert_eq!(connections.user_of(id), None);
    }

    #[test]
    fn authenticate_links_connection_and_user() {
        let connections = ConnectionManager::new();
        let (tx, _rx) = mpsc::channel::<Message>(8);
        let id = connections.add_connection(addr(), tx);

        connections.authenticate(id, UserId(42));

        assert_eq!(connections.auth_status(id), Some(AuthenticationStatus::Authenticated));
        assert_eq!(connections.user_of(id), Some(UserId(42)));
        assert_eq!(connections.connection_of_user(UserId(42)), Some(id));
    }

    #[test]
    fn removing_a_connection_clears_the_user_index() {
        let connections = ConnectionManager::new();
        let (tx, _rx) = mpsc::channel::<Message>(8);
        let id = connections.add_connection(addr(), tx);
        connections.authenticate(id, UserId(1));

        let removed_user = connections.remove_connection(id);

        assert_eq!(removed_user, Some(UserId(1)));
        assert_eq!(connections.connection_of_user(UserId(1)), None);
        assert_eq!(connections.connection_count(), 0);
    }

    #[test]
    fn full_outbound_queue_reports_backpressure() {
        let connections = ConnectionManager::new();
        let (tx, _rx) = mpsc::channel::<Message>(1);
        let id = connections.add_connection(addr(), tx);

        assert!(connections.try_send(id, Message::Text("first".into())));
        assert!(!connections.try_send(id, Message::Text("second".into())));
    }

    #[test]
    fn session_round_trips_through_its_string_form() {
        let sessions = SessionManager::new(Duration::from_secs(60));
        let token = sessions.create(UserId(9), "nova".to_string());

        let parsed: crate::session::SessionToken = token.to_string().parse().expect("valid hex token");
        let (user_id, username) = sessions.validate(parsed).expect("token still valid");

        assert_eq!(user_id, UserId(9));
        assert_eq!(username, "nova");
    }
}
