//! Per-connection WebSocket handling (C5): the read/write loop, the
//! UNAUTH/AUTH state machine, and the translation between
//! wire `Envelope`s and [`starhold_sim::Engine`] calls. No game rule
//! lives here — only decoding, auth, rate limits, and dispatch.

use crate::error::ServerError;
use crate::server::core::GameServer;
use crate::session::SessionToken;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use starhold_core::protocol::{events, AuthSuccess, Envelope, ErrorPayload};
use starhold_core::{AuthenticationStatus, GameError, UserId};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, trace, warn};

/// Events accepted from a connection that has not yet authenticated,
/// while unauthenticated.
fn is_unauth_event(event: &str) -> bool {
    matches!(event, "auth:register" | "auth:login" | "auth:validate" | "ping")
}

/// Rejects malformed `event` strings before they reach dispatch. `ping`
/// carries no namespace, so it is checked directly against
/// `validate_event_name`; everything else is split on the first `:` and
/// each half is checked with the matching validator.
fn is_well_formed_event(event: &str) -> bool {
    use crate::security::input_validation::{validate_event_name, validate_namespace};

    if event == "ping" {
        return validate_event_name(event).is_ok();
    }
    match event.split_once(':') {
        Some((namespace, name)) => validate_namespace(namespace).is_ok() && validate_event_name(name).is_ok(),
        None => validate_event_name(event).is_ok(),
    }
}

/// Handles one client connection end to end: handshake, the read/write
/// task pair, and cleanup on disconnect.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server: Arc<GameServer>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(server.config.outbound_queue_capacity);
    let connection_id = server.connections.add_connection(addr, outbound_tx);
    server.monitor.connection_opened();

    let writer = async move {
        while let Some(message) = outbound_rx.recv().await {
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
    };

    let reader = async {
        loop {
            let Some(msg) = ws_receiver.next().await else { break };
            match msg {
                Ok(Message::Text(text)) => {
                    if let Err(e) = server.security.validate_message(addr.ip(), text.as_bytes()).await {
                        trace!(%connection_id, "rejected message: {e}");
                        continue;
                    }
                    handle_envelope(&server, connection_id, addr, &text).await;
                }
                Ok(Message::Close(_)) => {
                    debug!(%connection_id, "client requested close");
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Binary(_)) => {
                    trace!(%connection_id, "ignoring binary frame");
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    warn!(%connection_id, "websocket error: {e}");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = reader => {},
        _ = writer => {},
    }

    cleanup_connection(&server, connection_id).await;
    Ok(())
}

async fn cleanup_connection(server: &Arc<GameServer>, connection_id: crate::connection::ConnectionId) {
    server.monitor.connection_closed();
    if let Some(user_id) = server.connections.remove_connection(connection_id) {
        for outbound in server.engine.disconnect(user_id).await {
            server.deliver_outbound(outbound);
        }
    }
}

async fn handle_envelope(
    server: &Arc<GameServer>,
    connection_id: crate::connection::ConnectionId,
    addr: SocketAddr,
    text: &str,
) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(_) => return, // malformed payload: logged-and-ignored, never echoed back
    };

    if !is_well_formed_event(&envelope.event) {
        trace!(%connection_id, event = %envelope.event, "protocol error: malformed event name");
        return;
    }

    if envelope.event == "ping" {
        reply(server, connection_id, Envelope::new("pong", json!({ "timestamp": envelope.data })));
        return;
    }

    let is_authed = server.connections.auth_status(connection_id) == Some(AuthenticationStatus::Authenticated);

    if !is_authed {
        if !is_unauth_event(&envelope.event) {
            trace!(%connection_id, event = %envelope.event, "protocol error: event not allowed before auth");
            return;
        }
        handle_unauth_event(server, connection_id, addr, envelope).await;
        return;
    }

    let Some(user_id) = server.connections.user_of(connection_id) else { return };
    match server.engine.handle_command(user_id, envelope).await {
        Ok(outbound) => {
            for item in outbound {
                server.deliver_outbound(item);
            }
        }
        Err(e) if e.is_silent() => {}
        Err(e) => reply(server, connection_id, error_envelope(&e)),
    }
}

async fn handle_unauth_event(
    server: &Arc<GameServer>,
    connection_id: crate::connection::ConnectionId,
    addr: SocketAddr,
    envelope: Envelope,
) {
    let result = match envelope.event.as_str() {
        "auth:register" => handle_register(server, connection_id, addr, envelope).await,
        "auth:login" => handle_login(server, connection_id, addr, envelope).await,
        "auth:validate" => handle_validate(server, connection_id, envelope).await,
        _ => return,
    };
    if let Err(e) = result {
        reply(server, connection_id, Envelope::new("auth:error", ErrorPayload::new(e.client_message())));
    }
}

async fn handle_register(
    server: &Arc<GameServer>,
    connection_id: crate::connection::ConnectionId,
    addr: SocketAddr,
    envelope: Envelope,
) -> Result<(), GameError> {
    server.auth.check_register_rate(addr.ip()).await?;
    let req: events::AuthCredentials = serde_json::from_value(envelope.data)
        .map_err(|e| GameError::Validation(format!("Invalid register payload: {e}")))?;
    if !starhold_core::constants::is_valid_password(&req.password) {
        return Err(GameError::Validation("Invalid password".to_string()));
    }
    let hash = server.auth.hash_password(&req.password)?;
    let player = server.engine.register(&req.username, &hash).await?;
    finish_auth(server, connection_id, UserId(player.id), req.username, player);
    Ok(())
}

async fn handle_login(
    server: &Arc<GameServer>,
    connection_id: crate::connection::ConnectionId,
    addr: SocketAddr,
    envelope: Envelope,
) -> Result<(), GameError> {
    server.auth.check_login_rate(addr.ip()).await?;
    let req: events::AuthCredentials = serde_json::from_value(envelope.data)
        .map_err(|e| GameError::Validation(format!("Invalid login payload: {e}")))?;

    let (user_id, stored_hash) = server.engine.credentials_for_login(&req.username).await?;
    if !server.auth.verify_password(&req.password, &stored_hash) {
        return Err(GameError::Auth("Invalid credentials".to_string()));
    }
    let player = if server.engine.is_active(user_id) {
        server.engine.player_payload(user_id).expect("just checked is_active")
    } else {
        server.engine.spawn_session(user_id, req.username.clone()).await?
    };
    finish_auth(server, connection_id, user_id, req.username, player);
    Ok(())
}

async fn handle_validate(
    server: &Arc<GameServer>,
    connection_id: crate::connection::ConnectionId,
    envelope: Envelope,
) -> Result<(), GameError> {
    let req: events::AuthValidate = serde_json::from_value(envelope.data)
        .map_err(|e| GameError::Validation(format!("Invalid validate payload: {e}")))?;
    let token: SessionToken = req
        .token
        .parse()
        .map_err(|_| GameError::Auth("Token missing or malformed".to_string()))?;
    let (user_id, username) = server.sessions.validate(token).ok_or_else(|| GameError::Auth("Token expired".to_string()))?;

    let player = if server.engine.is_active(user_id) {
        server.engine.player_payload(user_id).expect("just checked is_active")
    } else {
        server.engine.spawn_session(user_id, username).await?
    };
    server.connections.authenticate(connection_id, user_id);
    reply(server, connection_id, Envelope::new("auth:success", AuthSuccess { token: req.token, player }));
    Ok(())
}

fn finish_auth(
    server: &Arc<GameServer>,
    connection_id: crate::connection::ConnectionId,
    user_id: UserId,
    username: String,
    player: starhold_core::protocol::PlayerPayload,
) {
    let token = server.sessions.create(user_id, username);
    server.connections.authenticate(connection_id, user_id);
    reply(
        server,
        connection_id,
        Envelope::new("auth:success", AuthSuccess { token: token.to_string(), player }),
    );
}

fn error_envelope(error: &GameError) -> Envelope {
    let name = match error {
        GameError::Auth(_) => "auth:error",
        _ => "command:error",
    };
    Envelope::new(name, ErrorPayload::new(error.client_message()))
}

fn reply(server: &Arc<GameServer>, connection_id: crate::connection::ConnectionId, envelope: Envelope) {
    if let Ok(text) = serde_json::to_string(&envelope) {
        if !server.connections.try_send(connection_id, Message::Text(text.into())) {
            trace!(%connection_id, "dropped reply: outbound queue full");
        }
    }
}
