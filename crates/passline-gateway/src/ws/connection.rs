use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use passline_core::config::{MAX_PAYLOAD_BYTES, OUTBOUND_QUEUE_DEPTH, REPLAY_CAPACITY};
use passline_protocol::auth::{self, AccessClaims};
use passline_protocol::messages::{
    ClientMessage, ServerMessage, StatusCounts, CLOSE_POLICY_VIOLATION,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app::AppState;
use crate::ws::registry::{ConnectionHandle, Outbound};

#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    pub token: Option<String>,
    /// Optional explicit venue scope; must match the token's venue.
    pub venue_id: Option<String>,
}

/// Axum handler — upgrades HTTP to WebSocket at GET /api/v1/realtime.
pub async fn realtime_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<RealtimeQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_connection(socket, state, query))
}

/// Token gate: missing, invalid, expired, and venue-mismatched tokens are
/// all rejected the same way — policy-violation close, no retry.
fn authenticate(state: &AppState, query: &RealtimeQuery) -> Result<AccessClaims, String> {
    let token = query.token.as_deref().ok_or("missing token")?;
    let claims = auth::verify(
        token,
        &state.config.gateway.auth.token_secret,
        Utc::now().timestamp(),
    )
    .map_err(|e| e.to_string())?;

    if let Some(requested) = query.venue_id.as_deref() {
        if requested != claims.venue_id.as_str() {
            return Err(format!(
                "venue scope mismatch: token is for {}, requested {}",
                claims.venue_id, requested
            ));
        }
    }
    Ok(claims)
}

/// Per-connection event loop — lives for the entire WS session.
///
/// State progression is linear: unauthenticated → authenticated (token
/// verified) → active (registered) → closed. Every exit path unregisters.
async fn run_connection(socket: WebSocket, state: Arc<AppState>, query: RealtimeQuery) {
    let claims = match authenticate(&state, &query) {
        Ok(c) => c,
        Err(reason) => {
            warn!(%reason, "realtime auth rejected");
            close_policy_violation(socket).await;
            return;
        }
    };

    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE_DEPTH);
    let handle = ConnectionHandle::new(
        claims.venue_id.clone(),
        claims.user_id.clone(),
        claims.role,
        out_tx,
        Utc::now().timestamp_millis(),
    );
    let active_connections = state.registry.register(handle.clone());
    info!(
        conn_id = %handle.conn_id,
        venue_id = %handle.venue_id,
        user_id = %handle.user_id,
        "realtime connection established"
    );

    // Greeting and one-time replay are queued before the loop starts so
    // they precede any live push.
    let established = ServerMessage::ConnectionEstablished {
        venue_id: handle.venue_id.clone(),
        timestamp: Utc::now(),
        active_connections,
    };
    let replay = state
        .broadcaster
        .cached_updates(&handle.venue_id, REPLAY_CAPACITY);
    let _ = handle.try_send(Outbound::Frame(established.to_json()));
    let _ = handle.try_send(Outbound::Frame(replay.to_json()));

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > MAX_PAYLOAD_BYTES {
                            warn!(conn_id = %handle.conn_id, size = text.len(), "payload too large");
                            break;
                        }
                        handle_client_message(&state, &handle, &text).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // answer to a health probe
                        handle.touch(Utc::now().timestamp_millis());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if ws_tx.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(conn_id = %handle.conn_id, error = %e, "socket error");
                        break;
                    }
                }
            }

            out = out_rx.recv() => {
                match out {
                    Some(Outbound::Frame(json)) => {
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Probe) => {
                        if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close { code, reason }) => {
                        let _ = ws_tx
                            .send(Message::Close(Some(CloseFrame {
                                code,
                                reason: reason.into(),
                            })))
                            .await;
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.registry.unregister(&handle.venue_id, &handle.conn_id);
    info!(conn_id = %handle.conn_id, venue_id = %handle.venue_id, "realtime connection closed");
}

/// Process one inbound text frame. Malformed and unknown messages are
/// logged and ignored; the connection stays open and nothing is replied.
async fn handle_client_message(state: &AppState, handle: &Arc<ConnectionHandle>, text: &str) {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(conn_id = %handle.conn_id, error = %e, "unrecognized client message");
            return;
        }
    };

    match msg {
        ClientMessage::Ping => {
            handle.touch(Utc::now().timestamp_millis());
            let pong = ServerMessage::Pong {
                timestamp: Utc::now(),
            };
            let _ = handle.try_send(Outbound::Frame(pong.to_json()));
        }
        ClientMessage::SubscribeNotifications { enabled } => {
            info!(conn_id = %handle.conn_id, enabled, "notification subscription toggled");
            handle.set_wants_pushes(enabled);
        }
        ClientMessage::RequestActiveOrders => {
            let orders = match state.orders.active_orders(&handle.venue_id).await {
                Ok(orders) => orders,
                Err(e) => {
                    warn!(conn_id = %handle.conn_id, error = %e, "active order lookup failed");
                    return;
                }
            };
            let update = ServerMessage::ActiveOrdersUpdate {
                counts: StatusCounts::tally(&orders),
                orders,
            };
            let _ = handle.try_send(Outbound::Frame(update.to_json()));
        }
    }
}

async fn close_policy_violation(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: CLOSE_POLICY_VIOLATION,
            reason: "policy violation".into(),
        })))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use passline_core::config::PasslineConfig;
    use passline_core::types::{StaffRole, UserId, VenueId};

    use crate::orders::EmptyDirectory;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            PasslineConfig::default(),
            Arc::new(EmptyDirectory),
        ))
    }

    fn test_token(state: &AppState, venue: &str) -> String {
        auth::encode(
            &AccessClaims {
                user_id: UserId::from("u-1"),
                venue_id: VenueId::from(venue),
                role: StaffRole::Staff,
                exp: Utc::now().timestamp() + 3600,
            },
            &state.config.gateway.auth.token_secret,
        )
    }

    #[test]
    fn missing_token_is_rejected() {
        let state = test_state();
        let query = RealtimeQuery {
            token: None,
            venue_id: None,
        };
        assert!(authenticate(&state, &query).is_err());
    }

    #[test]
    fn valid_token_passes_and_scopes_to_its_venue() {
        let state = test_state();
        let query = RealtimeQuery {
            token: Some(test_token(&state, "v-1")),
            venue_id: None,
        };
        let claims = authenticate(&state, &query).unwrap();
        assert_eq!(claims.venue_id, VenueId::from("v-1"));
    }

    #[test]
    fn venue_scope_mismatch_is_rejected() {
        let state = test_state();
        let query = RealtimeQuery {
            token: Some(test_token(&state, "v-1")),
            venue_id: Some("v-2".to_string()),
        };
        assert!(authenticate(&state, &query).is_err());

        let matching = RealtimeQuery {
            token: Some(test_token(&state, "v-1")),
            venue_id: Some("v-1".to_string()),
        };
        assert!(authenticate(&state, &matching).is_ok());
    }

    #[tokio::test]
    async fn ping_updates_liveness_and_answers_pong() {
        let state = test_state();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = ConnectionHandle::new(
            VenueId::from("v-1"),
            UserId::from("u-1"),
            StaffRole::Staff,
            tx,
            0,
        );

        handle_client_message(&state, &handle, r#"{"type":"ping"}"#).await;

        assert!(handle.last_ping_at() > 0);
        match rx.try_recv().unwrap() {
            Outbound::Frame(json) => assert!(json.contains(r#""type":"pong""#)),
            other => panic!("unexpected outbound: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_message_is_ignored() {
        let state = test_state();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = ConnectionHandle::new(
            VenueId::from("v-1"),
            UserId::from("u-1"),
            StaffRole::Staff,
            tx,
            0,
        );

        handle_client_message(&state, &handle, r#"{"type":"reboot"}"#).await;
        handle_client_message(&state, &handle, "not json at all").await;

        // no reply of any kind
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn request_active_orders_replies_with_snapshot() {
        let state = test_state();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = ConnectionHandle::new(
            VenueId::from("v-1"),
            UserId::from("u-1"),
            StaffRole::Staff,
            tx,
            0,
        );

        handle_client_message(&state, &handle, r#"{"type":"request_active_orders"}"#).await;

        match rx.try_recv().unwrap() {
            Outbound::Frame(json) => {
                assert!(json.contains(r#""type":"active_orders_update""#));
                assert!(json.contains(r#""orders":[]"#));
            }
            other => panic!("unexpected outbound: {other:?}"),
        }
    }

    #[tokio::test]
    async fn subscribe_notifications_toggles_pushes() {
        let state = test_state();
        let (tx, _rx) = mpsc::channel(8);
        let handle = ConnectionHandle::new(
            VenueId::from("v-1"),
            UserId::from("u-1"),
            StaffRole::Staff,
            tx,
            0,
        );
        assert!(handle.wants_pushes());

        handle_client_message(
            &state,
            &handle,
            r#"{"type":"subscribe_notifications","enabled":false}"#,
        )
        .await;
        assert!(!handle.wants_pushes());
    }
}
