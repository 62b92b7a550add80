//! Per-connection read/write loops.
//!
//! Two cooperating tasks per socket. The write loop drains the bounded send
//! queue under a write deadline and emits a keepalive ping on its own timer;
//! the read loop enforces the message size limit and the pong deadline,
//! answers `ping` envelopes in place, and hands everything else to the
//! router. Either task ending tears the connection down; unregister is
//! idempotent so double teardown is harmless.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use uuid::Uuid;

use crate::auth::Identity;
use crate::hub::ConnectionHandle;
use crate::protocol::{
    normalize_room_code, ClientEnvelope, ClientMessage, ErrorCode, ServerMessage,
};
use crate::server::{ConnectionCtx, GameServer};

pub(super) async fn handle_socket(
    socket: WebSocket,
    server: Arc<GameServer>,
    identity: Identity,
    room_code: String,
) {
    let ws_config = server.config().websocket.clone();
    let room_code = normalize_room_code(&room_code);
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<bytes::Bytes>(ws_config.send_queue_capacity);

    let ctx = ConnectionCtx {
        connection_id: Uuid::new_v4(),
        user_id: identity.user_id,
        display_name: identity.display_name.clone(),
        room_code: room_code.clone(),
    };

    // The slot survives disconnections; re-registering flips it back on.
    if let Ok(shared) = server.rooms().get_room_by_code(&room_code) {
        let room_id = shared.read().await.id;
        let _ = server
            .rooms()
            .set_connected(room_id, ctx.user_id, true)
            .await;
    }

    server
        .hub()
        .register(ConnectionHandle {
            connection_id: ctx.connection_id,
            user_id: ctx.user_id,
            display_name: ctx.display_name.clone(),
            room_code: room_code.clone(),
            sender: tx,
        })
        .await;

    tracing::info!(
        room_code = %room_code,
        user_id = %ctx.user_id,
        connection_id = %ctx.connection_id,
        "WebSocket connection established"
    );

    let write_wait = Duration::from_secs(ws_config.write_wait_secs);
    let ping_period = Duration::from_secs(ws_config.ping_period_secs);
    let pong_wait = Duration::from_secs(ws_config.pong_wait_secs);
    let max_message_size = ws_config.max_message_size;

    // Write loop: drain the send queue, tick keepalive pings.
    let send_task = tokio::spawn(async move {
        let mut ping_ticker = interval(ping_period);
        ping_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Consume the immediate first tick; the peer just connected.
        ping_ticker.tick().await;

        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let Some(frame) = frame else {
                        // Queue closed: evicted, replaced, or shutting down.
                        break;
                    };
                    let text = match std::str::from_utf8(&frame) {
                        Ok(text) => text.to_owned(),
                        Err(_) => continue,
                    };
                    match timeout(write_wait, sender.send(Message::Text(text.into()))).await {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) | Err(_) => break,
                    }
                }
                _ = ping_ticker.tick() => {
                    match timeout(write_wait, sender.send(Message::Ping(Vec::new().into()))).await {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) | Err(_) => break,
                    }
                }
            }
        }
        let _ = sender.close().await;
    });

    // Read loop: pong deadline, size limit, decode, route.
    let read_server = Arc::clone(&server);
    let read_ctx = ctx.clone();
    let read_task = tokio::spawn(async move {
        loop {
            let message = match timeout(pong_wait, receiver.next()).await {
                // Pong deadline blown.
                Err(_) => {
                    tracing::warn!(
                        user_id = %read_ctx.user_id,
                        room_code = %read_ctx.room_code,
                        "Read deadline exceeded; closing connection"
                    );
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::debug!(user_id = %read_ctx.user_id, error = %e, "WebSocket error");
                    break;
                }
                Ok(Some(Ok(message))) => message,
            };

            match message {
                Message::Text(text) => {
                    if text.len() > max_message_size {
                        read_server
                            .hub()
                            .send_error_to_user(
                                &read_ctx.room_code,
                                read_ctx.user_id,
                                ErrorCode::MessageTooLarge,
                            )
                            .await;
                        break;
                    }

                    let envelope = match ClientEnvelope::decode(&text) {
                        Ok(envelope) => envelope,
                        Err(e) => {
                            tracing::warn!(
                                user_id = %read_ctx.user_id,
                                error = %e,
                                "Rejected undecodable frame"
                            );
                            read_server
                                .hub()
                                .send_error_to_user(
                                    &read_ctx.room_code,
                                    read_ctx.user_id,
                                    ErrorCode::DecodeError,
                                )
                                .await;
                            break;
                        }
                    };

                    match envelope.message {
                        // Reserved: answered without touching the router.
                        ClientMessage::Ping => {
                            read_server
                                .hub()
                                .send_to_user(
                                    &read_ctx.room_code,
                                    read_ctx.user_id,
                                    &ServerMessage::Pong,
                                )
                                .await;
                        }
                        other => read_server.handle_message(&read_ctx, other).await,
                    }
                }
                Message::Binary(_) => {
                    // JSON-only protocol.
                    read_server
                        .hub()
                        .send_error_to_user(
                            &read_ctx.room_code,
                            read_ctx.user_id,
                            ErrorCode::DecodeError,
                        )
                        .await;
                    break;
                }
                // Transport pings are answered by the WebSocket layer; both
                // directions refresh the read deadline by arriving at all.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(_) => break,
            }
        }
    });

    // Either loop ending closes the connection.
    tokio::select! {
        _ = send_task => {}
        _ = read_task => {}
    }

    server.handle_disconnect(&ctx).await;
    tracing::info!(
        room_code = %room_code,
        user_id = %ctx.user_id,
        connection_id = %ctx.connection_id,
        "WebSocket connection closed"
    );
}
