//! Real-time fan-out hub.
//!
//! The hub owns the registry `roomCode -> userId -> connection` and is driven
//! by a single dispatcher task reading one command channel, so every mutation
//! and every fan-out is processed in a total order per room. Query methods
//! take a read lock on the registry snapshot.
//!
//! Outbound frames are serialized once per broadcast and shared as frozen
//! [`Bytes`]; each recipient gets a non-blocking enqueue into its bounded
//! send queue. A recipient whose queue is full is evicted before the
//! broadcast completes and stops receiving further traffic.

use bytes::Bytes;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::protocol::{
    normalize_room_code, ConnectionId, ErrorCode, ServerEnvelope, ServerMessage,
    UserId, MAX_PLAYERS,
};
use crate::rooms::RoomManager;

/// Command channel depth. Producers briefly await when the dispatcher lags.
const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Handle to a live connection, owned by the registry.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub display_name: String,
    pub room_code: String,
    pub sender: mpsc::Sender<Bytes>,
}

enum HubCommand {
    Register(ConnectionHandle),
    Unregister {
        room_code: String,
        user_id: UserId,
        connection_id: ConnectionId,
    },
    Broadcast {
        room_code: String,
        frame: Bytes,
        exclude: Option<UserId>,
    },
    SendToUser {
        room_code: String,
        user_id: UserId,
        frame: Bytes,
    },
    CloseRoom {
        room_code: String,
    },
}

type Registry = HashMap<String, HashMap<UserId, ConnectionHandle>>;

/// Per-room fan-out of typed messages to connected players.
pub struct Hub {
    registry: Arc<RwLock<Registry>>,
    commands: mpsc::Sender<HubCommand>,
}

impl Hub {
    /// Construct the hub and spawn its dispatcher. The dispatcher stops when
    /// `cancel` fires, closing every registered connection.
    pub fn new(rooms: Arc<RoomManager>, cancel: CancellationToken) -> Arc<Self> {
        let registry: Arc<RwLock<Registry>> = Arc::new(RwLock::new(HashMap::new()));
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);

        let hub = Arc::new(Self {
            registry: Arc::clone(&registry),
            commands: tx,
        });

        tokio::spawn(dispatcher(registry, rooms, rx, cancel));
        hub
    }

    async fn send_command(&self, command: HubCommand) {
        if self.commands.send(command).await.is_err() {
            tracing::warn!("Hub dispatcher is gone; dropping command");
        }
    }

    /// Register a connection. An existing connection for the same
    /// `(roomCode, userId)` is closed first (single-session semantics).
    /// The dispatcher then sends the joiner a `room_update` snapshot and
    /// broadcasts `player_joined` to the rest of the room.
    pub async fn register(&self, handle: ConnectionHandle) {
        self.send_command(HubCommand::Register(handle)).await;
    }

    /// Remove a connection. Idempotent: a stale `connection_id` (already
    /// replaced or evicted) is a no-op.
    pub async fn unregister(&self, room_code: &str, user_id: UserId, connection_id: ConnectionId) {
        self.send_command(HubCommand::Unregister {
            room_code: normalize_room_code(room_code),
            user_id,
            connection_id,
        })
        .await;
    }

    /// Fan a message out to every member of a room.
    pub async fn broadcast(&self, room_code: &str, message: &ServerMessage) {
        self.broadcast_envelope(room_code, &ServerEnvelope::new(message.clone()), None)
            .await;
    }

    /// Fan a message out to every member except `exclude`.
    pub async fn broadcast_except(
        &self,
        room_code: &str,
        message: &ServerMessage,
        exclude: UserId,
    ) {
        self.broadcast_envelope(room_code, &ServerEnvelope::new(message.clone()), Some(exclude))
            .await;
    }

    async fn broadcast_envelope(
        &self,
        room_code: &str,
        envelope: &ServerEnvelope,
        exclude: Option<UserId>,
    ) {
        let frame = match envelope.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode broadcast frame");
                return;
            }
        };
        self.send_command(HubCommand::Broadcast {
            room_code: normalize_room_code(room_code),
            frame,
            exclude,
        })
        .await;
    }

    /// Fan an error envelope out to every member of a room.
    pub async fn broadcast_error(&self, room_code: &str, code: ErrorCode) {
        self.broadcast_envelope(room_code, &ServerEnvelope::error(code), None)
            .await;
    }

    /// Send a message to a single member.
    pub async fn send_to_user(&self, room_code: &str, user_id: UserId, message: &ServerMessage) {
        self.send_envelope_to_user(room_code, user_id, &ServerEnvelope::new(message.clone()))
            .await;
    }

    /// Send an error envelope to a single member.
    pub async fn send_error_to_user(&self, room_code: &str, user_id: UserId, code: ErrorCode) {
        self.send_envelope_to_user(room_code, user_id, &ServerEnvelope::error(code))
            .await;
    }

    pub async fn send_envelope_to_user(
        &self,
        room_code: &str,
        user_id: UserId,
        envelope: &ServerEnvelope,
    ) {
        let frame = match envelope.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode frame");
                return;
            }
        };
        self.send_command(HubCommand::SendToUser {
            room_code: normalize_room_code(room_code),
            user_id,
            frame,
        })
        .await;
    }

    /// Close every connection of a room (room destroyed or swept).
    pub async fn close_room(&self, room_code: &str) {
        self.send_command(HubCommand::CloseRoom {
            room_code: normalize_room_code(room_code),
        })
        .await;
    }

    /// Number of live connections in a room.
    pub async fn count(&self, room_code: &str) -> usize {
        self.registry
            .read()
            .await
            .get(&normalize_room_code(room_code))
            .map_or(0, HashMap::len)
    }

    /// Whether the user holds a live connection other than the given one.
    /// Used by connection teardown to tell a replacement apart from a real
    /// disconnect.
    pub async fn has_other_connection(
        &self,
        room_code: &str,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> bool {
        self.registry
            .read()
            .await
            .get(&normalize_room_code(room_code))
            .and_then(|members| members.get(&user_id))
            .is_some_and(|handle| handle.connection_id != connection_id)
    }

    /// Whether a user currently holds a live connection in a room.
    pub async fn is_connected(&self, room_code: &str, user_id: UserId) -> bool {
        self.registry
            .read()
            .await
            .get(&normalize_room_code(room_code))
            .is_some_and(|members| members.contains_key(&user_id))
    }

    /// Users with a live connection in a room.
    pub async fn list_users(&self, room_code: &str) -> Vec<UserId> {
        self.registry
            .read()
            .await
            .get(&normalize_room_code(room_code))
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default()
    }
}

async fn dispatcher(
    registry: Arc<RwLock<Registry>>,
    rooms: Arc<RoomManager>,
    mut commands: mpsc::Receiver<HubCommand>,
    cancel: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            () = cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            HubCommand::Register(handle) => handle_register(&registry, &rooms, handle).await,
            HubCommand::Unregister {
                room_code,
                user_id,
                connection_id,
            } => {
                let mut registry = registry.write().await;
                remove_connection(&mut registry, &room_code, user_id, Some(connection_id));
            }
            HubCommand::Broadcast {
                room_code,
                frame,
                exclude,
            } => {
                let mut registry = registry.write().await;
                fan_out(&mut registry, &room_code, &frame, exclude);
            }
            HubCommand::SendToUser {
                room_code,
                user_id,
                frame,
            } => {
                let mut registry = registry.write().await;
                let full = registry
                    .get(&room_code)
                    .and_then(|members| members.get(&user_id))
                    .is_some_and(|handle| handle.sender.try_send(frame).is_err());
                if full {
                    tracing::warn!(%room_code, %user_id, "Send queue full; evicting connection");
                    remove_connection(&mut registry, &room_code, user_id, None);
                }
            }
            HubCommand::CloseRoom { room_code } => {
                let mut registry = registry.write().await;
                if let Some(members) = registry.remove(&room_code) {
                    tracing::info!(%room_code, count = members.len(), "Closing room connections");
                }
                // Dropping the handles closes each send queue, which ends the
                // write loops and tears the sockets down.
            }
        }
    }

    // Shutdown: drop every handle so all write loops terminate.
    registry.write().await.clear();
    tracing::info!("Hub dispatcher stopped");
}

async fn handle_register(
    registry: &Arc<RwLock<Registry>>,
    rooms: &Arc<RoomManager>,
    handle: ConnectionHandle,
) {
    let room_code = normalize_room_code(&handle.room_code);
    let user_id = handle.user_id;

    {
        let mut registry = registry.write().await;
        let members = registry.entry(room_code.clone()).or_default();
        if let Some(previous) = members.remove(&user_id) {
            tracing::info!(
                %room_code,
                %user_id,
                previous_connection = %previous.connection_id,
                "Replacing existing connection (single session)"
            );
            // Dropping the previous handle closes its send queue.
        }
        members.insert(user_id, handle.clone());
    }

    // Fresh snapshot for the joiner, membership notice for the rest.
    match rooms.get_room_by_code(&room_code) {
        Ok(shared) => {
            let snapshot = {
                let room = shared.read().await;
                crate::protocol::RoomSnapshot::of_room(&room)
            };
            let update = ServerEnvelope::new(ServerMessage::RoomUpdate(Box::new(snapshot)));
            if let Ok(frame) = update.encode() {
                let mut registry = registry.write().await;
                let full = registry
                    .get(&room_code)
                    .and_then(|members| members.get(&user_id))
                    .is_some_and(|h| h.sender.try_send(frame).is_err());
                if full {
                    remove_connection(&mut registry, &room_code, user_id, None);
                    return;
                }
            }

            let joined = ServerEnvelope::new(ServerMessage::PlayerJoined {
                user_id,
                pseudo: handle.display_name.clone(),
            });
            if let Ok(frame) = joined.encode() {
                let mut registry = registry.write().await;
                fan_out(&mut registry, &room_code, &frame, Some(user_id));
            }
        }
        Err(_) => {
            tracing::warn!(%room_code, %user_id, "Registered connection for unknown room");
        }
    }
}

/// Non-blocking fan-out; members with a saturated queue are evicted in place.
fn fan_out(registry: &mut Registry, room_code: &str, frame: &Bytes, exclude: Option<UserId>) {
    let Some(members) = registry.get(room_code) else {
        return;
    };

    let mut evicted: SmallVec<[UserId; MAX_PLAYERS]> = SmallVec::new();
    for (user_id, handle) in members {
        if Some(*user_id) == exclude {
            continue;
        }
        if handle.sender.try_send(frame.clone()).is_err() {
            evicted.push(*user_id);
        }
    }

    for user_id in evicted {
        tracing::warn!(%room_code, %user_id, "Send queue full during broadcast; evicting");
        remove_connection(registry, room_code, user_id, None);
    }
}

/// Remove a member's connection. With `connection_id` given, only that exact
/// connection is removed, keeping unregister idempotent across replacements.
fn remove_connection(
    registry: &mut Registry,
    room_code: &str,
    user_id: UserId,
    connection_id: Option<ConnectionId>,
) {
    let Some(members) = registry.get_mut(room_code) else {
        return;
    };
    let matches = members
        .get(&user_id)
        .is_some_and(|handle| connection_id.is_none_or(|id| handle.connection_id == id));
    if matches {
        members.remove(&user_id);
    }
    if members.is_empty() {
        registry.remove(room_code);
    }
}
