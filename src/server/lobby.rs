use crate::games::EngineError;
use crate::protocol::{
    normalize_room_code, ErrorCode, GameKind, RoomConfig, ServerMessage, StartGamePayload,
};
use crate::rooms::RoomError;

use super::{ConnectionCtx, GameServer};

impl GameServer {
    /// `join_room` over an established connection re-joins the room the
    /// connection was opened for (idempotent); any other code is rejected.
    pub(super) async fn handle_join_room(&self, ctx: &ConnectionCtx, code: &str) {
        if normalize_room_code(code) != normalize_room_code(&ctx.room_code) {
            self.hub()
                .send_error_to_user(&ctx.room_code, ctx.user_id, ErrorCode::RoomNotFound)
                .await;
            return;
        }

        match self
            .rooms()
            .join_by_code(code, ctx.user_id, &ctx.display_name)
            .await
        {
            Ok(snapshot) => {
                self.hub()
                    .send_to_user(
                        &ctx.room_code,
                        ctx.user_id,
                        &ServerMessage::RoomUpdate(Box::new(snapshot)),
                    )
                    .await;
            }
            Err(e) => {
                self.hub()
                    .send_error_to_user(&ctx.room_code, ctx.user_id, e.code())
                    .await;
            }
        }
    }

    pub(super) async fn handle_player_ready(&self, ctx: &ConnectionCtx, ready: bool) {
        let Ok(shared) = self.rooms().get_room_by_code(&ctx.room_code) else {
            self.hub()
                .send_error_to_user(&ctx.room_code, ctx.user_id, ErrorCode::RoomNotFound)
                .await;
            return;
        };
        let room_id = shared.read().await.id;

        let room_ready = match self.rooms().set_ready(room_id, ctx.user_id, ready).await {
            Ok(room_ready) => room_ready,
            Err(e) => {
                self.hub()
                    .send_error_to_user(&ctx.room_code, ctx.user_id, e.code())
                    .await;
                return;
            }
        };

        self.hub()
            .broadcast(
                &ctx.room_code,
                &ServerMessage::PlayerReady {
                    user_id: ctx.user_id,
                    ready,
                },
            )
            .await;

        // Announce the transition into the all-ready state.
        if room_ready {
            if let Ok(snapshot) = self.rooms().snapshot(room_id).await {
                self.hub()
                    .broadcast(
                        &ctx.room_code,
                        &ServerMessage::RoomUpdate(Box::new(snapshot)),
                    )
                    .await;
            }
        }
    }

    /// Explicit leave: the slot is freed, unlike a mere disconnection.
    pub(super) async fn handle_leave_room(&self, ctx: &ConnectionCtx) {
        let Ok(shared) = self.rooms().get_room_by_code(&ctx.room_code) else {
            self.hub()
                .unregister(&ctx.room_code, ctx.user_id, ctx.connection_id)
                .await;
            return;
        };
        let room_id = shared.read().await.id;

        match self.rooms().leave(room_id, ctx.user_id).await {
            Ok(outcome) => {
                self.hub()
                    .broadcast_except(
                        &ctx.room_code,
                        &ServerMessage::PlayerLeft {
                            user_id: ctx.user_id,
                        },
                        ctx.user_id,
                    )
                    .await;

                if outcome.destroyed {
                    self.blind_test().cancel(&ctx.room_code);
                    self.category_race().cancel(&ctx.room_code);
                    self.hub().close_room(&ctx.room_code).await;
                } else if outcome.new_host.is_some() {
                    if let Ok(snapshot) = self.rooms().snapshot(room_id).await {
                        self.hub()
                            .broadcast(
                                &ctx.room_code,
                                &ServerMessage::RoomUpdate(Box::new(snapshot)),
                            )
                            .await;
                    }
                }
            }
            Err(RoomError::UserNotInRoom | RoomError::NotFound) => {}
            Err(e) => {
                self.hub()
                    .send_error_to_user(&ctx.room_code, ctx.user_id, e.code())
                    .await;
            }
        }

        self.hub()
            .unregister(&ctx.room_code, ctx.user_id, ctx.connection_id)
            .await;
    }

    /// Host-only start. Solo is always allowed; otherwise every member must
    /// be ready and connected.
    pub(super) async fn handle_start_game(
        &self,
        ctx: &ConnectionCtx,
        overrides: StartGamePayload,
    ) {
        let Ok(shared) = self.rooms().get_room_by_code(&ctx.room_code) else {
            self.hub()
                .send_error_to_user(&ctx.room_code, ctx.user_id, ErrorCode::RoomNotFound)
                .await;
            return;
        };

        let (kind, config) = {
            let mut room = shared.write().await;
            if room.host_id != ctx.user_id {
                drop(room);
                self.hub()
                    .send_error_to_user(&ctx.room_code, ctx.user_id, ErrorCode::NotHost)
                    .await;
                return;
            }
            if room.players.len() > 1 && !room.is_ready() {
                drop(room);
                self.hub()
                    .send_error_to_user(&ctx.room_code, ctx.user_id, ErrorCode::PlayersNotReady)
                    .await;
                return;
            }

            apply_overrides(&mut room.config, &overrides);
            (room.kind, room.config.clone())
        };

        let result = match (kind, config) {
            (GameKind::BlindTest, RoomConfig::BlindTest(config)) => {
                self.blind_test().start(&ctx.room_code, config).await
            }
            (GameKind::CategoryRace, RoomConfig::CategoryRace(config)) => {
                self.category_race().start(&ctx.room_code, config).await
            }
            // Kind and config are created together; a mismatch is a bug.
            _ => {
                self.hub()
                    .send_error_to_user(&ctx.room_code, ctx.user_id, ErrorCode::InternalError)
                    .await;
                return;
            }
        };

        match result {
            Ok(()) => {}
            Err(e @ EngineError::CatalogUnavailable) => {
                // The whole room is waiting on this start; tell everyone.
                self.hub()
                    .broadcast_error(&ctx.room_code, e.code())
                    .await;
            }
            Err(e) => {
                self.hub()
                    .send_error_to_user(&ctx.room_code, ctx.user_id, e.code())
                    .await;
            }
        }
    }

    /// Transport-level teardown: keep the player's slot, mark them
    /// disconnected, and tell the room. A connection torn down because a
    /// newer one replaced it must not touch the player's presence.
    pub async fn handle_disconnect(&self, ctx: &ConnectionCtx) {
        self.hub()
            .unregister(&ctx.room_code, ctx.user_id, ctx.connection_id)
            .await;

        if self
            .hub()
            .has_other_connection(&ctx.room_code, ctx.user_id, ctx.connection_id)
            .await
        {
            return;
        }

        if let Ok(shared) = self.rooms().get_room_by_code(&ctx.room_code) {
            let room_id = shared.read().await.id;
            let _ = self
                .rooms()
                .set_connected(room_id, ctx.user_id, false)
                .await;
            self.hub()
                .broadcast_except(
                    &ctx.room_code,
                    &ServerMessage::PlayerLeft {
                        user_id: ctx.user_id,
                    },
                    ctx.user_id,
                )
                .await;
        }
    }
}

/// Fold `start_game` overrides into the room's stored config.
fn apply_overrides(config: &mut RoomConfig, overrides: &StartGamePayload) {
    match config {
        RoomConfig::BlindTest(config) => {
            if let Some(playlist) = &overrides.playlist {
                config.playlist = playlist.clone();
            }
            if let Some(rounds) = overrides.rounds {
                config.total_rounds = rounds.clamp(1, 30);
            }
        }
        RoomConfig::CategoryRace(config) => {
            if let Some(rounds) = overrides.rounds {
                config.total_rounds = rounds.clamp(1, 26);
            }
        }
    }
}
