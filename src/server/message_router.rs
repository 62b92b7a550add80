use crate::protocol::{ClientMessage, ServerMessage};

use super::{ConnectionCtx, GameServer};

impl GameServer {
    /// Route one decoded client message. Lobby messages are handled here;
    /// game messages go to the engine matching the room's kind.
    pub async fn handle_message(&self, ctx: &ConnectionCtx, message: ClientMessage) {
        match message {
            // The connection layer answers pings before dispatch; these arms
            // only fire for protocol-level probes inside an envelope batch.
            ClientMessage::Ping => {
                self.hub()
                    .send_to_user(&ctx.room_code, ctx.user_id, &ServerMessage::Pong)
                    .await;
            }
            ClientMessage::Pong => {}

            ClientMessage::JoinRoom { code } => {
                self.handle_join_room(ctx, &code).await;
            }
            ClientMessage::LeaveRoom => {
                self.handle_leave_room(ctx).await;
            }
            ClientMessage::PlayerReady { ready } => {
                self.handle_player_ready(ctx, ready).await;
            }
            ClientMessage::StartGame(overrides) => {
                self.handle_start_game(ctx, overrides).await;
            }

            ClientMessage::BtAnswer { answer } => {
                self.blind_test()
                    .submit_answer(&ctx.room_code, ctx.user_id, &answer)
                    .await;
            }
            ClientMessage::SubmitAnswers { answers } => {
                self.category_race()
                    .submit_answers(&ctx.room_code, ctx.user_id, &answers)
                    .await;
            }
            ClientMessage::StopRound => {
                self.category_race()
                    .stop_round(&ctx.room_code, ctx.user_id)
                    .await;
            }
            ClientMessage::SubmitVotes { votes } => {
                self.category_race()
                    .submit_votes(&ctx.room_code, ctx.user_id, &votes)
                    .await;
            }
        }
    }
}
