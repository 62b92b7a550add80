use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::Identity;
use crate::server::GameServer;

use super::connection::handle_socket;

#[derive(Debug, Deserialize)]
pub(super) struct WsQuery {
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /ws?room=<code>&token=<t>`
pub(super) async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(server): State<Arc<GameServer>>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
) -> Response {
    let Some(room_code) = query.room.clone() else {
        return (StatusCode::BAD_REQUEST, "missing room code").into_response();
    };
    upgrade(ws, server, headers, query.token, room_code).await
}

/// `GET /ws/room/{code}?token=<t>`
pub(super) async fn websocket_room_handler(
    ws: WebSocketUpgrade,
    State(server): State<Arc<GameServer>>,
    Path(code): Path<String>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
) -> Response {
    upgrade(ws, server, headers, query.token, code).await
}

/// Pre-upgrade gate: 401 unauthenticated, 404 unknown room, 403 non-member.
async fn upgrade(
    ws: WebSocketUpgrade,
    server: Arc<GameServer>,
    headers: HeaderMap,
    token: Option<String>,
    room_code: String,
) -> Response {
    let identity = match authenticate(&server, &headers, token.as_deref()) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let member = match server.rooms().get_room_by_code(&room_code) {
        Ok(shared) => {
            let room = shared.read().await;
            room.players.contains_key(&identity.user_id)
        }
        Err(_) => return (StatusCode::NOT_FOUND, "room not found").into_response(),
    };
    if !member {
        return (StatusCode::FORBIDDEN, "not a member of this room").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, server, identity, room_code))
}

/// Resolve the session token from the query string or an
/// `Authorization: Bearer` header.
pub(super) fn authenticate(
    server: &GameServer,
    headers: &HeaderMap,
    token_param: Option<&str>,
) -> Result<Identity, Response> {
    let header_token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token_param.or(header_token) else {
        return Err((StatusCode::UNAUTHORIZED, "missing token").into_response());
    };

    server
        .authenticator()
        .identify(token)
        .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid token").into_response())
}
