use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::protocol::GameKind;
use crate::server::GameServer;

use super::handler::{authenticate, websocket_handler, websocket_room_handler, WsQuery};

/// Create the Axum router: WebSocket upgrades, health, and the thin JSON
/// room API.
pub fn create_router(cors_origins: &str) -> axum::Router<Arc<GameServer>> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = if cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    axum::Router::new()
        .route("/ws", get(websocket_handler))
        .route("/ws/room/{code}", get(websocket_room_handler))
        .route("/health", get(health_check))
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/{code}/join", post(join_room))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct CreateRoomRequest {
    name: String,
    kind: GameKind,
}

/// `POST /api/rooms` -- create a room with the authenticated user as host.
async fn create_room(
    State(server): State<Arc<GameServer>>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    Json(request): Json<CreateRoomRequest>,
) -> Response {
    let identity = match authenticate(&server, &headers, query.token.as_deref()) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match server
        .rooms()
        .create_room(
            &request.name,
            identity.user_id,
            &identity.display_name,
            request.kind,
        )
        .await
    {
        Ok(snapshot) => (StatusCode::CREATED, Json(snapshot)).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.code().to_string()),
    }
}

/// `POST /api/rooms/{code}/join` -- join (or re-join) a waiting room.
async fn join_room(
    State(server): State<Arc<GameServer>>,
    Path(code): Path<String>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
) -> Response {
    let identity = match authenticate(&server, &headers, query.token.as_deref()) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match server
        .rooms()
        .join_by_code(&code, identity.user_id, &identity.display_name)
        .await
    {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            let status = match e {
                crate::rooms::RoomError::NotFound => StatusCode::NOT_FOUND,
                crate::rooms::RoomError::Full
                | crate::rooms::RoomError::GameInProgress => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            };
            error_response(status, &e.code().to_string())
        }
    }
}

fn error_response(status: StatusCode, code: &str) -> Response {
    (status, Json(serde_json::json!({ "error": code }))).into_response()
}
