//! Shared helpers for the integration suites.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use encore_server::auth::TokenAuthenticator;
use encore_server::catalog::{CatalogError, StaticCatalog, TrackProvider};
use encore_server::config::Config;
use encore_server::games::{BlindTestPacing, CategoryRacePacing};
use encore_server::protocol::Track;
use encore_server::server::GameServer;
use encore_server::store::MemoryStore;
use encore_server::websocket;

pub const TEST_SECRET: &[u8] = b"encore-test-secret";

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Config tuned for fast tests: short rounds, short voting windows.
#[allow(dead_code)]
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.games.blind_test.time_per_round = 5;
    config.games.blind_test.total_rounds = 1;
    config.games.category_race.time_per_round = 5;
    config.games.category_race.vote_time = 5;
    config.games.category_race.total_rounds = 1;
    config
}

/// Catalog that always serves the same fixed track list.
pub struct FixedCatalog(pub Vec<Track>);

#[async_trait]
impl TrackProvider for FixedCatalog {
    async fn pick_tracks(&self, _playlist: &str, n: usize) -> Result<Vec<Track>, CatalogError> {
        Ok(self.0.iter().take(n).cloned().collect())
    }
}

/// Catalog that always fails.
pub struct FailingCatalog;

#[async_trait]
impl TrackProvider for FailingCatalog {
    async fn pick_tracks(&self, playlist: &str, _n: usize) -> Result<Vec<Track>, CatalogError> {
        Err(CatalogError::Unavailable(format!(
            "no backend for {playlist}"
        )))
    }
}

#[allow(dead_code)]
pub fn thriller() -> Track {
    Track {
        id: "t-1".to_string(),
        title: "Thriller".to_string(),
        artist: "Michael Jackson".to_string(),
        album: "Thriller".to_string(),
        preview_url: "https://cdn.test/thriller.mp3".to_string(),
        image_url: "https://cdn.test/thriller.jpg".to_string(),
    }
}

/// Build a server with fast engine pacing and the given catalog.
#[allow(dead_code)]
pub fn create_test_server_with(
    config: Config,
    catalog: Arc<dyn TrackProvider>,
) -> (Arc<GameServer>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let authenticator = Arc::new(TokenAuthenticator::new(TEST_SECRET.to_vec()));
    let server = GameServer::with_pacing(
        config,
        authenticator,
        catalog,
        Arc::clone(&store) as Arc<_>,
        BlindTestPacing::fast(),
        CategoryRacePacing::fast(),
    );
    (server, store)
}

/// Build a server with the built-in catalog.
#[allow(dead_code)]
pub fn create_test_server() -> (Arc<GameServer>, Arc<MemoryStore>) {
    create_test_server_with(test_config(), Arc::new(StaticCatalog::builtin()))
}

/// Mint a session token accepted by the test server.
#[allow(dead_code)]
pub fn mint_token(user_id: i64, display_name: &str) -> String {
    TokenAuthenticator::new(TEST_SECRET.to_vec()).mint(user_id, display_name)
}

/// Serve the app on an ephemeral port and return its address.
#[allow(dead_code)]
pub async fn spawn_app(server: Arc<GameServer>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    let app = websocket::create_router("*").with_state(server);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
            eprintln!("test server failed: {e}");
        }
    });
    addr
}

/// Open a WebSocket connection as `user_id` into `room_code`.
#[allow(dead_code)]
pub async fn connect_ws(
    addr: SocketAddr,
    room_code: &str,
    user_id: i64,
    display_name: &str,
) -> WsClient {
    let token = mint_token(user_id, display_name);
    let url = format!("ws://{addr}/ws?room={room_code}&token={token}");
    let (stream, _response) = tokio::time::timeout(Duration::from_secs(5), connect_async(&url))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    stream
}

/// Send one envelope.
#[allow(dead_code)]
pub async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(WsMessage::Text(value.to_string().into()))
        .await
        .expect("send failed");
}

/// Read envelopes until one with the given `type` arrives, skipping
/// everything else (time updates, score refreshes, ...).
#[allow(dead_code)]
pub async fn recv_type(ws: &mut WsClient, expected: &str) -> serde_json::Value {
    recv_type_within(ws, expected, Duration::from_secs(10)).await
}

#[allow(dead_code)]
pub async fn recv_type_within(
    ws: &mut WsClient,
    expected: &str,
    window: Duration,
) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let remaining = deadline
            .checked_duration_since(tokio::time::Instant::now())
            .unwrap_or_else(|| panic!("timed out waiting for \"{expected}\""));
        let frame = tokio::time::timeout(remaining, ws.next())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for \"{expected}\""))
            .unwrap_or_else(|| panic!("connection closed waiting for \"{expected}\""))
            .expect("websocket error");
        match frame {
            WsMessage::Text(text) => {
                let value: serde_json::Value =
                    serde_json::from_str(&text).expect("invalid JSON frame");
                if value["type"] == expected {
                    return value;
                }
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            WsMessage::Close(_) => panic!("connection closed waiting for \"{expected}\""),
            _ => {}
        }
    }
}
