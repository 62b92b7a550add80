use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::auth::Authenticator;
use crate::catalog::TrackProvider;
use crate::config::Config;
use crate::games::{
    BlindTestEngine, BlindTestPacing, CategoryRaceEngine, CategoryRacePacing,
};
use crate::hub::Hub;
use crate::protocol::{ConnectionId, UserId};
use crate::rooms::RoomManager;
use crate::store::Store;

mod lobby;
mod message_router;

/// Identity and addressing of one live connection, threaded through the
/// router so handlers never reach back into transport state.
#[derive(Debug, Clone)]
pub struct ConnectionCtx {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub display_name: String,
    pub room_code: String,
}

/// Explicitly wired server core: room manager, hub, engines, and the
/// consumed external interfaces. Constructed once at process init and passed
/// by reference; tests build fresh instances per case.
pub struct GameServer {
    config: Config,
    rooms: Arc<RoomManager>,
    hub: Arc<Hub>,
    blind_test: Arc<BlindTestEngine>,
    category_race: Arc<CategoryRaceEngine>,
    authenticator: Arc<dyn Authenticator>,
    shutdown: CancellationToken,
}

impl GameServer {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        catalog: Arc<dyn TrackProvider>,
        store: Arc<dyn Store>,
    ) -> Arc<Self> {
        Self::with_pacing(
            config,
            authenticator,
            catalog,
            store,
            BlindTestPacing::default(),
            CategoryRacePacing::default(),
        )
    }

    /// Like [`GameServer::new`] with explicit engine pacing; tests pass the
    /// fast variants.
    pub fn with_pacing(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        catalog: Arc<dyn TrackProvider>,
        store: Arc<dyn Store>,
        blind_test_pacing: BlindTestPacing,
        category_race_pacing: CategoryRacePacing,
    ) -> Arc<Self> {
        let shutdown = CancellationToken::new();
        let rooms = Arc::new(RoomManager::new(
            Arc::clone(&store),
            config.games.clone(),
            config.server.max_players,
        ));
        let hub = Hub::new(Arc::clone(&rooms), shutdown.child_token());
        let blind_test = Arc::new(BlindTestEngine::new(
            Arc::clone(&hub),
            Arc::clone(&rooms),
            catalog,
            Arc::clone(&store),
            blind_test_pacing,
            shutdown.child_token(),
        ));
        let category_race = Arc::new(CategoryRaceEngine::new(
            Arc::clone(&hub),
            Arc::clone(&rooms),
            store,
            category_race_pacing,
            shutdown.child_token(),
        ));

        Arc::new(Self {
            config,
            rooms,
            hub,
            blind_test,
            category_race,
            authenticator,
            shutdown,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rooms(&self) -> &Arc<RoomManager> {
        &self.rooms
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn blind_test(&self) -> &Arc<BlindTestEngine> {
        &self.blind_test
    }

    pub fn category_race(&self) -> &Arc<CategoryRaceEngine> {
        &self.category_race
    }

    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    /// Token observed by every long-lived task; cancelling it drains the hub
    /// and stops the engines.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Spawn the periodic room eviction sweep.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let server = Arc::clone(self);
        let interval = tokio::time::Duration::from_secs(self.config.server.sweep_interval);
        let idle = chrono::Duration::seconds(self.config.server.idle_room_timeout as i64);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The immediate first tick would sweep an empty table; skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = server.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        server.sweep(idle).await;
                    }
                }
            }
        });
    }

    /// One sweep pass: evict expired rooms and tear down whatever they owned.
    pub async fn sweep(&self, idle: chrono::Duration) {
        for (_room_id, code) in self.rooms.sweep_once(idle).await {
            self.blind_test.cancel(&code);
            self.category_race.cancel(&code);
            self.hub.close_room(&code).await;
        }
    }
}
