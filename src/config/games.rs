//! Game defaults applied to newly created rooms.

use serde::{Deserialize, Serialize};

use crate::protocol::{BlindTestConfig, CategoryRaceConfig};

/// Per-kind default settings. Hosts can override a subset at start time.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct GamesConfig {
    #[serde(default)]
    pub blind_test: BlindTestConfig,
    #[serde(default)]
    pub category_race: CategoryRaceConfig,
}

impl GamesConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.blind_test.total_rounds == 0 {
            anyhow::bail!("games.blind_test.total_rounds must be at least 1");
        }
        if self.blind_test.time_per_round < 5 {
            anyhow::bail!(
                "games.blind_test.time_per_round must be at least 5 seconds (configured: {})",
                self.blind_test.time_per_round
            );
        }
        if self.category_race.categories.is_empty() {
            anyhow::bail!("games.category_race.categories must not be empty");
        }
        if self.category_race.total_rounds == 0 {
            anyhow::bail!("games.category_race.total_rounds must be at least 1");
        }
        if self.category_race.time_per_round < 5 {
            anyhow::bail!(
                "games.category_race.time_per_round must be at least 5 seconds (configured: {})",
                self.category_race.time_per_round
            );
        }
        if self.category_race.vote_time < 5 {
            anyhow::bail!(
                "games.category_race.vote_time must be at least 5 seconds (configured: {})",
                self.category_race.vote_time
            );
        }
        Ok(())
    }
}
