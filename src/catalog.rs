//! External music catalog boundary.
//!
//! The engines only ever ask for `n` tracks from a named playlist. The
//! built-in [`StaticCatalog`] serves curated in-memory playlists so the
//! server runs with zero external services; a deployment can swap in a
//! provider backed by a real catalog API.

use async_trait::async_trait;
use rand::RngExt;
use std::collections::HashMap;
use thiserror::Error;

use crate::protocol::Track;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown playlist \"{0}\"")]
    UnknownPlaylist(String),
    #[error("playlist \"{0}\" has no playable tracks")]
    EmptyPlaylist(String),
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Track source consumed by the Blind Test engine.
#[async_trait]
pub trait TrackProvider: Send + Sync {
    /// Pick up to `n` distinct tracks from the given playlist. Returning
    /// fewer than `n` is legal; the engine shortens the game accordingly.
    async fn pick_tracks(&self, playlist: &str, n: usize) -> Result<Vec<Track>, CatalogError>;
}

/// In-memory catalog with playlist-keyed track lists.
pub struct StaticCatalog {
    playlists: HashMap<String, Vec<Track>>,
}

impl StaticCatalog {
    pub fn new(playlists: HashMap<String, Vec<Track>>) -> Self {
        Self { playlists }
    }

    /// The built-in demo library.
    pub fn builtin() -> Self {
        fn track(id: &str, title: &str, artist: &str, album: &str) -> Track {
            Track {
                id: id.to_string(),
                title: title.to_string(),
                artist: artist.to_string(),
                album: album.to_string(),
                preview_url: format!("https://cdn.encore.example/previews/{id}.mp3"),
                image_url: format!("https://cdn.encore.example/covers/{id}.jpg"),
            }
        }

        let mut playlists = HashMap::new();
        playlists.insert(
            "Pop".to_string(),
            vec![
                track("pop-001", "Thriller", "Michael Jackson", "Thriller"),
                track("pop-002", "Billie Jean", "Michael Jackson", "Thriller"),
                track("pop-003", "Shape of You", "Ed Sheeran", "Divide"),
                track("pop-004", "Rolling in the Deep", "Adele", "21"),
                track("pop-005", "Halo", "Beyonce", "I Am... Sasha Fierce"),
                track("pop-006", "Blinding Lights", "The Weeknd", "After Hours"),
                track("pop-007", "Uptown Funk", "Bruno Mars", "Uptown Special"),
                track("pop-008", "Bad Romance", "Lady Gaga", "The Fame Monster"),
                track("pop-009", "Toxic", "Britney Spears", "In the Zone"),
                track("pop-010", "Viva la Vida", "Coldplay", "Viva la Vida"),
            ],
        );
        playlists.insert(
            "Rock".to_string(),
            vec![
                track("rock-001", "Bohemian Rhapsody", "Queen", "A Night at the Opera"),
                track("rock-002", "Smells Like Teen Spirit", "Nirvana", "Nevermind"),
                track("rock-003", "Back in Black", "AC/DC", "Back in Black"),
                track("rock-004", "Hotel California", "Eagles", "Hotel California"),
                track("rock-005", "Sweet Child O' Mine", "Guns N' Roses", "Appetite for Destruction"),
                track("rock-006", "Seven Nation Army", "The White Stripes", "Elephant"),
            ],
        );
        playlists.insert(
            "Francophone".to_string(),
            vec![
                track("fr-001", "Désenchantée", "Mylène Farmer", "L'Autre..."),
                track("fr-002", "La Vie en Rose", "Édith Piaf", "Chansons Parisiennes"),
                track("fr-003", "Alors on danse", "Stromae", "Cheese"),
                track("fr-004", "Je te promets", "Johnny Hallyday", "Cadillac"),
                track("fr-005", "Dernière danse", "Indila", "Mini World"),
            ],
        );
        Self::new(playlists)
    }
}

#[async_trait]
impl TrackProvider for StaticCatalog {
    async fn pick_tracks(&self, playlist: &str, n: usize) -> Result<Vec<Track>, CatalogError> {
        let tracks = self
            .playlists
            .get(playlist)
            .ok_or_else(|| CatalogError::UnknownPlaylist(playlist.to_string()))?;
        if tracks.is_empty() {
            return Err(CatalogError::EmptyPlaylist(playlist.to_string()));
        }

        // Partial Fisher-Yates: the first n slots end up uniformly sampled
        // without replacement.
        let mut picked: Vec<Track> = tracks.clone();
        let mut rng = rand::rng();
        let take = n.min(picked.len());
        for i in 0..take {
            let j = rng.random_range(i..picked.len());
            picked.swap(i, j);
        }
        picked.truncate(take);
        Ok(picked)
    }
}
