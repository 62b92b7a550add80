#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Encore Server
//!
//! A real-time multiplayer WebSocket server hosting two turn-based musical
//! party games -- Blind Test and Category Race -- in code-addressed rooms.
//!
//! All state is in-memory and single-process: no database, no cloud services.
//! Just run the binary and connect via WebSocket.

/// Session token authentication (HMAC backed)
pub mod auth;

/// External music catalog interface and built-in playlists
pub mod catalog;

/// Server configuration and environment variables
pub mod config;

/// Game engines (Blind Test, Category Race) and answer matching
pub mod games;

/// Real-time fan-out hub for per-room message delivery
pub mod hub;

/// Structured logging configuration
pub mod logging;

/// WebSocket message protocol definitions
pub mod protocol;

/// Room lifecycle and membership management
pub mod rooms;

/// Main server orchestration
pub mod server;

/// Best-effort persistence interface (in-memory implementation)
pub mod store;

/// WebSocket connection handling
pub mod websocket;
