//! Keeps several media players in playback sync.
//!
//! Each participant runs a bridge (`client`) that relays pause and seek
//! events between its local player and a shared broadcast relay (`server`).

pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod player;
pub mod server;
pub mod util;
