//! Data models for playback sync
//!
//! This module contains the wire formats spoken on both channels, the relay's
//! peer bookkeeping and the echo suppression state shared by a bridge's loops.

pub mod peer;
pub mod player;
pub mod suppression;
pub mod wire;
