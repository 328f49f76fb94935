//! Error types shared by the relay and the bridge.

use thiserror::Error;

/// Errors raised while relaying or bridging playback events.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport failure on either channel.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The player sent a line that is not valid JSON.
    #[error("malformed player message {line:?}: {source}")]
    PlayerDecode {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// The player sent valid JSON with an unexpected payload type.
    #[error("unexpected player message shape: {0}")]
    PlayerShape(String),

    /// The player process could not be started or never opened its socket.
    #[error("failed to launch player: {0}")]
    Launch(String),
}

impl SyncError {
    /// Whether this error must terminate the whole process.
    ///
    /// The player control channel is trusted, so anything it sends that we
    /// cannot decode means the two sides disagree about the protocol.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::PlayerDecode { .. } | SyncError::PlayerShape(_) | SyncError::Launch(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
