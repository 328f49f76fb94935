//! Player control channel codec
//!
//! The player speaks newline-delimited JSON over its IPC socket. We send
//! command objects and read back a mix of asynchronous events and responses
//! to earlier commands. Incoming objects carry no explicit tag, so they are
//! classified by which fields are present.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SyncError};

/// Observer id used for the pause property subscription.
const PAUSE_OBSERVER_ID: u64 = 1;

/// Commands the bridge sends to the player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    /// Subscribe to changes of the `pause` property.
    ObservePause,
    /// Ask for the current playback position.
    QueryTimePos { request_id: u64 },
    /// Set the `pause` property.
    SetPause(bool),
    /// Seek to an absolute position in seconds.
    SeekAbsolute(f64),
}

#[derive(Serialize)]
struct CommandEnvelope {
    command: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<u64>,
}

impl PlayerCommand {
    /// Serialize as one newline-terminated JSON line.
    pub fn to_line(&self) -> String {
        let envelope = match self {
            PlayerCommand::ObservePause => CommandEnvelope {
                command: vec![
                    "observe_property".into(),
                    PAUSE_OBSERVER_ID.into(),
                    "pause".into(),
                ],
                request_id: None,
            },
            PlayerCommand::QueryTimePos { request_id } => CommandEnvelope {
                command: vec!["get_property".into(), "time-pos".into()],
                request_id: Some(*request_id),
            },
            PlayerCommand::SetPause(paused) => CommandEnvelope {
                command: vec!["set_property".into(), "pause".into(), (*paused).into()],
                request_id: None,
            },
            PlayerCommand::SeekAbsolute(time) => CommandEnvelope {
                command: vec!["seek".into(), (*time).into(), "absolute".into()],
                request_id: None,
            },
        };

        // A Vec of plain JSON values always serializes.
        let mut line = serde_json::to_string(&envelope).unwrap_or_default();
        line.push('\n');
        line
    }
}

/// Outcome carried by a command response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseStatus {
    Success,
    Failed(String),
}

/// Messages read from the player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerMessage {
    /// The `pause` property changed.
    PauseChanged(bool),
    /// A seek happened. Carries no position; it has to be queried.
    Seek,
    /// Response to a command we sent earlier.
    Response {
        request_id: Option<u64>,
        status: ResponseStatus,
        data: Option<Value>,
    },
    /// Any other event or property change.
    Other,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    event: Option<String>,
    name: Option<String>,
    data: Option<Value>,
    error: Option<String>,
    request_id: Option<u64>,
}

impl PlayerMessage {
    /// Decode one line from the control channel.
    ///
    /// Non-JSON input and a pause notification without a boolean payload are
    /// both errors; the caller treats them as fatal.
    pub fn parse(line: &str) -> Result<PlayerMessage> {
        let raw: RawMessage =
            serde_json::from_str(line).map_err(|source| SyncError::PlayerDecode {
                line: line.trim_end().to_string(),
                source,
            })?;

        match raw {
            RawMessage {
                event: Some(ref event),
                name: Some(ref name),
                data: Some(ref data),
                ..
            } if event == "property-change" && name == "pause" => match data.as_bool() {
                Some(paused) => Ok(PlayerMessage::PauseChanged(paused)),
                None => Err(SyncError::PlayerShape(format!(
                    "pause property carried non-boolean data {data}"
                ))),
            },
            RawMessage {
                event: Some(ref event),
                ..
            } if event == "seek" => Ok(PlayerMessage::Seek),
            RawMessage {
                error: Some(error),
                request_id,
                data,
                ..
            } => {
                let status = if error == "success" {
                    ResponseStatus::Success
                } else {
                    ResponseStatus::Failed(error)
                };
                Ok(PlayerMessage::Response {
                    request_id,
                    status,
                    data,
                })
            }
            _ => Ok(PlayerMessage::Other),
        }
    }
}
