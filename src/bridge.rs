//! Bridge between the local player and the relay
//!
//! A bridge owns the write halves of two channels: the player's JSON control
//! socket and the TCP connection to the relay. Two loops run concurrently
//! against one shared `Bridge`:
//!
//! * the player loop turns pause and seek notifications into wire lines,
//! * the network loop turns wire lines into player commands.
//!
//! Commands applied on behalf of the network come back from the player as
//! ordinary notifications. The network loop arms the `Suppressor` before each
//! command so the player loop can recognise and drop that echo.

use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::model::player::{PlayerCommand, PlayerMessage, ResponseStatus};
use crate::model::suppression::{EventKind, Suppressor, Verdict};
use crate::model::wire::NetMessage;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Bridge<P = UnixStream, N = TcpStream> {
    player: Mutex<P>,
    network: Mutex<N>,
    suppressor: Suppressor,
    next_request_id: AtomicU64,
    /// Ids of time-position queries sent after a seek and not yet answered.
    time_queries: Mutex<HashSet<u64>>,
}

impl<P: Write, N: Write> Bridge<P, N> {
    pub fn new(player: P, network: N, echo_timeout: Duration) -> Self {
        Self {
            player: Mutex::new(player),
            network: Mutex::new(network),
            suppressor: Suppressor::new(echo_timeout),
            // The player answers untagged commands with request id 0.
            next_request_id: AtomicU64::new(1),
            time_queries: Mutex::new(HashSet::new()),
        }
    }

    pub fn suppressor(&self) -> &Suppressor {
        &self.suppressor
    }

    /// Read notifications from the player until its channel closes.
    ///
    /// Subscribes to pause changes first. A line that cannot be decoded is
    /// returned as a fatal error; a closed or failing channel just ends the
    /// loop.
    pub fn run_player_loop<R: BufRead>(&self, mut reader: R) -> Result<()> {
        self.send_player(&PlayerCommand::ObservePause)?;

        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(_) if line.ends_with(b"\n") => {}
                Ok(_) => {
                    info!("player channel closed");
                    return Ok(());
                }
                Err(e) => {
                    warn!("failed to read from player: {e}");
                    return Err(e.into());
                }
            }

            let text = String::from_utf8_lossy(&line);
            debug!("player: {}", text.trim_end());
            self.handle_player_message(PlayerMessage::parse(&text)?)?;
        }
    }

    /// Read wire lines from the relay until the connection closes.
    ///
    /// Unrecognised lines are logged and dropped.
    pub fn run_network_loop<R: BufRead>(&self, mut reader: R) -> Result<()> {
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(_) if line.ends_with(b"\n") => {}
                Ok(_) => {
                    info!("relay connection closed");
                    return Ok(());
                }
                Err(e) => {
                    warn!("failed to read from relay: {e}");
                    return Err(e.into());
                }
            }

            let text = String::from_utf8_lossy(&line);
            debug!("net: {}", text.trim_end());
            self.handle_net_message(NetMessage::parse(&text))?;
        }
    }

    fn handle_net_message(&self, message: NetMessage) -> Result<()> {
        match message {
            NetMessage::Seek(time) => {
                self.suppressor.arm(EventKind::Seek);
                self.send_player(&PlayerCommand::SeekAbsolute(time))
            }
            NetMessage::Pause(paused) => {
                self.suppressor.arm(EventKind::Pause);
                self.send_player(&PlayerCommand::SetPause(paused))
            }
            NetMessage::Unrecognized(text) => {
                warn!(line = %text, "net parsing error, dropping line");
                Ok(())
            }
        }
    }

    fn handle_player_message(&self, message: PlayerMessage) -> Result<()> {
        match message {
            PlayerMessage::PauseChanged(paused) => {
                self.forward_unless_echo(EventKind::Pause, NetMessage::Pause(paused));
                Ok(())
            }
            PlayerMessage::Seek => {
                // The seek event has no position, so ask for it. The answer
                // arrives later as a response carrying this request id.
                let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
                lock(&self.time_queries).insert(request_id);
                self.send_player(&PlayerCommand::QueryTimePos { request_id })
            }
            PlayerMessage::Response {
                request_id,
                status,
                data,
            } => self.handle_time_response(request_id, status, data),
            PlayerMessage::Other => Ok(()),
        }
    }

    fn handle_time_response(
        &self,
        request_id: Option<u64>,
        status: ResponseStatus,
        data: Option<serde_json::Value>,
    ) -> Result<()> {
        // Responses to our seek and set_property commands, and to the pause
        // subscription, share this shape. Only answers to our own time queries
        // are seek results.
        let Some(request_id) = request_id.filter(|id| lock(&self.time_queries).remove(id)) else {
            return Ok(());
        };

        if let ResponseStatus::Failed(error) = status {
            warn!(request_id, "seek time request failed: {error}");
            return Ok(());
        }

        let Some(data) = data else {
            warn!(request_id, "seek time request succeeded without a position");
            return Ok(());
        };

        let time = data.as_f64().ok_or_else(|| {
            SyncError::PlayerShape(format!("time-pos response carried non-numeric data {data}"))
        })?;

        self.forward_unless_echo(EventKind::Seek, NetMessage::Seek(time));
        Ok(())
    }

    fn forward_unless_echo(&self, kind: EventKind, message: NetMessage) {
        match self.suppressor.observe(kind) {
            Verdict::Suppress => debug!(%message, "suppressed echo"),
            Verdict::Forward => self.send_network(&message),
        }
    }

    fn send_player(&self, command: &PlayerCommand) -> Result<()> {
        let line = command.to_line();
        let mut player = lock(&self.player);
        player.write_all(line.as_bytes())?;
        player.flush()?;
        Ok(())
    }

    /// Write failures towards the relay are logged; the loop keeps going.
    fn send_network(&self, message: &NetMessage) {
        let Some(line) = message.encode() else {
            return;
        };

        info!(%message, "writing to net");
        let mut network = lock(&self.network);
        if let Err(e) = network
            .write_all(line.as_bytes())
            .and_then(|_| network.flush())
        {
            warn!("failed to write to relay: {e}");
        }
    }
}
