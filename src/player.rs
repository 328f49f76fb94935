//! Player process launcher
//!
//! Starts the media player with its JSON IPC server enabled and waits for the
//! control socket to accept connections.

use std::io;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::error::{Result, SyncError};

const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A running player spawned by us.
#[derive(Debug)]
pub struct PlayerProcess {
    child: Child,
    socket_path: PathBuf,
}

impl PlayerProcess {
    /// Block until the player exits.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }
}

impl Drop for PlayerProcess {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// The control socket path from the config, or a fresh one in the temp dir.
pub fn socket_path(config: &BridgeConfig) -> PathBuf {
    config
        .socket_path
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(format!("mpv-sync-{}", Uuid::new_v4())))
}

/// Spawn the player and connect to its control socket.
pub fn launch(config: &BridgeConfig) -> Result<(PlayerProcess, UnixStream)> {
    let socket_path = socket_path(config);
    info!("creating socket at {}", socket_path.display());

    let mut command = Command::new(&config.player_binary);
    if let Some(media) = &config.media {
        command.arg(media);
    }
    command
        .arg(format!("--input-ipc-server={}", socket_path.display()))
        .arg("--force-window=immediate")
        .arg("--pause");
    info!(?command, "launching player");

    let child = command
        .spawn()
        .map_err(|e| SyncError::Launch(format!("{}: {e}", config.player_binary)))?;

    let mut process = PlayerProcess { child, socket_path };
    let deadline = Instant::now() + config.connect_timeout;

    loop {
        if let Some(status) = process.child.try_wait()? {
            return Err(SyncError::Launch(format!(
                "player exited with {status} before opening its control socket"
            )));
        }

        match UnixStream::connect(&process.socket_path) {
            Ok(stream) => return Ok((process, stream)),
            Err(e) if Instant::now() >= deadline => {
                let _ = process.child.kill();
                let _ = process.child.wait();
                return Err(SyncError::Launch(format!(
                    "control socket {} never became ready: {e}",
                    process.socket_path.display()
                )));
            }
            Err(e) => {
                debug!("waiting for control socket: {e}");
                thread::sleep(CONNECT_POLL_INTERVAL);
            }
        }
    }
}

/// Connect to the control socket of a player someone else started.
pub fn attach(socket_path: &Path, timeout: Duration) -> Result<UnixStream> {
    let deadline = Instant::now() + timeout;
    loop {
        match UnixStream::connect(socket_path) {
            Ok(stream) => return Ok(stream),
            Err(e) if Instant::now() >= deadline => return Err(e.into()),
            Err(_) => thread::sleep(CONNECT_POLL_INTERVAL),
        }
    }
}
