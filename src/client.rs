//! Bridge runtime
//!
//! Connects one participant's player and the relay, runs the bridge's two
//! loops on their own threads and decides when the client is done. A fatal
//! player-channel error ends the client; a loop that merely stops does not.

use std::io::{self, BufReader};
use std::net::TcpStream;
use std::process::ExitStatus;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::error::SyncError;
use crate::player::{self, PlayerProcess};
use crate::util::init_log;

/// Why one of the client's threads stopped.
enum Exit {
    PlayerLoop(Result<(), SyncError>),
    NetworkLoop(Result<(), SyncError>),
    Player(io::Result<ExitStatus>),
}

pub fn main(config: BridgeConfig) -> Result<()> {
    init_log();
    run(config)
}

/// Connect the player and the relay, then bridge them until the player
/// exits. Without a player process of our own, runs until both loops end.
pub fn run(config: BridgeConfig) -> Result<()> {
    let (process, player_stream) = if config.launch_player {
        let (process, stream) = player::launch(&config)?;
        (Some(process), stream)
    } else {
        let path = config
            .socket_path
            .as_deref()
            .context("a control socket path is required when not launching the player")?;
        let stream = player::attach(path, config.connect_timeout)
            .with_context(|| format!("connecting to player at {}", path.display()))?;
        (None, stream)
    };

    let network = TcpStream::connect(&config.relay_addr)
        .with_context(|| format!("connecting to relay at {}", config.relay_addr))?;
    info!("Connected to relay at {}", config.relay_addr);

    let bridge = Arc::new(Bridge::new(
        player_stream.try_clone()?,
        network.try_clone()?,
        config.echo_timeout,
    ));

    let (tx, rx) = mpsc::channel();

    let (player_bridge, player_tx) = (bridge.clone(), tx.clone());
    thread::spawn(move || {
        let result = player_bridge.run_player_loop(BufReader::new(player_stream));
        let _ = player_tx.send(Exit::PlayerLoop(result));
    });

    let (network_bridge, network_tx) = (bridge, tx.clone());
    thread::spawn(move || {
        let result = network_bridge.run_network_loop(BufReader::new(network));
        let _ = network_tx.send(Exit::NetworkLoop(result));
    });

    let has_process = process.is_some();
    if let Some(process) = process {
        spawn_player_watch(process, tx);
    } else {
        drop(tx);
    }

    supervise(rx, has_process)
}

fn spawn_player_watch(mut process: PlayerProcess, tx: mpsc::Sender<Exit>) {
    thread::spawn(move || {
        let status = process.wait();
        let _ = tx.send(Exit::Player(status));
    });
}

fn supervise(rx: mpsc::Receiver<Exit>, has_process: bool) -> Result<()> {
    let mut loops_running = 2;

    for exit in rx {
        match exit {
            Exit::PlayerLoop(Err(e)) if e.is_fatal() => {
                error!("player control channel is unusable: {e}");
                return Err(e).context("player control channel");
            }
            Exit::PlayerLoop(result) | Exit::NetworkLoop(result) => {
                loops_running -= 1;
                match result {
                    Ok(()) => info!(loops_running, "bridge loop ended"),
                    Err(e) => warn!(loops_running, "bridge loop ended: {e}"),
                }
                if loops_running == 0 && !has_process {
                    return Ok(());
                }
            }
            Exit::Player(Ok(status)) if status.success() => {
                info!("player exited");
                return Ok(());
            }
            Exit::Player(Ok(status)) => bail!("player exited with {status}"),
            Exit::Player(Err(e)) => return Err(e).context("waiting for player"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn fatal_player_error_stops_the_client() {
        let (tx, rx) = mpsc::channel();
        tx.send(Exit::NetworkLoop(Ok(()))).unwrap();
        tx.send(Exit::PlayerLoop(Err(SyncError::PlayerShape("x".into()))))
            .unwrap();

        assert!(supervise(rx, true).is_err());
    }

    #[test]
    fn one_loop_ending_does_not_stop_the_client() {
        let (tx, rx) = mpsc::channel();
        tx.send(Exit::NetworkLoop(Ok(()))).unwrap();
        tx.send(Exit::Player(Ok(ExitStatus::from_raw(1 << 8)))).unwrap();

        // Had supervision stopped at the network loop it would report Ok;
        // the error shows it went on to observe the player exit.
        assert!(supervise(rx, true).is_err());
    }

    #[test]
    fn player_failure_status_is_an_error() {
        let (tx, rx) = mpsc::channel();
        tx.send(Exit::Player(Ok(ExitStatus::from_raw(1 << 8)))).unwrap();

        assert!(supervise(rx, true).is_err());
    }

    #[test]
    fn without_a_process_both_loops_must_end() {
        let (tx, rx) = mpsc::channel();
        tx.send(Exit::PlayerLoop(Err(SyncError::Io(
            io::ErrorKind::ConnectionReset.into(),
        ))))
        .unwrap();
        tx.send(Exit::NetworkLoop(Ok(()))).unwrap();

        // The sender is still alive, so returning proves both exits counted.
        assert!(supervise(rx, false).is_ok());
        drop(tx);
    }
}
