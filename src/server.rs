//! Broadcast relay
//!
//! Accepts TCP connections from bridges and copies every line received from
//! one peer to all the others. The relay never decodes lines; it is pure
//! fan-out. Each peer gets its own reader thread, and all peers share one
//! `PeerSet` owned by the `Relay` service object.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::model::peer::{PeerId, PeerSet};
use crate::util::{init_log, select_host_address};

pub struct Relay {
    listener: TcpListener,
    peers: Arc<PeerSet>,
    max_read_failures: u32,
}

impl Relay {
    pub fn bind(config: &RelayConfig) -> io::Result<Relay> {
        let listener = TcpListener::bind(config.listen_addr())?;
        Ok(Relay {
            listener,
            peers: Arc::new(PeerSet::new()),
            max_read_failures: config.max_read_failures,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle to the peer set, for inspection.
    pub fn peers(&self) -> Arc<PeerSet> {
        self.peers.clone()
    }

    /// Run the accept loop on the current thread. Only returns if accepting
    /// fails, which is fatal for the relay.
    pub fn serve(self) -> io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept()?;
            self.accept(stream, addr);
        }
    }

    /// Run the accept loop on a background thread.
    pub fn spawn(self) -> thread::JoinHandle<io::Result<()>> {
        thread::spawn(move || self.serve())
    }

    fn accept(&self, stream: TcpStream, addr: SocketAddr) {
        let writer = match stream.try_clone() {
            Ok(s) => s,
            Err(e) => {
                warn!(%addr, "dropping connection, could not clone stream: {e}");
                return;
            }
        };

        let id = PeerId::next();
        self.peers.insert(id, writer);
        info!(peer = %id, %addr, peers = self.peers.len(), "peer connected");

        let peers = self.peers.clone();
        let max_read_failures = self.max_read_failures;
        thread::spawn(move || {
            read_loop(BufReader::new(stream), id, &*peers, max_read_failures);

            if let Some(writer) = peers.remove(id) {
                let _ = writer.shutdown(Shutdown::Both);
            }
            info!(peer = %id, peers = peers.len(), "peer disconnected");
        });
    }
}

/// Failed reads seen on one connection. Counted wider than the limit so
/// `max + 1` is always reachable.
#[derive(Debug)]
struct FailureCount {
    count: u64,
    max: u32,
}

impl FailureCount {
    fn new(max: u32) -> Self {
        Self { count: 0, max }
    }

    fn record(&mut self) -> u64 {
        self.count += 1;
        self.count
    }

    fn exhausted(&self) -> bool {
        self.count > u64::from(self.max)
    }
}

/// Read lines from one peer and broadcast them, until the peer has failed
/// more than `max_failures` reads.
///
/// Every failed read counts, including EOF and a trailing fragment with no
/// newline. The count is never reset by a later successful read.
fn read_loop<R: BufRead, W: Write>(
    mut reader: R,
    id: PeerId,
    peers: &PeerSet<W>,
    max_failures: u32,
) {
    let mut failures = FailureCount::new(max_failures);
    let mut message = Vec::new();

    loop {
        message.clear();

        match reader.read_until(b'\n', &mut message) {
            Ok(_) if message.ends_with(b"\n") => {
                debug!(peer = %id, "{}", String::from_utf8_lossy(&message).trim_end());
                peers.broadcast(id, &message);
            }
            Ok(0) => {
                let failures = failures.record();
                debug!(peer = %id, failures, "failed to read from connection: eof");
            }
            Ok(n) => {
                let failures = failures.record();
                warn!(peer = %id, failures, "discarding {n} bytes without a newline");
            }
            Err(e) => {
                let failures = failures.record();
                warn!(peer = %id, failures, "failed to read from connection: {e}");
            }
        }

        if failures.exhausted() {
            break;
        }
    }
}

pub fn main(config: RelayConfig) -> Result<()> {
    init_log();

    let relay = Relay::bind(&config)
        .with_context(|| format!("binding relay to {}", config.listen_addr()))?;
    let addr = relay.local_addr()?;
    info!("Relay listening on {}", addr);

    match select_host_address() {
        Some(host) => info!("Peers can dial {}:{}", host, addr.port()),
        None => warn!("Found no routable network interface to advertise"),
    }

    relay.serve().context("accepting connections")
}
