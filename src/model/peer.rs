//! Relay peers
//!
//! The relay keeps one writer per connected peer. Membership changes and
//! broadcasts all happen under the same lock, so the set of recipients is
//! fixed for the duration of a single broadcast.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(u64);

impl PeerId {
    /// Allocate a process-unique id.
    pub fn next() -> PeerId {
        static ID_COUNTER: AtomicU64 = AtomicU64::new(0);
        PeerId(ID_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Connected peers, keyed by id. `W` is the write half of each connection.
#[derive(Debug)]
pub struct PeerSet<W = TcpStream> {
    peers: Mutex<HashMap<PeerId, W>>,
}

impl<W> Default for PeerSet<W> {
    fn default() -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
        }
    }
}

impl<W: Write> PeerSet<W> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PeerId, W>> {
        // A panic while broadcasting leaves the map itself intact.
        self.peers.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, id: PeerId, writer: W) {
        self.lock().insert(id, writer);
    }

    /// Remove a peer, returning its writer if it was still present.
    pub fn remove(&self, id: PeerId) -> Option<W> {
        self.lock().remove(&id)
    }

    #[cfg(test)]
    pub fn contains(&self, id: PeerId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Write `message` verbatim to every peer except `origin`.
    ///
    /// A failed write is logged and skipped. It does not remove the peer;
    /// that only happens through the peer's own read loop. Returns the number
    /// of peers the message reached.
    pub fn broadcast(&self, origin: PeerId, message: &[u8]) -> usize {
        let mut peers = self.lock();
        let mut delivered = 0;

        for (id, writer) in peers.iter_mut() {
            if *id == origin {
                // Do not propagate to originating peer.
                continue;
            }

            match writer.write_all(message).and_then(|_| writer.flush()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(peer = %id, %origin, "failed to relay event to peer: {e}"),
            }
        }

        debug!(%origin, delivered, "broadcast");
        delivered
    }
}
