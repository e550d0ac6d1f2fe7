//! Per-listener registry of open capture files, one entry per peer.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use log::{debug, info};

use crate::capture::rotation::Rotator;
use crate::capture::types::{PeerFileState, PeerKey};
use crate::error_handling::types::CaptureError;

/// Maps each peer seen on a listener to its open capture state.
///
/// Entries are created lazily on first datagram and live for the listener's
/// lifetime; there is no idle-peer eviction. The map is owned by exactly one
/// listener and every datagram for a given peer is processed sequentially, so
/// no locking is needed here.
#[derive(Debug)]
pub struct PeerRegistry {
    files: BTreeMap<PeerKey, PeerFileState>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    /// Returns the peer's capture state, creating the generation-1 file via
    /// the rotator on first contact.
    ///
    /// On creation failure nothing is inserted: the datagram that triggered
    /// the creation is dropped by the caller and the next one from the same
    /// peer retries from scratch.
    pub fn get_or_create(
        &mut self,
        peer: PeerKey,
        rotator: &Rotator,
    ) -> Result<&mut PeerFileState, CaptureError> {
        match self.files.entry(peer) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(slot) => {
                debug!("First datagram from {}, opening capture file", peer);
                let state = rotator.rotate(&peer)?;
                info!("Capturing new peer {}", peer);
                Ok(slot.insert(state))
            }
        }
    }

    /// Forgets a peer, closing its file. Used after a failed write so the
    /// next datagram from that peer re-creates the state from scratch.
    pub fn remove(&mut self, peer: &PeerKey) {
        self.files.remove(peer);
    }

    pub fn peer_count(&self) -> usize {
        self.files.len()
    }

    /// Closes every open capture file. Called on listener shutdown; dropping
    /// the handles is sufficient since writes are unbuffered.
    pub fn close_all(&mut self) {
        let n = self.files.len();
        self.files.clear();
        if n > 0 {
            debug!("Closed {} capture file(s)", n);
        }
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
