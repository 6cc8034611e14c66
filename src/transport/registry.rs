use crate::api::PeerId;
use crate::peer::Peer;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// The peers of the local member, shared between the transport and the server's handlers. The
/// lock is only held to look a peer up, never while talking to it.
///
/// Removed peers are remembered so the server can tell a removed member apart from one that
/// has not been added yet.
#[derive(Clone, Default)]
pub(crate) struct PeerRegistry {
    inner: Arc<RwLock<Peers>>,
}

#[derive(Default)]
struct Peers {
    active: HashMap<PeerId, Arc<Peer>>,
    removed: HashSet<PeerId>,
}

impl PeerRegistry {
    pub(crate) fn get(&self, id: PeerId) -> Option<Arc<Peer>> {
        self.inner
            .read()
            .expect("PeerRegistry.get() lock poison")
            .active
            .get(&id)
            .cloned()
    }

    pub(crate) fn contains(&self, id: PeerId) -> bool {
        self.inner
            .read()
            .expect("PeerRegistry.contains() lock poison")
            .active
            .contains_key(&id)
    }

    pub(crate) fn is_removed(&self, id: PeerId) -> bool {
        self.inner
            .read()
            .expect("PeerRegistry.is_removed() lock poison")
            .removed
            .contains(&id)
    }

    /// Returns false, leaving the registry unchanged, if `id` is already present. Adding a
    /// peer back clears its removed mark.
    pub(crate) fn insert(&self, id: PeerId, peer: Arc<Peer>) -> bool {
        let mut peers = self.inner.write().expect("PeerRegistry.insert() lock poison");
        if peers.active.contains_key(&id) {
            return false;
        }
        peers.removed.remove(&id);
        peers.active.insert(id, peer);
        true
    }

    pub(crate) fn remove(&self, id: PeerId) -> Option<Arc<Peer>> {
        let mut peers = self.inner.write().expect("PeerRegistry.remove() lock poison");
        let peer = peers.active.remove(&id)?;
        peers.removed.insert(id);
        Some(peer)
    }

    /// Takes every peer out for shutdown. Drained peers are not marked removed.
    pub(crate) fn drain(&self) -> Vec<Arc<Peer>> {
        self.inner
            .write()
            .expect("PeerRegistry.drain() lock poison")
            .active
            .drain()
            .map(|(_, peer)| peer)
            .collect()
    }
}
