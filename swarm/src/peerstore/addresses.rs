// Copyright 2019 Parity Technologies (UK) Ltd.
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! AddressStore (spec §4.10): `PeerId -> {(Multiaddr, expiry, ttl)}`, with a
//! background GC sweep, an LRU lookup cache, and lazy per-peer address
//! streams for subscribers who want to observe newly-learned addresses.

use futures::channel::mpsc;
use futures::stream::Stream;
use libp2p_core::{Multiaddr, PeerId};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use wasm_timer::Instant;

/// A TTL that never expires. `addAddress` never demotes an entry already at
/// this TTL down to a shorter one; only [`AddressStore::set_addresses`] and
/// [`AddressStore::update_addresses`] may do that, since those are the
/// explicit "replace" operations spec §4.10 carves out for it.
pub const PERMANENT_ADDR_TTL: Duration = Duration::from_secs(u64::MAX as u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Expiry {
    At(Instant),
    Permanent,
}

impl Expiry {
    fn from_now(ttl: Duration, now: Instant) -> Expiry {
        if ttl == PERMANENT_ADDR_TTL {
            Expiry::Permanent
        } else {
            Expiry::At(now + ttl)
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        match self {
            Expiry::Permanent => true,
            Expiry::At(t) => *t > now,
        }
    }

    /// The later of the two expiries, per `addAddress`'s
    /// `max(current, now + ttl)` extension rule. A permanent entry is never
    /// shortened by this path.
    fn extended_with(self, other: Expiry) -> Expiry {
        match (self, other) {
            (Expiry::Permanent, _) | (_, Expiry::Permanent) => Expiry::Permanent,
            (Expiry::At(a), Expiry::At(b)) => Expiry::At(a.max(b)),
        }
    }
}

struct Entry {
    ttl: Duration,
    expiry: Expiry,
}

struct PeerAddresses {
    entries: HashMap<Multiaddr, Entry>,
    subscribers: Vec<mpsc::UnboundedSender<Multiaddr>>,
}

impl PeerAddresses {
    fn new() -> Self {
        PeerAddresses { entries: HashMap::new(), subscribers: Vec::new() }
    }

    fn notify(&mut self, addr: &Multiaddr) {
        self.subscribers.retain(|tx| tx.unbounded_send(addr.clone()).is_ok());
    }
}

/// The address half of the peerstore.
pub struct AddressStore {
    inner: Arc<Mutex<AddressStoreInner>>,
}

struct AddressStoreInner {
    peers: HashMap<PeerId, PeerAddresses>,
    cache: LruCache<PeerId, ()>,
}

impl AddressStore {
    /// `cache_size` is spec §4.10's `cacheSize` (default 1024): the capacity
    /// of the LRU of recently-looked-up peers that sits in front of the
    /// backing map. Since the map itself is in-memory here, the cache's
    /// only visible effect is which peers survive an eviction sweep first;
    /// it is tracked so that behavior is easy to extend to a real backing
    /// store later without changing callers.
    pub fn new(cache_size: usize) -> Self {
        AddressStore {
            inner: Arc::new(Mutex::new(AddressStoreInner {
                peers: HashMap::new(),
                cache: LruCache::new(cache_size.max(1)),
            })),
        }
    }

    fn touch(inner: &mut AddressStoreInner, peer: &PeerId) {
        inner.cache.put(peer.clone(), ());
    }

    /// Adds one address, extending its expiry to `max(current, now + ttl)`.
    pub fn add_address(&self, peer: &PeerId, addr: Multiaddr, ttl: Duration) {
        self.add_addresses(peer, std::iter::once((addr, ttl)));
    }

    pub fn add_addresses(&self, peer: &PeerId, addrs: impl IntoIterator<Item = (Multiaddr, Duration)>) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        Self::touch(&mut inner, peer);
        let peer_addrs = inner.peers.entry(peer.clone()).or_insert_with(PeerAddresses::new);
        for (addr, ttl) in addrs {
            let new_expiry = Expiry::from_now(ttl, now);
            let is_new = !peer_addrs.entries.contains_key(&addr);
            let entry = peer_addrs.entries.entry(addr.clone()).or_insert(Entry { ttl, expiry: new_expiry });
            entry.expiry = entry.expiry.extended_with(new_expiry);
            entry.ttl = ttl;
            if is_new {
                peer_addrs.notify(&addr);
            }
        }
    }

    /// Replaces the full set of addresses for `peer`, unconditionally — the
    /// "explicit set-TTL operation" that is allowed to shorten or drop a
    /// permanent entry.
    pub fn set_addresses(&self, peer: &PeerId, addrs: impl IntoIterator<Item = (Multiaddr, Duration)>) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        Self::touch(&mut inner, peer);
        let peer_addrs = inner.peers.entry(peer.clone()).or_insert_with(PeerAddresses::new);
        peer_addrs.entries.clear();
        for (addr, ttl) in addrs {
            let expiry = Expiry::from_now(ttl, now);
            peer_addrs.entries.insert(addr.clone(), Entry { ttl, expiry });
            peer_addrs.notify(&addr);
        }
    }

    /// Re-stamps every address currently carrying `old_ttl` to `new_ttl`,
    /// recomputed from now. Also an explicit operation, so it may shorten a
    /// permanent entry if `old_ttl` is [`PERMANENT_ADDR_TTL`].
    pub fn update_addresses(&self, peer: &PeerId, old_ttl: Duration, new_ttl: Duration) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        Self::touch(&mut inner, peer);
        if let Some(peer_addrs) = inner.peers.get_mut(peer) {
            let new_expiry = Expiry::from_now(new_ttl, now);
            for entry in peer_addrs.entries.values_mut() {
                if entry.ttl == old_ttl {
                    entry.ttl = new_ttl;
                    entry.expiry = new_expiry;
                }
            }
        }
    }

    /// The unexpired addresses known for `peer`, in no particular order.
    pub fn addresses(&self, peer: &PeerId) -> Vec<Multiaddr> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        Self::touch(&mut inner, peer);
        match inner.peers.get(peer) {
            Some(peer_addrs) => peer_addrs
                .entries
                .iter()
                .filter(|(_, e)| e.expiry.is_live(now))
                .map(|(addr, _)| addr.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn clear_addresses(&self, peer: &PeerId) {
        let mut inner = self.inner.lock();
        inner.peers.remove(peer);
    }

    /// A lazy stream of this peer's addresses: immediately replays every
    /// address currently known, then emits each newly-learned address once
    /// as it is added. The stream only ends when the subscriber drops it.
    pub fn address_stream(&self, peer: &PeerId) -> impl Stream<Item = Multiaddr> {
        let now = Instant::now();
        let (tx, rx) = mpsc::unbounded();
        let mut inner = self.inner.lock();
        Self::touch(&mut inner, peer);
        let peer_addrs = inner.peers.entry(peer.clone()).or_insert_with(PeerAddresses::new);

        let mut seen = HashSet::new();
        for (addr, entry) in &peer_addrs.entries {
            if entry.expiry.is_live(now) && seen.insert(addr.clone()) {
                let _ = tx.unbounded_send(addr.clone());
            }
        }
        peer_addrs.subscribers.push(tx);
        rx
    }

    /// Evicts every expired entry across all peers. Intended to be driven
    /// periodically by a background task (spec §4.10's `gcPurgeInterval`,
    /// default 1 h, after an initial `gcInitialDelay`, default 1 h).
    pub fn collect_garbage(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.peers.retain(|_, peer_addrs| {
            peer_addrs.entries.retain(|_, entry| entry.expiry.is_live(now));
            !peer_addrs.entries.is_empty() || !peer_addrs.subscribers.is_empty()
        });
    }

    pub(crate) fn remove_peer(&self, peer: &PeerId) {
        self.clear_addresses(peer);
    }
}

impl Clone for AddressStore {
    fn clone(&self) -> Self {
        AddressStore { inner: self.inner.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use libp2p_core::identity::Keypair;

    fn peer() -> PeerId {
        PeerId::from_public_key(&Keypair::generate_ed25519().public())
    }

    fn addr(s: &str) -> Multiaddr {
        s.parse().unwrap()
    }

    #[test]
    fn add_address_extends_expiry_but_never_shortens_permanent() {
        let store = AddressStore::new(8);
        let p = peer();
        store.add_address(&p, addr("/ip4/127.0.0.1/tcp/1"), PERMANENT_ADDR_TTL);
        store.add_address(&p, addr("/ip4/127.0.0.1/tcp/1"), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.addresses(&p), vec![addr("/ip4/127.0.0.1/tcp/1")]);
    }

    #[test]
    fn expired_addresses_are_invisible_to_readers() {
        let store = AddressStore::new(8);
        let p = peer();
        store.add_address(&p, addr("/ip4/127.0.0.1/tcp/1"), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        assert!(store.addresses(&p).is_empty());
    }

    #[test]
    fn garbage_collection_evicts_expired_entries() {
        let store = AddressStore::new(8);
        let p = peer();
        store.add_address(&p, addr("/ip4/127.0.0.1/tcp/1"), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        store.collect_garbage();
        assert!(store.inner.lock().peers.get(&p).is_none());
    }

    #[test]
    fn set_addresses_can_shorten_a_permanent_entry() {
        let store = AddressStore::new(8);
        let p = peer();
        store.add_address(&p, addr("/ip4/127.0.0.1/tcp/1"), PERMANENT_ADDR_TTL);
        store.set_addresses(&p, vec![(addr("/ip4/127.0.0.1/tcp/1"), Duration::from_millis(1))]);
        std::thread::sleep(Duration::from_millis(10));
        assert!(store.addresses(&p).is_empty());
    }

    #[async_std::test]
    async fn address_stream_replays_known_then_emits_new() {
        let store = AddressStore::new(8);
        let p = peer();
        store.add_address(&p, addr("/ip4/127.0.0.1/tcp/1"), Duration::from_secs(60));
        let mut stream = Box::pin(store.address_stream(&p));
        assert_eq!(stream.next().await, Some(addr("/ip4/127.0.0.1/tcp/1")));

        store.add_address(&p, addr("/ip4/127.0.0.1/tcp/2"), Duration::from_secs(60));
        assert_eq!(stream.next().await, Some(addr("/ip4/127.0.0.1/tcp/2")));
    }
}
