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

//! ProtocolStore (spec §4.10): the set of protocol ids each remote peer is
//! known to speak, as reported by identify.

use libp2p_core::PeerId;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Enforced on `add_protocols`/`set_protocols`, per spec §4.10.
pub const MAX_PROTOCOLS: usize = 128;

#[derive(Debug, Error)]
pub enum ProtocolStoreError {
    #[error("peer would carry more than {0} protocols")]
    TooManyProtocols(usize),
}

pub struct ProtocolStore {
    peers: Mutex<HashMap<PeerId, HashSet<String>>>,
    max_protocols: usize,
}

impl ProtocolStore {
    pub fn new() -> Self {
        ProtocolStore { peers: Mutex::new(HashMap::new()), max_protocols: MAX_PROTOCOLS }
    }

    pub fn add_protocols(
        &self,
        peer: &PeerId,
        protocols: impl IntoIterator<Item = String>,
    ) -> Result<(), ProtocolStoreError> {
        let mut peers = self.peers.lock();
        let entry = peers.entry(peer.clone()).or_insert_with(HashSet::new);
        let mut candidate = entry.clone();
        candidate.extend(protocols);
        if candidate.len() > self.max_protocols {
            return Err(ProtocolStoreError::TooManyProtocols(self.max_protocols));
        }
        *entry = candidate;
        Ok(())
    }

    pub fn set_protocols(
        &self,
        peer: &PeerId,
        protocols: impl IntoIterator<Item = String>,
    ) -> Result<(), ProtocolStoreError> {
        let candidate: HashSet<String> = protocols.into_iter().collect();
        if candidate.len() > self.max_protocols {
            return Err(ProtocolStoreError::TooManyProtocols(self.max_protocols));
        }
        self.peers.lock().insert(peer.clone(), candidate);
        Ok(())
    }

    pub fn remove_protocols(&self, peer: &PeerId, protocols: impl IntoIterator<Item = String>) {
        if let Some(entry) = self.peers.lock().get_mut(peer) {
            for p in protocols {
                entry.remove(&p);
            }
        }
    }

    pub fn get_protocols(&self, peer: &PeerId) -> Vec<String> {
        self.peers.lock().get(peer).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn supports_protocols(&self, peer: &PeerId, wanted: &[String]) -> bool {
        match self.peers.lock().get(peer) {
            Some(known) => wanted.iter().any(|p| known.contains(p)),
            None => false,
        }
    }

    pub fn first_supported_protocol(&self, peer: &PeerId, wanted: &[String]) -> Option<String> {
        let peers = self.peers.lock();
        let known = peers.get(peer)?;
        wanted.iter().find(|p| known.contains(*p)).cloned()
    }

    pub(crate) fn remove_peer(&self, peer: &PeerId) {
        self.peers.lock().remove(peer);
    }
}

impl Default for ProtocolStore {
    fn default() -> Self {
        ProtocolStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p_core::identity::Keypair;

    fn peer() -> PeerId {
        PeerId::from_public_key(&Keypair::generate_ed25519().public())
    }

    #[test]
    fn add_then_query_round_trips() {
        let store = ProtocolStore::new();
        let p = peer();
        store.add_protocols(&p, vec!["/a/1.0".to_string(), "/b/1.0".to_string()]).unwrap();
        assert!(store.supports_protocols(&p, &["/b/1.0".to_string()]));
        assert_eq!(store.first_supported_protocol(&p, &["/x".to_string(), "/a/1.0".to_string()]), Some("/a/1.0".to_string()));
    }

    #[test]
    fn over_limit_set_is_rejected() {
        let store = ProtocolStore::new();
        let p = peer();
        let many: Vec<String> = (0..MAX_PROTOCOLS + 1).map(|i| format!("/p/{}", i)).collect();
        assert!(matches!(store.set_protocols(&p, many), Err(ProtocolStoreError::TooManyProtocols(_))));
    }

    #[test]
    fn over_limit_add_leaves_existing_set_untouched() {
        let store = ProtocolStore::new();
        let p = peer();
        store.add_protocols(&p, vec!["/a".to_string()]).unwrap();
        let many: Vec<String> = (0..MAX_PROTOCOLS).map(|i| format!("/p/{}", i)).collect();
        assert!(store.add_protocols(&p, many).is_err());
        assert_eq!(store.get_protocols(&p), vec!["/a".to_string()]);
    }
}
