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

//! CertifiedAddressBook (spec §4.10): the latest self-certified
//! [`PeerRecord`] seen for each peer, keyed by strictly-increasing sequence
//! number so a stale or replayed envelope can never overwrite a fresher one.

use crate::record::{Envelope, PeerRecord, RecordError};
use libp2p_core::PeerId;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertifiedAddressBookError {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("envelope's sequence number {seq} is not newer than the stored {stored}")]
    Stale { seq: u64, stored: u64 },
}

pub struct CertifiedAddressBook {
    records: Mutex<HashMap<PeerId, PeerRecord>>,
}

impl CertifiedAddressBook {
    pub fn new() -> Self {
        CertifiedAddressBook { records: Mutex::new(HashMap::new()) }
    }

    /// Verifies `envelope`'s signature, checks that the enclosed peer id
    /// matches the envelope's signing key, and accepts the record only if
    /// its `seq` is strictly greater than what is already stored for that
    /// peer, per spec §4.10.
    pub fn consume_peer_record(&self, envelope: Envelope) -> Result<(), CertifiedAddressBookError> {
        let record = envelope.into_peer_record()?;
        let mut records = self.records.lock();
        if let Some(existing) = records.get(&record.peer_id) {
            if record.seq <= existing.seq {
                return Err(CertifiedAddressBookError::Stale { seq: record.seq, stored: existing.seq });
            }
        }
        records.insert(record.peer_id.clone(), record);
        Ok(())
    }

    pub fn latest(&self, peer: &PeerId) -> Option<PeerRecord> {
        self.records.lock().get(peer).cloned()
    }

    pub(crate) fn remove_peer(&self, peer: &PeerId) {
        self.records.lock().remove(peer);
    }
}

impl Default for CertifiedAddressBook {
    fn default() -> Self {
        CertifiedAddressBook::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p_core::identity::Keypair;

    fn signed(seq: u64, keypair: &Keypair) -> Envelope {
        let peer_id = PeerId::from_public_key(&keypair.public());
        PeerRecord { peer_id, seq, addrs: vec!["/ip4/127.0.0.1/tcp/4001".parse().unwrap()] }.sign(keypair)
    }

    #[test]
    fn first_record_is_accepted() {
        let book = CertifiedAddressBook::new();
        let keypair = Keypair::generate_ed25519();
        let peer_id = PeerId::from_public_key(&keypair.public());
        book.consume_peer_record(signed(1, &keypair)).unwrap();
        assert_eq!(book.latest(&peer_id).unwrap().seq, 1);
    }

    #[test]
    fn stale_seq_is_rejected() {
        let book = CertifiedAddressBook::new();
        let keypair = Keypair::generate_ed25519();
        let peer_id = PeerId::from_public_key(&keypair.public());
        book.consume_peer_record(signed(5, &keypair)).unwrap();
        let result = book.consume_peer_record(signed(3, &keypair));
        assert!(matches!(result, Err(CertifiedAddressBookError::Stale { .. })));
        assert_eq!(book.latest(&peer_id).unwrap().seq, 5);
    }

    #[test]
    fn newer_seq_replaces_stored_record() {
        let book = CertifiedAddressBook::new();
        let keypair = Keypair::generate_ed25519();
        let peer_id = PeerId::from_public_key(&keypair.public());
        book.consume_peer_record(signed(1, &keypair)).unwrap();
        book.consume_peer_record(signed(2, &keypair)).unwrap();
        assert_eq!(book.latest(&peer_id).unwrap().seq, 2);
    }
}
