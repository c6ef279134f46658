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

//! Signed peer records (spec §6): a `PeerRecord{peerId, seq, addrs}` wrapped
//! in an `Envelope{publicKey, payloadType, payload, signature}`, where the
//! signature covers a domain-separated transcript of the payload rather than
//! the payload bytes directly.

use libp2p_core::identity::PublicKey;
use libp2p_core::{Multiaddr, PeerId};
use prost::Message as _;
use std::convert::TryFrom;
use thiserror::Error;

mod proto {
    include!(concat!(env!("OUT_DIR"), "/peer_record_pb.rs"));
}

/// Prefixed to the payload before signing, so a peer-record signature can
/// never be replayed as a signature over some other envelope payload type.
const DOMAIN_SEPARATOR: &[u8] = b"libp2p-peer-record";

pub const PAYLOAD_TYPE_PEER_RECORD: &str = "libp2p/peer-record";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid protobuf encoding: {0}")]
    InvalidMessage(#[from] prost::DecodeError),
    #[error("envelope signature does not verify")]
    BadSignature,
    #[error("envelope public key does not match the enclosed peer id")]
    PeerIdMismatch,
    #[error("malformed peer id bytes")]
    InvalidPeerId,
    #[error("malformed multiaddr bytes")]
    InvalidMultiaddr,
}

/// A signed, versioned set of addresses for one peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerRecord {
    pub peer_id: PeerId,
    pub seq: u64,
    pub addrs: Vec<Multiaddr>,
}

impl PeerRecord {
    fn into_payload(self) -> Vec<u8> {
        let msg = proto::PeerRecord {
            peer_id: Some(self.peer_id.to_bytes()),
            seq: Some(self.seq),
            addrs: self.addrs.into_iter().map(Vec::from).collect(),
        };
        let mut buf = Vec::with_capacity(msg.encoded_len());
        msg.encode(&mut buf).expect("Vec<u8> provides sufficient capacity");
        buf
    }

    fn from_payload(bytes: &[u8]) -> Result<Self, RecordError> {
        let msg = proto::PeerRecord::decode(bytes)?;
        let peer_id = PeerId::from_bytes(&msg.peer_id.ok_or(RecordError::InvalidPeerId)?)
            .map_err(|_| RecordError::InvalidPeerId)?;
        let addrs = msg
            .addrs
            .into_iter()
            .map(|a| Multiaddr::try_from(a).map_err(|_| RecordError::InvalidMultiaddr))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PeerRecord { peer_id, seq: msg.seq.unwrap_or(0), addrs })
    }

    /// Signs this record with `keypair`, producing the envelope that is
    /// carried in identify's `signedPeerRecord` field and fed to
    /// [`crate::peerstore::certified::CertifiedAddressBook::consume_peer_record`].
    pub fn sign(self, keypair: &libp2p_core::identity::Keypair) -> Envelope {
        let public_key = keypair.public();
        let payload = self.into_payload();
        let signature = keypair.sign(&signing_transcript(PAYLOAD_TYPE_PEER_RECORD, &payload));
        Envelope { public_key, payload_type: PAYLOAD_TYPE_PEER_RECORD.to_string(), payload, signature }
    }
}

fn signing_transcript(payload_type: &str, payload: &[u8]) -> Vec<u8> {
    let mut transcript = Vec::with_capacity(DOMAIN_SEPARATOR.len() + 16 + payload_type.len() + payload.len());
    transcript.extend_from_slice(DOMAIN_SEPARATOR);
    transcript.extend_from_slice(&(payload_type.len() as u64).to_be_bytes());
    transcript.extend_from_slice(payload_type.as_bytes());
    transcript.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    transcript.extend_from_slice(payload);
    transcript
}

/// A self-certifying, signed container for some payload, per spec §6.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub public_key: PublicKey,
    pub payload_type: String,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Envelope {
    pub fn into_protobuf_encoding(&self) -> Vec<u8> {
        let msg = proto::Envelope {
            public_key: Some(self.public_key.into_protobuf_encoding()),
            payload_type: Some(self.payload_type.clone()),
            payload: Some(self.payload.clone()),
            signature: Some(self.signature.clone()),
        };
        let mut buf = Vec::with_capacity(msg.encoded_len());
        msg.encode(&mut buf).expect("Vec<u8> provides sufficient capacity");
        buf
    }

    pub fn from_protobuf_encoding(bytes: &[u8]) -> Result<Self, RecordError> {
        let msg = proto::Envelope::decode(bytes)?;
        let public_key = PublicKey::from_protobuf_encoding(&msg.public_key.ok_or(RecordError::InvalidPeerId)?)
            .map_err(|_| RecordError::InvalidPeerId)?;
        Ok(Envelope {
            public_key,
            payload_type: msg.payload_type.unwrap_or_default(),
            payload: msg.payload.unwrap_or_default(),
            signature: msg.signature.unwrap_or_default(),
        })
    }

    /// Verifies the envelope's signature against its own public key.
    pub fn verify(&self) -> bool {
        let transcript = signing_transcript(&self.payload_type, &self.payload);
        self.public_key.verify(&transcript, &self.signature)
    }

    /// Verifies the envelope and decodes its payload as a [`PeerRecord`],
    /// additionally checking that the enclosed `peerId` matches the
    /// envelope's signing key, per spec §4.10.
    pub fn into_peer_record(self) -> Result<PeerRecord, RecordError> {
        if !self.verify() {
            return Err(RecordError::BadSignature);
        }
        let record = PeerRecord::from_payload(&self.payload)?;
        if record.peer_id != PeerId::from_public_key(&self.public_key) {
            return Err(RecordError::PeerIdMismatch);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p_core::identity::Keypair;

    #[test]
    fn sign_and_verify_round_trips() {
        let keypair = Keypair::generate_ed25519();
        let peer_id = PeerId::from_public_key(&keypair.public());
        let record = PeerRecord { peer_id, seq: 1, addrs: vec!["/ip4/127.0.0.1/tcp/4001".parse().unwrap()] };

        let envelope = record.clone().sign(&keypair);
        let bytes = envelope.into_protobuf_encoding();
        let decoded = Envelope::from_protobuf_encoding(&bytes).unwrap();
        let recovered = decoded.into_peer_record().unwrap();
        assert_eq!(recovered, record);
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let keypair = Keypair::generate_ed25519();
        let peer_id = PeerId::from_public_key(&keypair.public());
        let record = PeerRecord { peer_id, seq: 1, addrs: vec![] };
        let mut envelope = record.sign(&keypair);
        envelope.payload.push(0xff);
        assert!(matches!(envelope.into_peer_record(), Err(RecordError::BadSignature)));
    }

    #[test]
    fn mismatched_peer_id_is_rejected() {
        let signing_key = Keypair::generate_ed25519();
        let other_peer = PeerId::from_public_key(&Keypair::generate_ed25519().public());
        let record = PeerRecord { peer_id: other_peer, seq: 1, addrs: vec![] };
        let envelope = record.sign(&signing_key);
        assert!(matches!(envelope.into_peer_record(), Err(RecordError::PeerIdMismatch)));
    }
}
