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

use crate::identity::PublicKey;
use crate::multihash::{Multihash, MultihashError, IDENTITY, SHA2_256};
use std::fmt;
use thiserror::Error;

/// Above this many bytes, a public key's protobuf encoding is hashed with
/// SHA2-256 rather than embedded verbatim (see spec §3, "Multiaddress").
const MAX_INLINE_KEY_LENGTH: usize = 42;

/// The identity of a peer: a multihash over that peer's public key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PeerId {
    multihash: Multihash,
}

impl PeerId {
    /// Derives a `PeerId` from a public key, per spec §3: the digest is the
    /// key's protobuf-encoded bytes directly when that encoding is short
    /// enough to embed, otherwise its SHA2-256 hash.
    pub fn from_public_key(key: &PublicKey) -> PeerId {
        let encoded = key.into_protobuf_encoding();
        let multihash = if encoded.len() <= MAX_INLINE_KEY_LENGTH {
            Multihash::identity(&encoded)
        } else {
            Multihash::sha2_256(&encoded)
        };
        PeerId { multihash }
    }

    /// True iff regenerating a `PeerId` from `key` reproduces this one.
    pub fn matches_public_key(&self, key: &PublicKey) -> bool {
        *self == PeerId::from_public_key(key)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.multihash.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<PeerId, MultihashError> {
        let multihash = Multihash::from_bytes(bytes)?;
        if multihash.code() != SHA2_256 && multihash.code() != IDENTITY {
            return Err(MultihashError::UnsupportedCode(multihash.code()));
        }
        Ok(PeerId { multihash })
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.to_bytes()).into_string()
    }

    pub fn from_base58(s: &str) -> Result<PeerId, ParseError> {
        let bytes = bs58::decode(s).into_vec().map_err(|e| ParseError(e.to_string()))?;
        PeerId::from_bytes(&bytes).map_err(|e| ParseError(e.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("invalid PeerId: {0}")]
pub struct ParseError(String);

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.to_base58())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Keypair;

    #[test]
    fn derives_deterministically() {
        let kp = Keypair::generate_ed25519();
        let a = PeerId::from_public_key(&kp.public());
        let b = PeerId::from_public_key(&kp.public());
        assert_eq!(a, b);
    }

    #[test]
    fn matches_own_key_only() {
        let kp1 = Keypair::generate_ed25519();
        let kp2 = Keypair::generate_ed25519();
        let id1 = PeerId::from_public_key(&kp1.public());
        assert!(id1.matches_public_key(&kp1.public()));
        assert!(!id1.matches_public_key(&kp2.public()));
    }

    #[test]
    fn base58_round_trip() {
        let kp = Keypair::generate_ed25519();
        let id = PeerId::from_public_key(&kp.public());
        let s = id.to_base58();
        let back = PeerId::from_base58(&s).unwrap();
        assert_eq!(id, back);
    }
}
