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

//! Identity keys: the sign/verify/marshal surface that everything else in
//! this crate (PeerId derivation, Plaintext, Noise) treats as a collaborator
//! contract. Two concrete algorithms are wired up, matching the subset of
//! `KeyType` the default feature set of this workspace exercises; `Rsa` and
//! `Ecdsa` exist on the wire enum (§6) but have no local keypair type since
//! no in-scope handshake needs to mint one.

pub mod ed25519;
#[cfg(feature = "secp256k1")]
pub mod secp256k1;

use prost::Message as _;
use thiserror::Error;

/// Generated from `keys.proto`.
pub mod proto {
    include!(concat!(env!("OUT_DIR"), "/keys_proto.rs"));
}

#[derive(Debug, Error)]
pub enum DecodingError {
    #[error("invalid protobuf encoding for key")]
    InvalidProtobuf(#[from] prost::DecodeError),
    #[error("unsupported key type {0:?}")]
    UnsupportedType(i32),
    #[error("malformed key data: {0}")]
    MalformedKey(String),
}

/// A keypair for one of the supported identity algorithms.
#[derive(Clone, Debug)]
pub enum Keypair {
    Ed25519(ed25519::Keypair),
    #[cfg(feature = "secp256k1")]
    Secp256k1(secp256k1::Keypair),
}

impl Keypair {
    pub fn generate_ed25519() -> Keypair {
        Keypair::Ed25519(ed25519::Keypair::generate())
    }

    #[cfg(feature = "secp256k1")]
    pub fn generate_secp256k1() -> Keypair {
        Keypair::Secp256k1(secp256k1::Keypair::generate())
    }

    /// Signs a message with this keypair's private key.
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        match self {
            Keypair::Ed25519(k) => k.sign(msg),
            #[cfg(feature = "secp256k1")]
            Keypair::Secp256k1(k) => k.sign(msg),
        }
    }

    /// Returns the public half of this keypair.
    pub fn public(&self) -> PublicKey {
        match self {
            Keypair::Ed25519(k) => PublicKey::Ed25519(k.public()),
            #[cfg(feature = "secp256k1")]
            Keypair::Secp256k1(k) => PublicKey::Secp256k1(k.public()),
        }
    }

    /// Encodes this keypair, private key included, into the wire-format
    /// `PrivateKey` protobuf (§6). Intended for at-rest storage (see
    /// `libp2p-swarm`'s `KeyStore`), never for transmission.
    pub fn to_protobuf_encoding(&self) -> Vec<u8> {
        let (key_type, data) = match self {
            Keypair::Ed25519(k) => (proto::KeyType::Ed25519, k.encode().to_vec()),
            #[cfg(feature = "secp256k1")]
            Keypair::Secp256k1(k) => (proto::KeyType::Secp256k1, k.secret().to_bytes().to_vec()),
        };
        let msg = proto::PrivateKey { r#type: key_type as i32, data };
        let mut buf = Vec::with_capacity(msg.encoded_len());
        msg.encode(&mut buf).expect("Vec<u8> provides sufficient capacity");
        buf
    }

    /// Decodes a `PrivateKey` protobuf as produced by
    /// [`Keypair::to_protobuf_encoding`].
    pub fn from_protobuf_encoding(bytes: &[u8]) -> Result<Keypair, DecodingError> {
        let msg = proto::PrivateKey::decode(bytes)?;
        match proto::KeyType::from_i32(msg.r#type) {
            Some(proto::KeyType::Ed25519) => {
                let mut data = msg.data;
                ed25519::Keypair::decode(&mut data).map(Keypair::Ed25519).map_err(|e| DecodingError::MalformedKey(e.to_string()))
            }
            #[cfg(feature = "secp256k1")]
            Some(proto::KeyType::Secp256k1) => {
                let mut bytes = [0u8; 32];
                if msg.data.len() != 32 {
                    return Err(DecodingError::MalformedKey("secp256k1 secret key must be 32 bytes".to_string()));
                }
                bytes.copy_from_slice(&msg.data);
                let secret = secp256k1::SecretKey::from_bytes(bytes).map_err(|e| DecodingError::MalformedKey(e.to_string()))?;
                Ok(Keypair::Secp256k1(secp256k1::Keypair::from_secret(secret)))
            }
            Some(other) => Err(DecodingError::UnsupportedType(other as i32)),
            None => Err(DecodingError::UnsupportedType(msg.r#type)),
        }
    }
}

/// A public key for one of the supported identity algorithms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Ed25519(ed25519::PublicKey),
    #[cfg(feature = "secp256k1")]
    Secp256k1(secp256k1::PublicKey),
}

impl PublicKey {
    /// Verifies `sig` as a signature of `msg` against this public key.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        match self {
            PublicKey::Ed25519(k) => k.verify(msg, sig),
            #[cfg(feature = "secp256k1")]
            PublicKey::Secp256k1(k) => k.verify(msg, sig),
        }
    }

    /// Encodes this key into the wire-format `PublicKey` protobuf (§6).
    pub fn into_protobuf_encoding(&self) -> Vec<u8> {
        let (key_type, data) = match self {
            PublicKey::Ed25519(k) => (proto::KeyType::Ed25519, k.encode().to_vec()),
            #[cfg(feature = "secp256k1")]
            PublicKey::Secp256k1(k) => (proto::KeyType::Secp256k1, k.encode().to_vec()),
        };
        let msg = proto::PublicKey { r#type: key_type as i32, data };
        let mut buf = Vec::with_capacity(msg.encoded_len());
        msg.encode(&mut buf).expect("Vec<u8> provides sufficient capacity");
        buf
    }

    /// Decodes a `PublicKey` protobuf as produced by
    /// [`PublicKey::into_protobuf_encoding`].
    pub fn from_protobuf_encoding(bytes: &[u8]) -> Result<PublicKey, DecodingError> {
        let msg = proto::PublicKey::decode(bytes)?;
        match proto::KeyType::from_i32(msg.r#type) {
            Some(proto::KeyType::Ed25519) => ed25519::PublicKey::decode(&msg.data)
                .map(PublicKey::Ed25519)
                .map_err(|e| DecodingError::MalformedKey(e.to_string())),
            #[cfg(feature = "secp256k1")]
            Some(proto::KeyType::Secp256k1) => secp256k1::PublicKey::decode(&msg.data)
                .map(PublicKey::Secp256k1)
                .map_err(|e| DecodingError::MalformedKey(e.to_string())),
            Some(other) => Err(DecodingError::UnsupportedType(other as i32)),
            None => Err(DecodingError::UnsupportedType(msg.r#type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_protobuf_round_trip() {
        let kp = Keypair::generate_ed25519();
        let pk = kp.public();
        let encoded = pk.into_protobuf_encoding();
        let decoded = PublicKey::from_protobuf_encoding(&encoded).unwrap();
        assert_eq!(pk, decoded);
    }

    #[cfg(feature = "secp256k1")]
    #[test]
    fn secp256k1_protobuf_round_trip() {
        let kp = Keypair::generate_secp256k1();
        let pk = kp.public();
        let encoded = pk.into_protobuf_encoding();
        let decoded = PublicKey::from_protobuf_encoding(&encoded).unwrap();
        assert_eq!(pk, decoded);
    }

    #[test]
    fn sign_and_verify() {
        let kp = Keypair::generate_ed25519();
        let sig = kp.sign(b"hello world");
        assert!(kp.public().verify(b"hello world", &sig));
        assert!(!kp.public().verify(b"goodbye world", &sig));
    }
}
