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

//! secp256k1 keys, feature-gated behind `secp256k1` as in upstream.

use libsecp256k1 as secp256k1;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

#[derive(Clone)]
pub struct Keypair {
    secret: SecretKey,
    public: PublicKey,
}

impl Keypair {
    pub fn generate() -> Keypair {
        let secret = SecretKey::generate();
        let public = secret.public();
        Keypair { secret, public }
    }

    /// Reconstructs a keypair from a previously-generated secret key.
    pub fn from_secret(secret: SecretKey) -> Keypair {
        let public = secret.public();
        Keypair { secret, public }
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public(&self) -> PublicKey {
        self.public.clone()
    }

    /// Signs the SHA2-256 digest of `msg`, as libp2p's secp256k1 scheme
    /// requires (DER-encoded ECDSA signature over SHA-256).
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        let digest = Sha256::digest(msg);
        let message = secp256k1::Message::parse_slice(&digest).expect("sha256 digest is 32 bytes");
        let (sig, _recovery) = secp256k1::sign(&message, &self.secret.0);
        sig.serialize_der().as_ref().to_vec()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair").field("public", &self.public).finish()
    }
}

#[derive(Clone)]
pub struct SecretKey(secp256k1::SecretKey);

impl SecretKey {
    pub fn generate() -> SecretKey {
        let mut rng = rand::rngs::OsRng {};
        SecretKey(secp256k1::SecretKey::random(&mut rng))
    }

    pub fn public(&self) -> PublicKey {
        PublicKey(secp256k1::PublicKey::from_secret_key(&self.0))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.serialize()
    }

    pub fn from_bytes(mut bytes: [u8; 32]) -> Result<SecretKey, DecodingError> {
        let sk = secp256k1::SecretKey::parse(&bytes).map_err(|e| DecodingError(format!("{:?}", e)));
        bytes.zeroize();
        sk.map(SecretKey)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(secp256k1::PublicKey);

impl PublicKey {
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        let digest = Sha256::digest(msg);
        let message = match secp256k1::Message::parse_slice(&digest) {
            Ok(m) => m,
            Err(_) => return false,
        };
        let sig = match secp256k1::Signature::parse_der(sig) {
            Ok(s) => s,
            Err(_) => return false,
        };
        secp256k1::verify(&message, &sig, &self.0)
    }

    /// Compressed SEC1 point encoding (33 bytes), as libp2p's wire form uses.
    pub fn encode(&self) -> [u8; 33] {
        self.0.serialize_compressed()
    }

    pub fn decode(bytes: &[u8]) -> Result<PublicKey, DecodingError> {
        secp256k1::PublicKey::parse_slice(bytes, Some(secp256k1::PublicKeyFormat::Compressed))
            .map(PublicKey)
            .map_err(|e| DecodingError(format!("{:?}", e)))
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PublicKey").field(&bs58::encode(self.encode()).into_string()).finish()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to decode secp256k1 key: {0}")]
pub struct DecodingError(String);
