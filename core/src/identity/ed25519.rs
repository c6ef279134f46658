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

//! Ed25519 keys.

use ed25519_dalek::{self as ed25519, Signer as _, Verifier as _};
use zeroize::Zeroize;

/// An Ed25519 keypair.
pub struct Keypair(ed25519::Keypair);

impl Keypair {
    /// Generates a new random Ed25519 keypair.
    pub fn generate() -> Keypair {
        let mut csprng = rand::rngs::OsRng {};
        Keypair(ed25519::Keypair::generate(&mut csprng))
    }

    /// Signs a message with this keypair's private key.
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.0.sign(msg).to_bytes().to_vec()
    }

    /// Returns the public half of this keypair.
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.public)
    }

    /// Encodes the keypair (secret then public, 64 bytes) per the Ed25519
    /// `SIGNING_KEY_LENGTH` convention used by the wire `PrivateKey`.
    pub fn encode(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    /// Decodes a keypair previously produced by [`Keypair::encode`].
    pub fn decode(bytes: &mut [u8]) -> Result<Keypair, DecodingError> {
        let kp = ed25519::Keypair::from_bytes(bytes).map_err(|e| DecodingError(e.to_string()))?;
        bytes.zeroize();
        Ok(Keypair(kp))
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Keypair {
        let mut raw = self.0.to_bytes();
        let kp = ed25519::Keypair::from_bytes(&raw).expect("Keypair bytes are always valid");
        raw.zeroize();
        Keypair(kp)
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair").field("public", &self.0.public).finish()
    }
}

/// An Ed25519 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(ed25519::PublicKey);

impl PublicKey {
    /// Verifies `sig` as a signature of `msg` against this public key.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        ed25519::Signature::try_from_bytes(sig)
            .and_then(|sig| self.0.verify(msg, &sig))
            .is_ok()
    }

    /// Encodes this public key's compressed point (32 bytes).
    pub fn encode(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Decodes a public key previously produced by [`PublicKey::encode`].
    pub fn decode(bytes: &[u8]) -> Result<PublicKey, DecodingError> {
        ed25519::PublicKey::from_bytes(bytes)
            .map(PublicKey)
            .map_err(|e| DecodingError(e.to_string()))
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PublicKey").field(&bs58::encode(self.encode()).into_string()).finish()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to decode Ed25519 key: {0}")]
pub struct DecodingError(String);
