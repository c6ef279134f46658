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

//! A minimal multihash: just enough of the format to build and compare
//! [`crate::PeerId`]s (a single hash function, sha2-256, plus the identity
//! "hash" used when a key's raw bytes are short enough to embed directly).
//!
//! This intentionally does not reimplement the full multihash table; the
//! crypto primitives themselves are an external collaborator per the spec.

use crate::varint;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Multihash function code for SHA2-256, per the multiformats table.
pub const SHA2_256: u64 = 0x12;
/// Multihash function code for "identity" (digest == input), per the
/// multiformats table.
pub const IDENTITY: u64 = 0x00;

#[derive(Debug, Error)]
pub enum MultihashError {
    #[error("unsupported multihash code {0:#x}")]
    UnsupportedCode(u64),
    #[error("multihash digest length does not match its declared length")]
    BadLength,
    #[error(transparent)]
    Varint(#[from] varint::VarintError),
}

/// A self-describing hash digest: `code ‖ len ‖ digest`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Multihash {
    code: u64,
    digest: Vec<u8>,
}

impl Multihash {
    /// Hashes `input` with SHA2-256 and wraps the digest as a multihash.
    pub fn sha2_256(input: &[u8]) -> Multihash {
        let digest = Sha256::digest(input).to_vec();
        Multihash { code: SHA2_256, digest }
    }

    /// Wraps `input` directly as an "identity" multihash (no hashing).
    pub fn identity(input: &[u8]) -> Multihash {
        Multihash { code: IDENTITY, digest: input.to_vec() }
    }

    pub fn code(&self) -> u64 {
        self.code
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Serializes to `code(varint) ‖ len(varint) ‖ digest`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&varint::encode(self.code));
        out.extend_from_slice(&varint::encode(self.digest.len() as u64));
        out.extend_from_slice(&self.digest);
        out
    }

    /// Parses the `code ‖ len ‖ digest` wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Multihash, MultihashError> {
        let (code, n) = varint::decode(bytes)?;
        let rest = &bytes[n..];
        let (len, n2) = varint::decode(rest)?;
        let digest = &rest[n2..];
        if digest.len() as u64 != len {
            return Err(MultihashError::BadLength);
        }
        Ok(Multihash { code, digest: digest.to_vec() })
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multihash(code={:#x}, digest={})", self.code, bs58::encode(&self.digest).into_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha2_round_trip() {
        let mh = Multihash::sha2_256(b"hello world");
        let bytes = mh.to_bytes();
        let back = Multihash::from_bytes(&bytes).unwrap();
        assert_eq!(mh, back);
        assert_eq!(mh.code(), SHA2_256);
    }

    #[test]
    fn identity_round_trip() {
        let mh = Multihash::identity(b"short key bytes");
        let bytes = mh.to_bytes();
        let back = Multihash::from_bytes(&bytes).unwrap();
        assert_eq!(mh, back);
    }
}
