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

//! `LocalIdentity` / `RemoteIdentity`, per spec §3: a `(PeerId, key)` pair,
//! the local side additionally holding the private key.

use crate::identity::{Keypair, PublicKey};
use crate::peer_id::PeerId;

/// This host's own identity: a keypair plus the `PeerId` it derives.
#[derive(Clone)]
pub struct LocalIdentity {
    peer_id: PeerId,
    keypair: Keypair,
}

impl LocalIdentity {
    pub fn from_keypair(keypair: Keypair) -> LocalIdentity {
        let peer_id = PeerId::from_public_key(&keypair.public());
        LocalIdentity { peer_id, keypair }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public()
    }
}

/// A verified remote peer's identity, as produced by a security handshake.
/// Equality is by public key, since two `RemoteIdentity` values for the same
/// key always carry the same (derived) `PeerId`.
#[derive(Clone)]
pub struct RemoteIdentity {
    peer_id: PeerId,
    public_key: PublicKey,
}

impl RemoteIdentity {
    pub fn from_public_key(public_key: PublicKey) -> RemoteIdentity {
        let peer_id = PeerId::from_public_key(&public_key);
        RemoteIdentity { peer_id, public_key }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl PartialEq for RemoteIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key
    }
}

impl Eq for RemoteIdentity {}
