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

//! The `ConnectionGater` collaborator contract (spec §6): a policy hook the
//! Upgrader and Swarm consult at each stage of a connection's lifecycle.
//! Application code can veto a dial or an inbound connection without this
//! crate knowing anything about the policy it implements.

use crate::identities::RemoteIdentity;
use multiaddr::Multiaddr;

/// Every hook defaults to allow; implementors only need to override the
/// checks they actually care about.
pub trait ConnectionGater: Send + Sync {
    fn intercept_peer_dial(&self, _peer: &crate::peer_id::PeerId) -> bool {
        true
    }

    fn intercept_address_dial(&self, _peer: &crate::peer_id::PeerId, _addr: &Multiaddr) -> bool {
        true
    }

    fn intercept_accept(&self, _local_addr: &Multiaddr, _remote_addr: &Multiaddr) -> bool {
        true
    }

    fn intercept_secured(&self, _outbound: bool, _remote: &RemoteIdentity, _addr: &Multiaddr) -> bool {
        true
    }

    fn intercept_upgraded(&self, _remote: &RemoteIdentity) -> bool {
        true
    }
}

/// The permissive default used when the caller supplies no gater.
pub struct AllowAll;

impl ConnectionGater for AllowAll {}
