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

//! The `ResourceManager` collaborator contract (spec §6): an accounting
//! hook the Upgrader and Swarm open a scope against for every connection
//! and stream, so a host application can enforce memory/fd limits without
//! this crate needing to know the accounting policy.

use crate::connection::Direction;
use crate::peer_id::PeerId;
use multiaddr::Multiaddr;

pub trait ResourceManager: Send + Sync {
    fn open_connection(
        &self,
        dir: Direction,
        uses_fd: bool,
        remote_addr: &Multiaddr,
    ) -> Result<Box<dyn ConnScope>, crate::error::TransportError>;
}

pub trait ConnScope: Send {
    /// Binds this scope to the now-known remote peer (spec §4.8 step 4).
    fn set_peer(&mut self, peer: PeerId) -> Result<(), crate::error::TransportError>;

    fn open_stream(&self, dir: Direction) -> Result<Box<dyn StreamScope>, crate::error::TransportError>;

    /// Releases whatever the scope was accounting for. Idempotent.
    fn done(&mut self);
}

pub trait StreamScope: Send {
    fn done(&mut self);
}

/// The permissive default used when the caller supplies no resource
/// manager: every open succeeds and `done()` is a no-op.
pub struct NullResourceManager;

impl ResourceManager for NullResourceManager {
    fn open_connection(
        &self,
        _dir: Direction,
        _uses_fd: bool,
        _remote_addr: &Multiaddr,
    ) -> Result<Box<dyn ConnScope>, crate::error::TransportError> {
        Ok(Box::new(NullConnScope))
    }
}

struct NullConnScope;

impl ConnScope for NullConnScope {
    fn set_peer(&mut self, _peer: PeerId) -> Result<(), crate::error::TransportError> {
        Ok(())
    }

    fn open_stream(&self, _dir: Direction) -> Result<Box<dyn StreamScope>, crate::error::TransportError> {
        Ok(Box::new(NullStreamScope))
    }

    fn done(&mut self) {}
}

struct NullStreamScope;

impl StreamScope for NullStreamScope {
    fn done(&mut self) {}
}
