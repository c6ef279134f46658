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

//! Connection registry (spec §4.11): `PeerId -> {Connection}`, plus the
//! peer-connectedness bookkeeping that feeds `PeerConnectednessChanged`.

use crate::event::{Connectedness, Event, EventBus};
use libp2p_core::identities::RemoteIdentity;
use libp2p_core::muxing::StreamMuxer;
use libp2p_core::resource::ConnScope;
use libp2p_core::transport::upgrade::UpgradedConnection;
use libp2p_core::PeerId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// A registered, live connection to a peer: the muxer, shared (via `Arc`)
/// with every [`libp2p_core::muxing::Substream`] opened over it, plus the
/// resource-manager scope the Upgrader opened for it.
pub struct ConnectionHandle<M> {
    pub remote: RemoteIdentity,
    pub muxer: Arc<M>,
    scope: Mutex<Box<dyn ConnScope>>,
    closed: AtomicBool,
    inbound_loop_spawned: AtomicBool,
}

impl<M: StreamMuxer> ConnectionHandle<M> {
    pub fn from_upgraded(upgraded: UpgradedConnection<M>) -> Self {
        let (remote, muxer, scope) = upgraded.into_parts();
        ConnectionHandle {
            remote,
            muxer: Arc::new(muxer),
            scope: Mutex::new(scope),
            closed: AtomicBool::new(false),
            inbound_loop_spawned: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// `true` the first time it's called on a given handle, `false` on every
    /// call after. Lets a Host spawn exactly one inbound-substream-accept
    /// task per connection, even if `dial_peer` and a registry lookup race.
    pub fn claim_inbound_loop(&self) -> bool {
        !self.inbound_loop_spawned.swap(true, Ordering::SeqCst)
    }

    /// Drives the muxer's teardown to completion, releasing the
    /// resource-manager scope once it finishes.
    pub fn poll_close(&self, cx: &mut Context<'_>) -> Poll<Result<(), M::Error>> {
        let res = self.muxer.close(cx);
        if res.is_ready() {
            self.mark_closed();
        }
        res
    }

    /// Marks this handle closed and releases its resource scope, without
    /// waiting on the muxer's teardown. Used by [`ConnectionRegistry::close_peer`],
    /// which drops its `Arc<ConnectionHandle<M>>` immediately after; any
    /// substreams still holding their own `Arc<M>` clone keep the muxer
    /// alive until they finish unwinding on their own.
    fn mark_closed(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.scope.lock().done();
        }
    }
}

pub struct ConnectionRegistry<M> {
    connections: Mutex<HashMap<PeerId, Vec<Arc<ConnectionHandle<M>>>>>,
    events: Arc<EventBus>,
}

impl<M: StreamMuxer> ConnectionRegistry<M> {
    pub fn new(events: Arc<EventBus>) -> Self {
        ConnectionRegistry { connections: Mutex::new(HashMap::new()), events }
    }

    /// The first non-closed connection to `peer`, if any.
    pub fn any_connection(&self, peer: &PeerId) -> Option<Arc<ConnectionHandle<M>>> {
        let connections = self.connections.lock();
        connections.get(peer)?.iter().find(|c| !c.is_closed()).cloned()
    }

    pub fn connectedness(&self, peer: &PeerId) -> Connectedness {
        match self.any_connection(peer) {
            Some(_) => Connectedness::Connected,
            None => Connectedness::Disconnected,
        }
    }

    /// Registers a newly-upgraded connection for `peer`.
    pub fn insert(&self, peer: PeerId, handle: Arc<ConnectionHandle<M>>) {
        let was_connected = matches!(self.connectedness(&peer), Connectedness::Connected);
        self.connections.lock().entry(peer.clone()).or_insert_with(Vec::new).push(handle);
        if !was_connected {
            self.events.publish(Event::PeerConnectednessChanged(peer, Connectedness::Connected));
        }
    }

    /// Closes every connection to `peer`. Fires `PeerConnectednessChanged`
    /// if the peer had at least one live connection.
    pub fn close_peer(&self, peer: &PeerId) {
        let removed = self.connections.lock().remove(peer);
        if let Some(peer_conns) = removed {
            let had_live = peer_conns.iter().any(|c| !c.is_closed());
            for conn in &peer_conns {
                conn.mark_closed();
            }
            if had_live {
                self.events.publish(Event::PeerConnectednessChanged(peer.clone(), Connectedness::Disconnected));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p_core::identity::Keypair;

    struct NullMuxer;

    impl StreamMuxer for NullMuxer {
        type Substream = ();
        type OutboundSubstream = ();
        type Error = std::io::Error;

        fn poll_event(&self, _cx: &mut Context<'_>) -> Poll<Result<libp2p_core::muxing::StreamMuxerEvent<()>, Self::Error>> {
            Poll::Pending
        }
        fn open_outbound(&self) {}
        fn poll_outbound(&self, _cx: &mut Context<'_>, _s: &mut ()) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }
        fn destroy_outbound(&self, _s: ()) {}
        fn read_substream(&self, _cx: &mut Context<'_>, _s: &mut (), _buf: &mut [u8]) -> Poll<Result<usize, Self::Error>> {
            Poll::Pending
        }
        fn write_substream(&self, _cx: &mut Context<'_>, _s: &mut (), _buf: &[u8]) -> Poll<Result<usize, Self::Error>> {
            Poll::Pending
        }
        fn flush_substream(&self, _cx: &mut Context<'_>, _s: &mut ()) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn shutdown_substream(&self, _cx: &mut Context<'_>, _s: &mut ()) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn destroy_substream(&self, _s: ()) {}
        fn close(&self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn flush_all(&self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    struct NullScope;
    impl ConnScope for NullScope {
        fn set_peer(&mut self, _peer: PeerId) -> Result<(), libp2p_core::error::TransportError> {
            Ok(())
        }
        fn open_stream(
            &self,
            _dir: libp2p_core::connection::Direction,
        ) -> Result<Box<dyn libp2p_core::resource::StreamScope>, libp2p_core::error::TransportError> {
            unimplemented!()
        }
        fn done(&mut self) {}
    }

    fn peer() -> PeerId {
        PeerId::from_public_key(&Keypair::generate_ed25519().public())
    }

    fn remote() -> RemoteIdentity {
        RemoteIdentity::from_public_key(Keypair::generate_ed25519().public())
    }

    fn handle() -> Arc<ConnectionHandle<NullMuxer>> {
        Arc::new(ConnectionHandle {
            remote: remote(),
            muxer: Arc::new(NullMuxer),
            scope: Mutex::new(Box::new(NullScope)),
            closed: AtomicBool::new(false),
            inbound_loop_spawned: AtomicBool::new(false),
        })
    }

    #[test]
    fn insert_then_connectedness_reports_connected() {
        let events = Arc::new(EventBus::new());
        let registry: ConnectionRegistry<NullMuxer> = ConnectionRegistry::new(events);
        let p = peer();
        registry.insert(p.clone(), handle());
        assert_eq!(registry.connectedness(&p), Connectedness::Connected);
    }

    #[test]
    fn close_peer_reports_disconnected_and_drops_handles() {
        let events = Arc::new(EventBus::new());
        let registry: ConnectionRegistry<NullMuxer> = ConnectionRegistry::new(events);
        let p = peer();
        registry.insert(p.clone(), handle());
        registry.close_peer(&p);
        assert_eq!(registry.connectedness(&p), Connectedness::Disconnected);
    }
}
