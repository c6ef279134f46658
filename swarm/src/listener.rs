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

//! The listener manager (spec §4.11), the inbound counterpart to
//! [`crate::dial::DialCoordinator`]: drives a [`Transport`]'s accept loop,
//! runs each incoming raw connection through the same C8 upgrade sequence,
//! and hands the result to a [`Host`] via `accept_connection`.

use crate::event::{Event, EventBus};
use crate::host::Host;
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use futures::StreamExt;
use libp2p_core::error::TransportError;
use libp2p_core::gater::ConnectionGater;
use libp2p_core::muxing::StreamMuxer;
use libp2p_core::resource::ResourceManager;
use libp2p_core::transport::upgrade::{RemoteIdentified, Upgrader};
use libp2p_core::transport::{ListenerEvent, Transport};
use libp2p_core::upgrade::InboundUpgrade;
use libp2p_core::Multiaddr;
use parking_lot::Mutex;
use std::sync::Arc;

/// Accepts inbound connections on behalf of a [`Host`]. Holds its own
/// [`Upgrader`] (mirroring [`crate::dial::DialCoordinator`]'s) rather than
/// sharing one, since `Upgrader` is stateless beyond the `Sec`/`MuxUp`
/// values and the gater/resource-manager handles it was built with.
pub struct ListenerManager<T, Sec, MuxUp, M: StreamMuxer> {
    transport: T,
    upgrader: Upgrader<Sec, MuxUp>,
    registry: Arc<ConnectionRegistry<M>>,
    host: Host<T, Sec, MuxUp, M>,
    events: Arc<EventBus>,
    local_addrs: Mutex<Vec<Multiaddr>>,
}

impl<T, Sec, MuxUp, M> ListenerManager<T, Sec, MuxUp, M>
where
    T: Transport + Clone + Send + Sync + 'static,
    T::Output: Send,
    Sec: Clone + Send + Sync + 'static,
    MuxUp: Clone + Send + Sync + 'static,
    M: StreamMuxer + Send + Sync + 'static,
    M::Error: std::fmt::Display,
    M::Substream: Send + 'static,
{
    pub fn new(
        transport: T,
        security: Sec,
        muxer: MuxUp,
        gater: Arc<dyn ConnectionGater>,
        resources: Arc<dyn ResourceManager>,
        registry: Arc<ConnectionRegistry<M>>,
        host: Host<T, Sec, MuxUp, M>,
        events: Arc<EventBus>,
    ) -> Self {
        let upgrader = Upgrader::new(security, muxer, gater, resources);
        ListenerManager { transport, upgrader, registry, host, events, local_addrs: Mutex::new(Vec::new()) }
    }

    /// Starts listening on `addr`, spawning a background task that accepts
    /// and upgrades every incoming connection until the listener closes.
    /// Returns the concrete local address the transport bound to. Takes
    /// `this` rather than `&self` since the spawned task needs an owned
    /// `Arc` to outlive the call.
    pub fn listen_on(this: &Arc<Self>, addr: Multiaddr) -> Result<Multiaddr, TransportError>
    where
        Sec: InboundUpgrade<T::Output>,
        Sec::Output: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + Send + RemoteIdentified + 'static,
        Sec::Error: std::fmt::Display,
        MuxUp: InboundUpgrade<Sec::Output, Output = M>,
        MuxUp::Error: std::fmt::Display,
    {
        let listener = this.transport.listen_on(addr)?;
        let local_addr = listener.local_addr.clone();
        this.push_local_addr(local_addr.clone());

        let this = this.clone();
        async_std::task::spawn(async move {
            let mut events = listener.events;
            while let Some(event) = events.next().await {
                match event {
                    ListenerEvent::Incoming { upgrade, local_addr, remote_addr } => {
                        let this = this.clone();
                        async_std::task::spawn(async move {
                            this.accept_one(upgrade, &local_addr, &remote_addr).await;
                        });
                    }
                    ListenerEvent::Closed(err) => {
                        if let Some(err) = err {
                            log::warn!("listener on {} closed: {}", local_addr, err);
                        }
                        this.pop_local_addr(&local_addr);
                        break;
                    }
                }
            }
        });

        Ok(local_addr)
    }

    async fn accept_one(
        &self,
        upgrade: futures::future::BoxFuture<'static, Result<T::Output, TransportError>>,
        local_addr: &Multiaddr,
        remote_addr: &Multiaddr,
    ) where
        Sec: InboundUpgrade<T::Output>,
        Sec::Output: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + Send + RemoteIdentified + 'static,
        Sec::Error: std::fmt::Display,
        MuxUp: InboundUpgrade<Sec::Output, Output = M>,
        MuxUp::Error: std::fmt::Display,
    {
        let raw = match upgrade.await {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("inbound connection from {} dropped before upgrade: {}", remote_addr, e);
                return;
            }
        };
        let upgraded = match self.upgrader.upgrade_inbound(raw, local_addr, remote_addr).await {
            Ok(upgraded) => upgraded,
            Err(e) => {
                log::debug!("inbound upgrade from {} failed: {}", remote_addr, e);
                return;
            }
        };
        let peer = upgraded.remote.peer_id().clone();
        let handle = Arc::new(ConnectionHandle::from_upgraded(upgraded));
        self.registry.insert(peer.clone(), handle.clone());
        self.host.accept_connection(peer, handle);
    }

    fn push_local_addr(&self, addr: Multiaddr) {
        let mut addrs = self.local_addrs.lock();
        addrs.push(addr);
        self.events.publish(Event::LocalAddressesUpdated(addrs.clone()));
    }

    fn pop_local_addr(&self, addr: &Multiaddr) {
        let mut addrs = self.local_addrs.lock();
        addrs.retain(|a| a != addr);
        self.events.publish(Event::LocalAddressesUpdated(addrs.clone()));
    }
}
