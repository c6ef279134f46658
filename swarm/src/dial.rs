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

//! The dial coordinator (spec §4.11): at most one outstanding dial per
//! peer, fan-out racing across candidate addresses, per-`(peer, address)`
//! backoff, and an overall deadline.
//!
//! `MuxUp` is the stream-muxer upgrade negotiator (e.g. a `SelectUpgrade`
//! over several muxer configs); `M` is the concrete [`StreamMuxer`] it
//! produces (`MuxUp::Output`) once negotiation completes. They are kept as
//! separate type parameters because the [`ConnectionRegistry`] only ever
//! needs to know the latter.

use crate::peerstore::Peerstore;
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use async_std::sync::Mutex as AsyncMutex;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use libp2p_core::error::TransportError;
use libp2p_core::gater::ConnectionGater;
use libp2p_core::muxing::StreamMuxer;
use libp2p_core::resource::ResourceManager;
use libp2p_core::transport::upgrade::{RemoteIdentified, Upgrader};
use libp2p_core::transport::Transport;
use libp2p_core::upgrade::OutboundUpgrade;
use libp2p_core::{Multiaddr, PeerId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wasm_timer::Instant;

/// Fan-out, per spec §4.11's default.
pub const DEFAULT_FAN_OUT: usize = 4;
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);
pub const DEFAULT_BACKOFF_COEFFICIENT: f64 = 2.0;

struct Backoff {
    consecutive_failures: u32,
    until: Instant,
}

/// Tunable knobs for [`DialCoordinator`], defaulted per spec §4.11.
#[derive(Clone, Debug)]
pub struct DialConfig {
    pub fan_out: usize,
    pub dial_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_coefficient: f64,
}

impl Default for DialConfig {
    fn default() -> Self {
        DialConfig {
            fan_out: DEFAULT_FAN_OUT,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_coefficient: DEFAULT_BACKOFF_COEFFICIENT,
        }
    }
}

pub struct DialCoordinator<T, Sec, MuxUp, M: StreamMuxer> {
    transport: T,
    upgrader: Upgrader<Sec, MuxUp>,
    peerstore: Arc<Peerstore>,
    gater: Arc<dyn ConnectionGater>,
    resources: Arc<dyn ResourceManager>,
    registry: Arc<ConnectionRegistry<M>>,
    config: DialConfig,
    /// Serializes concurrent `dial_peer` callers for the same peer down to
    /// one in-flight dial job, per spec §4.11's "await its result".
    dial_locks: Mutex<HashMap<PeerId, Arc<AsyncMutex<()>>>>,
    backoffs: Mutex<HashMap<(PeerId, Multiaddr), Backoff>>,
}

impl<T, Sec, MuxUp, M> DialCoordinator<T, Sec, MuxUp, M>
where
    T: Transport + Clone + Send + Sync + 'static,
    T::Output: Send,
    Sec: Clone + Send + Sync + 'static,
    MuxUp: Clone + Send + Sync + 'static,
    M: StreamMuxer + Send + Sync + 'static,
    M::Error: std::fmt::Display,
{
    pub fn new(
        transport: T,
        security: Sec,
        muxer: MuxUp,
        peerstore: Arc<Peerstore>,
        gater: Arc<dyn ConnectionGater>,
        resources: Arc<dyn ResourceManager>,
        registry: Arc<ConnectionRegistry<M>>,
        config: DialConfig,
    ) -> Self {
        let upgrader = Upgrader::new(security, muxer, gater.clone(), resources.clone());
        DialCoordinator {
            transport,
            upgrader,
            peerstore,
            gater,
            resources,
            registry,
            config,
            dial_locks: Mutex::new(HashMap::new()),
            backoffs: Mutex::new(HashMap::new()),
        }
    }

    /// Ensures a live connection to `peer` exists, per spec §4.11's
    /// dial-coordinator algorithm, and returns it.
    pub async fn dial_peer(&self, peer: &PeerId) -> Result<Arc<ConnectionHandle<M>>, TransportError>
    where
        Sec: OutboundUpgrade<T::Output>,
        Sec::Output: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + Send + RemoteIdentified + 'static,
        Sec::Error: std::fmt::Display,
        MuxUp: OutboundUpgrade<Sec::Output, Output = M>,
        MuxUp::Error: std::fmt::Display,
    {
        if let Some(conn) = self.registry.any_connection(peer) {
            return Ok(conn);
        }

        let lock = {
            let mut locks = self.dial_locks.lock();
            locks.entry(peer.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        let _guard = lock.lock().await;

        if let Some(conn) = self.registry.any_connection(peer) {
            return Ok(conn);
        }

        let result = self.run_dial_job(peer).await;
        self.dial_locks.lock().remove(peer);
        result
    }

    async fn run_dial_job(&self, peer: &PeerId) -> Result<Arc<ConnectionHandle<M>>, TransportError>
    where
        Sec: OutboundUpgrade<T::Output>,
        Sec::Output: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + Send + RemoteIdentified + 'static,
        Sec::Error: std::fmt::Display,
        MuxUp: OutboundUpgrade<Sec::Output, Output = M>,
        MuxUp::Error: std::fmt::Display,
    {
        if !self.gater.intercept_peer_dial(peer) {
            return Err(TransportError::authorization("intercept_peer_dial vetoed this peer"));
        }

        let now = Instant::now();
        let mut candidates: Vec<Multiaddr> = self
            .peerstore
            .addresses
            .addresses(peer)
            .into_iter()
            .filter(|addr| self.gater.intercept_address_dial(peer, addr))
            .filter(|addr| self.transport.can_dial(addr))
            .filter(|addr| self.not_backed_off(peer, addr, now))
            .collect();
        candidates.truncate(self.config.fan_out);

        if candidates.is_empty() {
            return Err(TransportError::not_found("no dialable, non-backed-off address for peer"));
        }

        let race = async {
            let mut attempts: FuturesUnordered<BoxFuture<'_, Result<Arc<ConnectionHandle<M>>, (Multiaddr, TransportError)>>> =
                FuturesUnordered::new();
            for addr in candidates {
                attempts.push(Box::pin(self.dial_one(peer.clone(), addr)));
            }
            let mut last_err = TransportError::transport("all dial attempts failed");
            while let Some(result) = attempts.next().await {
                match result {
                    Ok(handle) => return Ok(handle),
                    Err((addr, e)) => {
                        self.record_failure(peer, &addr);
                        last_err = e;
                    }
                }
            }
            Err(last_err)
        };

        match async_std::future::timeout(self.config.dial_timeout, race).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::transport("dial timed out")),
        }
    }

    async fn dial_one(&self, peer: PeerId, addr: Multiaddr) -> Result<Arc<ConnectionHandle<M>>, (Multiaddr, TransportError)>
    where
        Sec: OutboundUpgrade<T::Output>,
        Sec::Output: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + Send + RemoteIdentified + 'static,
        Sec::Error: std::fmt::Display,
        MuxUp: OutboundUpgrade<Sec::Output, Output = M>,
        MuxUp::Error: std::fmt::Display,
    {
        let connect = async {
            let dialing = self.transport.dial(addr.clone())?;
            let raw = dialing.await?;
            let scope = self.resources.open_connection(libp2p_core::connection::Direction::Outbound, true, &addr)?;
            let upgraded = self.upgrader.upgrade_outbound(raw, &peer, &addr, scope).await?;
            Ok::<_, TransportError>(upgraded)
        };

        match connect.await {
            Ok(upgraded) => {
                let handle = Arc::new(ConnectionHandle::from_upgraded(upgraded));
                self.clear_backoff(&peer_addr_key(&peer, &addr));
                self.registry.insert(peer, handle.clone());
                Ok(handle)
            }
            Err(e) => Err((addr, e)),
        }
    }

    fn not_backed_off(&self, peer: &PeerId, addr: &Multiaddr, now: Instant) -> bool {
        match self.backoffs.lock().get(&(peer.clone(), addr.clone())) {
            Some(b) => b.until <= now,
            None => true,
        }
    }

    fn record_failure(&self, peer: &PeerId, addr: &Multiaddr) {
        let mut backoffs = self.backoffs.lock();
        let entry = backoffs.entry((peer.clone(), addr.clone())).or_insert(Backoff { consecutive_failures: 0, until: Instant::now() });
        entry.consecutive_failures += 1;
        let delay_secs =
            self.config.backoff_base.as_secs_f64() * self.config.backoff_coefficient.powi(entry.consecutive_failures as i32 - 1);
        entry.until = Instant::now() + Duration::from_secs_f64(delay_secs);
    }

    fn clear_backoff(&self, key: &(PeerId, Multiaddr)) {
        self.backoffs.lock().remove(key);
    }
}

fn peer_addr_key(peer: &PeerId, addr: &Multiaddr) -> (PeerId, Multiaddr) {
    (peer.clone(), addr.clone())
}
