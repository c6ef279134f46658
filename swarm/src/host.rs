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

//! The Host (spec §4.12): the application-facing surface that ties the
//! dial coordinator, the connection registry and a `ProtocolId ->
//! StreamHandler` table together.
//!
//! Like [`crate::dial`], `MuxUp` is the muxer upgrade negotiator and `M` is
//! the concrete [`StreamMuxer`] it produces.

use crate::dial::DialCoordinator;
use crate::event::{Event, EventBus};
use crate::registry::ConnectionHandle;
use futures::future::poll_fn;
use libp2p_core::error::TransportError;
use libp2p_core::muxing::{StreamMuxer, StreamMuxerEvent, Substream};
use libp2p_core::transport::upgrade::RemoteIdentified;
use libp2p_core::transport::Transport;
use libp2p_core::upgrade::OutboundUpgrade;
use libp2p_core::PeerId;
use multistream_select::{dialer_select_proto_lazy, listener_select_proto, Negotiated};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Handles a single inbound stream already bound to its negotiated protocol.
/// Implementations are expected to return quickly and hand the stream off to
/// their own task if they need to hold it for a while — the inbound-accept
/// loop that calls this does not wait for it to finish.
pub trait StreamHandler<M: StreamMuxer>: Send + Sync {
    fn handle_stream(&self, peer: PeerId, stream: Negotiated<Substream<M>>);
}

impl<M, F> StreamHandler<M> for F
where
    M: StreamMuxer,
    F: Fn(PeerId, Negotiated<Substream<M>>) + Send + Sync,
{
    fn handle_stream(&self, peer: PeerId, stream: Negotiated<Substream<M>>) {
        (self)(peer, stream)
    }
}

struct Inner<T, Sec, MuxUp, M: StreamMuxer> {
    dialer: DialCoordinator<T, Sec, MuxUp, M>,
    events: Arc<EventBus>,
    handlers: Mutex<HashMap<String, Arc<dyn StreamHandler<M>>>>,
}

pub struct Host<T, Sec, MuxUp, M: StreamMuxer>(Arc<Inner<T, Sec, MuxUp, M>>);

impl<T, Sec, MuxUp, M: StreamMuxer> Clone for Host<T, Sec, MuxUp, M> {
    fn clone(&self) -> Self {
        Host(self.0.clone())
    }
}

impl<T, Sec, MuxUp, M> Host<T, Sec, MuxUp, M>
where
    T: Transport + Clone + Send + Sync + 'static,
    T::Output: Send,
    Sec: Clone + Send + Sync + 'static,
    MuxUp: Clone + Send + Sync + 'static,
    M: StreamMuxer + Send + Sync + 'static,
    M::Error: std::fmt::Display,
    M::Substream: Send + 'static,
{
    pub fn new(dialer: DialCoordinator<T, Sec, MuxUp, M>, events: Arc<EventBus>) -> Self {
        Host(Arc::new(Inner { dialer, events, handlers: Mutex::new(HashMap::new()) }))
    }

    /// Registers a handler for `protocol`, publishing `LocalProtocolsUpdated`.
    pub fn set_stream_handler(&self, protocol: impl Into<String>, handler: Arc<dyn StreamHandler<M>>) {
        self.0.handlers.lock().insert(protocol.into(), handler);
        self.publish_local_protocols();
    }

    /// Unregisters the handler for `protocol`, publishing `LocalProtocolsUpdated`.
    pub fn remove_stream_handler(&self, protocol: &str) {
        self.0.handlers.lock().remove(protocol);
        self.publish_local_protocols();
    }

    fn publish_local_protocols(&self) {
        let protocols: Vec<String> = self.0.handlers.lock().keys().cloned().collect();
        self.0.events.publish(Event::LocalProtocolsUpdated(protocols));
    }

    /// Ensures a connection to `peer`, opens a fresh muxed stream over it,
    /// and negotiates one of `protocols` as the dialer.
    pub async fn new_stream(
        &self,
        peer: &PeerId,
        protocols: Vec<String>,
    ) -> Result<(String, Negotiated<Substream<M>>), TransportError>
    where
        Sec: OutboundUpgrade<T::Output>,
        Sec::Output: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + Send + RemoteIdentified + 'static,
        Sec::Error: std::fmt::Display,
        MuxUp: OutboundUpgrade<Sec::Output, Output = M>,
        MuxUp::Error: std::fmt::Display,
    {
        let handle = self.0.dialer.dial_peer(peer).await?;
        self.spawn_inbound_loop_if_needed(peer.clone(), handle.clone());

        let substream = open_outbound_substream(&handle.muxer).await.map_err(TransportError::transport)?;
        dialer_select_proto_lazy(substream, protocols).await.map_err(TransportError::negotiation)
    }

    /// Registers an inbound connection (e.g. one accepted by a listener
    /// manager) and starts accepting substreams over it.
    pub fn accept_connection(&self, peer: PeerId, handle: Arc<ConnectionHandle<M>>) {
        self.spawn_inbound_loop_if_needed(peer, handle);
    }

    fn spawn_inbound_loop_if_needed(&self, peer: PeerId, handle: Arc<ConnectionHandle<M>>) {
        if !handle.claim_inbound_loop() {
            return;
        }
        let inner = self.0.clone();
        async_std::task::spawn(async move {
            loop {
                if handle.is_closed() {
                    break;
                }
                match poll_fn(|cx| handle.muxer.poll_event(cx)).await {
                    Ok(StreamMuxerEvent::InboundSubstream(raw)) => {
                        let stream = Substream::new(handle.muxer.clone(), raw);
                        let inner = inner.clone();
                        let peer = peer.clone();
                        async_std::task::spawn(dispatch_inbound(inner, peer, stream));
                    }
                    Err(_) => break,
                }
            }
        });
    }
}

/// Opens a new outbound logical stream over `muxer`, per spec §4.4's
/// non-blocking, poll-driven `StreamMuxer` contract.
async fn open_outbound_substream<M: StreamMuxer>(muxer: &Arc<M>) -> Result<Substream<M>, M::Error> {
    let mut outbound = muxer.open_outbound();
    let result = poll_fn(|cx| muxer.poll_outbound(cx, &mut outbound)).await;
    match result {
        Ok(substream) => Ok(Substream::new(muxer.clone(), substream)),
        Err(e) => {
            muxer.destroy_outbound(outbound);
            Err(e)
        }
    }
}

async fn dispatch_inbound<T, Sec, MuxUp, M>(inner: Arc<Inner<T, Sec, MuxUp, M>>, peer: PeerId, stream: Substream<M>)
where
    T: Send + Sync + 'static,
    Sec: Send + Sync + 'static,
    MuxUp: Send + Sync + 'static,
    M: StreamMuxer + Send + Sync + 'static,
    M::Substream: Send + 'static,
{
    let protocols: Vec<String> = inner.handlers.lock().keys().cloned().collect();
    if let Ok((matched, negotiated)) = listener_select_proto(stream, protocols).await {
        let handler = inner.handlers.lock().get(&matched).cloned();
        if let Some(handler) = handler {
            handler.handle_stream(peer, negotiated);
        }
    }
}
