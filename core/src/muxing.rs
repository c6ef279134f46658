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

//! The `StreamMuxer` trait: the contract a stream-multiplexer
//! implementation (C4/C7, e.g. `libp2p-mplex`) must satisfy so that the
//! upgrader and the Swarm can drive it without knowing its wire format.

use std::task::{Context, Poll};

/// An event a `StreamMuxer` can report: a new stream has been opened by the
/// remote, or the muxer itself has gone away.
#[derive(Debug)]
pub enum StreamMuxerEvent<S> {
    /// The remote opened a new inbound logical stream.
    InboundSubstream(S),
}

/// Many logical streams multiplexed over one physical connection.
///
/// Mirrors how this crate's security and raw transports are driven: every
/// method is non-blocking and takes a `Context` so the caller's task can be
/// woken when progress becomes possible, matching spec §5's "suspension
/// only at I/O boundaries" rule.
pub trait StreamMuxer {
    /// A single logical, bidirectional stream.
    type Substream;
    /// A handle to a not-yet-open outbound stream.
    type OutboundSubstream;
    type Error: std::error::Error;

    /// Polls for the next muxer-level event (currently just inbound opens).
    fn poll_event(
        &self,
        cx: &mut Context<'_>,
    ) -> Poll<Result<StreamMuxerEvent<Self::Substream>, Self::Error>>;

    /// Starts opening a new outbound logical stream.
    fn open_outbound(&self) -> Self::OutboundSubstream;

    /// Polls an outbound-stream handle started with [`open_outbound`] to
    /// completion.
    fn poll_outbound(
        &self,
        cx: &mut Context<'_>,
        s: &mut Self::OutboundSubstream,
    ) -> Poll<Result<Self::Substream, Self::Error>>;

    /// Aborts an in-flight outbound open.
    fn destroy_outbound(&self, s: Self::OutboundSubstream);

    fn read_substream(
        &self,
        cx: &mut Context<'_>,
        s: &mut Self::Substream,
        buf: &mut [u8],
    ) -> Poll<Result<usize, Self::Error>>;

    fn write_substream(
        &self,
        cx: &mut Context<'_>,
        s: &mut Self::Substream,
        buf: &[u8],
    ) -> Poll<Result<usize, Self::Error>>;

    fn flush_substream(&self, cx: &mut Context<'_>, s: &mut Self::Substream) -> Poll<Result<(), Self::Error>>;

    /// Half-closes the stream's write side (spec §4.4 `OPEN -> WR_CLOSED`).
    fn shutdown_substream(&self, cx: &mut Context<'_>, s: &mut Self::Substream) -> Poll<Result<(), Self::Error>>;

    /// Releases local bookkeeping for a stream once it is fully closed.
    fn destroy_substream(&self, s: Self::Substream);

    /// Immediately resets every open stream and tears the muxer down
    /// (spec §4.4 "Closing the whole muxer").
    fn close(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>>;

    /// Flushes any buffered writes across all streams.
    fn flush_all(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>>;
}

/// A logical stream bound to the muxer that owns it, implementing
/// `AsyncRead`/`AsyncWrite` by delegating to the muxer's per-substream
/// methods. This is the concrete type handed to application protocol
/// handlers once C2 has negotiated their protocol.
pub struct Substream<M: StreamMuxer> {
    muxer: std::sync::Arc<M>,
    substream: Option<M::Substream>,
}

impl<M: StreamMuxer> Substream<M> {
    pub fn new(muxer: std::sync::Arc<M>, substream: M::Substream) -> Self {
        Substream { muxer, substream: Some(substream) }
    }

    fn substream_mut(&mut self) -> &mut M::Substream {
        self.substream.as_mut().expect("substream taken only on drop")
    }
}

// Never self-referential: the wrapped substream lives behind `Option`, not
// a pin projection, so it's safe to move the wrapper itself around freely.
impl<M: StreamMuxer> Unpin for Substream<M> {}

impl<M: StreamMuxer> Drop for Substream<M> {
    fn drop(&mut self) {
        if let Some(s) = self.substream.take() {
            self.muxer.destroy_substream(s);
        }
    }
}

impl<M: StreamMuxer> futures::io::AsyncRead for Substream<M> {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        let muxer = this.muxer.clone();
        muxer
            .read_substream(cx, this.substream_mut(), buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

impl<M: StreamMuxer> futures::io::AsyncWrite for Substream<M> {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        let muxer = this.muxer.clone();
        muxer
            .write_substream(cx, this.substream_mut(), buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    fn poll_flush(self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let muxer = this.muxer.clone();
        muxer
            .flush_substream(cx, this.substream_mut())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    fn poll_close(self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let muxer = this.muxer.clone();
        muxer
            .shutdown_substream(cx, this.substream_mut())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}
