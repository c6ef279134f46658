// Copyright 2018 Parity Technologies (UK) Ltd.
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

//! An implementation of the mplex stream-multiplexing protocol (spec
//! C3/C4): one physical connection carries many independent, ordered,
//! byte-oriented logical streams, each identified by a locally-allocated id
//! and which side opened it.

mod codec;
mod config;
mod driver;
mod error;
mod stream_table;

pub use codec::{Frame, FrameBody};
pub use config::MplexConfig;
pub use error::MplexError;

use bytes::Bytes;
use driver::{FrameReader, FrameWriter};
use futures::io::{AsyncRead, AsyncWrite};
use libp2p_core::muxing::{StreamMuxer, StreamMuxerEvent};
use parking_lot::Mutex;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use stream_table::{StreamKey, StreamTable};

/// A sent or queued-for-accept logical stream handed out through the
/// `StreamMuxer` interface. Carries only the identity needed to look the
/// stream's real state up in the shared table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MplexSubstream {
    id: u64,
    local_initiated: bool,
}

/// A not-yet-acknowledged outbound stream open.
pub struct OutboundSubstream {
    id: u64,
    sent: bool,
}

struct IoState<T> {
    socket: T,
    reader: FrameReader,
    writer: FrameWriter,
    flush_wakers: Vec<std::task::Waker>,
}

/// The number of serialized frames we're willing to queue for one
/// connection before backpressuring writers.
const MAX_QUEUED_FRAMES: usize = 1024;

/// A multiplexed connection speaking the mplex wire protocol. Implements
/// [`StreamMuxer`] so it can be driven by the Swarm/upgrader the same way
/// as any other muxer.
pub struct Multiplex<T> {
    io: Mutex<IoState<T>>,
    table: Mutex<StreamTable>,
    config: MplexConfig,
}

impl<T: AsyncRead + AsyncWrite + Unpin> Multiplex<T> {
    pub fn new(socket: T) -> Self {
        Self::with_config(socket, MplexConfig::default())
    }

    pub fn with_config(socket: T, config: MplexConfig) -> Self {
        Multiplex {
            io: Mutex::new(IoState {
                socket,
                reader: FrameReader::new(),
                writer: FrameWriter::new(),
                flush_wakers: Vec::new(),
            }),
            table: Mutex::new(StreamTable::new()),
            config,
        }
    }

    fn process_frame(&self, table: &mut StreamTable, frame: Frame) -> Result<(), MplexError> {
        let local_initiated = !frame.initiator;
        let key: StreamKey = (local_initiated, frame.stream_id);

        match frame.body {
            codec::FrameBody::NewStream(_) => {
                if table.streams.contains_key(&key) {
                    log::debug!("peer reused stream id {} while it was still open", frame.stream_id);
                    return Err(MplexError::StreamIdReuse(frame.stream_id));
                }
                log::trace!("inbound stream {} opened", frame.stream_id);
                table.insert(key);
                table.inbound_queue.push_back(key);
                for w in table.accept_wakers.drain(..) {
                    w.wake();
                }
            }
            codec::FrameBody::Message(data) => {
                if let Some(entry) = table.get_mut(&key) {
                    if entry.reset || entry.read_closed {
                        // Late data after Close/Reset: the wire format has
                        // no ack, so we can only drop it.
                        return Ok(());
                    }
                    let room = self.config.max_buffer_len.saturating_sub(entry.recv_buf.len());
                    let take = std::cmp::min(room, data.len());
                    entry.recv_buf.extend(&data[..take]);
                    if take < data.len() {
                        entry.buffer_full_since.get_or_insert_with(Instant::now);
                    }
                    entry.wake_readers();
                }
            }
            codec::FrameBody::Close => {
                if let Some(entry) = table.get_mut(&key) {
                    entry.read_closed = true;
                    entry.wake_readers();
                    if !entry.reset && entry.is_fully_closed() && entry.recv_buf.is_empty() {
                        table.streams.remove(&key);
                    }
                }
            }
            codec::FrameBody::Reset => {
                // Keep a tombstone rather than removing the entry: a reset
                // stream must still answer subsequent reads/writes with
                // `RemoteReset`, not look like it was never opened. Only
                // `destroy_substream` drops it for good.
                if let Some(entry) = table.get_mut(&key) {
                    entry.reset = true;
                    entry.recv_buf.clear();
                    entry.wake_readers();
                    entry.wake_writers();
                }
            }
        }
        Ok(())
    }

    fn check_buffer_timeouts(&self, table: &mut StreamTable) {
        let timeout = self.config.max_buffer_behaviour_timeout;
        let mut timed_out = Vec::new();
        for (key, entry) in table.streams.iter() {
            if let Some(since) = entry.buffer_full_since {
                if since.elapsed() >= timeout {
                    timed_out.push(*key);
                }
            }
        }
        for key in timed_out {
            log::warn!("mplex stream {:?} reset: receive buffer full for longer than {:?}", key, timeout);
            if let Some(entry) = table.streams.get_mut(&key) {
                entry.reset = true;
                entry.recv_buf.clear();
                entry.wake_readers();
                entry.wake_writers();
            }
        }
    }

    fn drive_read_once(&self, cx: &mut Context<'_>) -> Poll<Result<(), MplexError>> {
        let frame = {
            let mut io = self.io.lock();
            let IoState { socket, reader, .. } = &mut *io;
            reader.poll_next(Pin::new(socket), cx)
        };
        match frame {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Err(e.into())),
            Poll::Ready(Ok(frame)) => {
                let mut table = self.table.lock();
                Poll::Ready(self.process_frame(&mut table, frame))
            }
        }
    }

    fn drive_write(&self, cx: &mut Context<'_>) -> Poll<Result<(), MplexError>> {
        let mut io = self.io.lock();
        let IoState { socket, writer, flush_wakers, .. } = &mut *io;
        let before = writer.pending_frames();
        let res = writer.poll_flush(Pin::new(socket), cx);
        if writer.pending_frames() < before {
            for w in flush_wakers.drain(..) {
                w.wake();
            }
        }
        match res {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
            Poll::Ready(Err(e)) => Poll::Ready(Err(e.into())),
        }
    }

    fn enqueue_and_flush(&self, cx: &mut Context<'_>, frame: &Frame) -> Poll<Result<(), MplexError>> {
        {
            let mut io = self.io.lock();
            if io.writer.pending_frames() >= MAX_QUEUED_FRAMES {
                io.flush_wakers.push(cx.waker().clone());
                return Poll::Pending;
            }
            io.writer.enqueue(frame)?;
        }
        self.drive_write(cx)
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> StreamMuxer for Multiplex<T> {
    type Substream = MplexSubstream;
    type OutboundSubstream = OutboundSubstream;
    type Error = MplexError;

    fn poll_event(&self, cx: &mut Context<'_>) -> Poll<Result<StreamMuxerEvent<Self::Substream>, Self::Error>> {
        if let Poll::Ready(Err(e)) = self.drive_write(cx) {
            return Poll::Ready(Err(e));
        }
        loop {
            {
                let mut table = self.table.lock();
                self.check_buffer_timeouts(&mut table);
                if let Some((local_initiated, id)) = table.inbound_queue.pop_front() {
                    return Poll::Ready(Ok(StreamMuxerEvent::InboundSubstream(MplexSubstream { id, local_initiated })));
                }
                if table.closed {
                    return Poll::Ready(Err(MplexError::Shutdown));
                }
                table.accept_wakers.push(cx.waker().clone());
            }
            match self.drive_read_once(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(())) => continue,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            }
        }
    }

    fn open_outbound(&self) -> Self::OutboundSubstream {
        let mut table = self.table.lock();
        let id = table.alloc_outbound_id();
        table.insert((true, id));
        OutboundSubstream { id, sent: false }
    }

    fn poll_outbound(
        &self,
        cx: &mut Context<'_>,
        s: &mut Self::OutboundSubstream,
    ) -> Poll<Result<Self::Substream, Self::Error>> {
        if !s.sent {
            let frame = Frame { stream_id: s.id, initiator: true, body: FrameBody::NewStream(None) };
            match self.enqueue_and_flush(cx, &frame) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Ready(Ok(())) => s.sent = true,
            }
        }
        match self.drive_write(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => Poll::Ready(Ok(MplexSubstream { id: s.id, local_initiated: true })),
        }
    }

    fn destroy_outbound(&self, s: Self::OutboundSubstream) {
        let mut table = self.table.lock();
        table.streams.remove(&(true, s.id));
    }

    fn read_substream(&self, cx: &mut Context<'_>, s: &mut Self::Substream, buf: &mut [u8]) -> Poll<Result<usize, Self::Error>> {
        loop {
            {
                let mut table = self.table.lock();
                self.check_buffer_timeouts(&mut table);
                let key = (s.local_initiated, s.id);
                match table.get_mut(&key) {
                    None => return Poll::Ready(Ok(0)),
                    Some(entry) => {
                        if entry.reset {
                            return Poll::Ready(Err(MplexError::RemoteReset(s.id)));
                        }
                        if !entry.recv_buf.is_empty() {
                            let n = std::cmp::min(buf.len(), entry.recv_buf.len());
                            for slot in buf.iter_mut().take(n) {
                                *slot = entry.recv_buf.pop_front().unwrap();
                            }
                            if entry.recv_buf.len() < self.config.max_buffer_len {
                                entry.buffer_full_since = None;
                            }
                            return Poll::Ready(Ok(n));
                        }
                        if entry.read_closed {
                            if entry.is_fully_closed() {
                                table.streams.remove(&key);
                            }
                            return Poll::Ready(Ok(0));
                        }
                        entry.read_wakers.push(cx.waker().clone());
                    }
                }
            }
            match self.drive_read_once(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(())) => continue,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            }
        }
    }

    fn write_substream(&self, cx: &mut Context<'_>, s: &mut Self::Substream, buf: &[u8]) -> Poll<Result<usize, Self::Error>> {
        {
            let mut table = self.table.lock();
            match table.get_mut(&(s.local_initiated, s.id)) {
                None => return Poll::Ready(Err(MplexError::StreamClosed(s.id))),
                Some(entry) => {
                    if entry.reset {
                        return Poll::Ready(Err(MplexError::RemoteReset(s.id)));
                    }
                    if entry.write_closed {
                        return Poll::Ready(Err(MplexError::StreamClosed(s.id)));
                    }
                }
            }
        }
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let n = std::cmp::min(buf.len(), self.config.split_send_size);
        let frame = Frame {
            stream_id: s.id,
            initiator: s.local_initiated,
            body: FrameBody::Message(Bytes::copy_from_slice(&buf[..n])),
        };
        match self.enqueue_and_flush(cx, &frame) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => Poll::Ready(Ok(n)),
        }
    }

    fn flush_substream(&self, cx: &mut Context<'_>, _s: &mut Self::Substream) -> Poll<Result<(), Self::Error>> {
        self.drive_write(cx)
    }

    fn shutdown_substream(&self, cx: &mut Context<'_>, s: &mut Self::Substream) -> Poll<Result<(), Self::Error>> {
        let key = (s.local_initiated, s.id);
        {
            let mut table = self.table.lock();
            match table.get_mut(&key) {
                None => return Poll::Ready(Ok(())),
                Some(entry) => {
                    if entry.write_closed || entry.reset {
                        return Poll::Ready(Ok(()));
                    }
                    entry.write_closed = true;
                    if entry.is_fully_closed() {
                        table.streams.remove(&key);
                    }
                }
            }
        }
        let frame = Frame { stream_id: s.id, initiator: s.local_initiated, body: FrameBody::Close };
        self.enqueue_and_flush(cx, &frame)
    }

    fn destroy_substream(&self, s: Self::Substream) {
        let mut table = self.table.lock();
        table.streams.remove(&(s.local_initiated, s.id));
    }

    fn close(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let keys: Vec<StreamKey> = {
            let mut table = self.table.lock();
            if table.closed {
                return Poll::Ready(Ok(()));
            }
            table.closed = true;
            let keys: Vec<_> = table.streams.keys().copied().collect();
            table.wake_all();
            keys
        };
        {
            let mut io = self.io.lock();
            for (local_initiated, id) in keys {
                let _ = io.writer.enqueue(&Frame { stream_id: id, initiator: local_initiated, body: FrameBody::Reset });
            }
        }
        self.drive_write(cx)
    }

    fn flush_all(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.drive_write(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::{AsyncRead, AsyncWrite};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::rc::Rc;

    struct Chan {
        write_to: Rc<RefCell<VecDeque<u8>>>,
        read_from: Rc<RefCell<VecDeque<u8>>>,
    }

    fn pipe() -> (Chan, Chan) {
        let a_to_b = Rc::new(RefCell::new(VecDeque::new()));
        let b_to_a = Rc::new(RefCell::new(VecDeque::new()));
        (
            Chan { write_to: a_to_b.clone(), read_from: b_to_a.clone() },
            Chan { write_to: b_to_a, read_from: a_to_b },
        )
    }

    impl AsyncRead for Chan {
        fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
            let mut src = self.read_from.borrow_mut();
            if src.is_empty() {
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
            let n = std::cmp::min(buf.len(), src.len());
            for slot in buf.iter_mut().take(n) {
                *slot = src.pop_front().unwrap();
            }
            Poll::Ready(Ok(n))
        }
    }

    impl AsyncWrite for Chan {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            self.write_to.borrow_mut().extend(buf.iter().copied());
            Poll::Ready(Ok(buf.len()))
        }
        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[async_std::test]
    async fn opens_and_exchanges_data() {
        let (a_io, b_io) = pipe();
        let a = Multiplex::new(a_io);
        let b = Multiplex::new(b_io);

        let mut outbound = a.open_outbound();
        let a_stream = futures::future::poll_fn(|cx| a.poll_outbound(cx, &mut outbound)).await.unwrap();

        let event = futures::future::poll_fn(|cx| b.poll_event(cx)).await.unwrap();
        let StreamMuxerEvent::InboundSubstream(mut b_stream) = event;

        let mut a_stream = a_stream;
        futures::future::poll_fn(|cx| a.write_substream(cx, &mut a_stream, b"hello")).await.unwrap();

        let mut buf = [0u8; 5];
        let n = loop {
            match futures::future::poll_fn(|cx| b.read_substream(cx, &mut b_stream, &mut buf)).await {
                n if n.unwrap_or(0) > 0 => break n.unwrap(),
                _ => continue,
            }
        };
        assert_eq!(&buf[..n], b"hello");
    }

    #[async_std::test]
    async fn half_close_then_eof() {
        let (a_io, b_io) = pipe();
        let a = Multiplex::new(a_io);
        let b = Multiplex::new(b_io);

        let mut outbound = a.open_outbound();
        let mut a_stream = futures::future::poll_fn(|cx| a.poll_outbound(cx, &mut outbound)).await.unwrap();
        let event = futures::future::poll_fn(|cx| b.poll_event(cx)).await.unwrap();
        let StreamMuxerEvent::InboundSubstream(mut b_stream) = event;

        futures::future::poll_fn(|cx| a.shutdown_substream(cx, &mut a_stream)).await.unwrap();

        let mut buf = [0u8; 8];
        let n = loop {
            match futures::future::poll_fn(|cx| b.read_substream(cx, &mut b_stream, &mut buf)).await {
                Ok(n) => break n,
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        };
        assert_eq!(n, 0);
    }

    #[async_std::test]
    async fn remote_reset_fails_subsequent_reads_and_writes() {
        let (a_io, b_io) = pipe();
        let a = Multiplex::new(a_io);
        let b = Multiplex::new(b_io);

        let mut outbound = a.open_outbound();
        let mut a_stream = futures::future::poll_fn(|cx| a.poll_outbound(cx, &mut outbound)).await.unwrap();
        let event = futures::future::poll_fn(|cx| b.poll_event(cx)).await.unwrap();
        let StreamMuxerEvent::InboundSubstream(b_stream) = event;

        let reset = Frame { stream_id: b_stream.id, initiator: b_stream.local_initiated, body: FrameBody::Reset };
        futures::future::poll_fn(|cx| b.enqueue_and_flush(cx, &reset)).await.unwrap();

        let err = loop {
            match futures::future::poll_fn(|cx| a.read_substream(cx, &mut a_stream, &mut [0u8; 1])).await {
                Ok(0) => continue,
                Ok(_) => panic!("unexpected data after remote reset"),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, MplexError::RemoteReset(_)));

        let err = futures::future::poll_fn(|cx| a.write_substream(cx, &mut a_stream, b"x")).await.unwrap_err();
        assert!(matches!(err, MplexError::RemoteReset(_)));
    }
}
