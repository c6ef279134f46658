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

//! A poll-based, resumable frame reader/writer over the raw socket.
//!
//! Everything in `codec.rs` is written against `AsyncRead`/`AsyncWrite` plus
//! `.await`, which is convenient for tests but cannot be driven from inside
//! `StreamMuxer`'s non-async `poll_*` methods. This module re-implements the
//! same wire format as a small state machine that can be suspended and
//! resumed across polls without an executor.

use crate::codec::{serialize_frame, CodecError, Frame, FrameBody, MAX_MESSAGE_LEN, MAX_NEW_STREAM_LEN};
use bytes::Bytes;
use futures::io::{AsyncRead, AsyncWrite};
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

/// How many bytes of a varint we tolerate before giving up (matches
/// `unsigned-varint`'s own ceiling for a `u64`).
const MAX_VARINT_BYTES: usize = 10;

enum ReadStage {
    Header(Vec<u8>),
    Length { header: u64, buf: Vec<u8> },
    Payload { header: u64, len: usize, data: Vec<u8> },
}

pub(crate) struct FrameReader {
    stage: ReadStage,
}

impl FrameReader {
    pub fn new() -> Self {
        FrameReader { stage: ReadStage::Header(Vec::with_capacity(MAX_VARINT_BYTES)) }
    }

    /// Tries to make progress decoding the next frame. Returns `Pending`
    /// when the underlying socket has no more bytes right now; the waker
    /// passed in `cx` is registered by the inner `poll_read` call.
    pub fn poll_next<T: AsyncRead + Unpin>(
        &mut self,
        io: Pin<&mut T>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Frame, CodecError>> {
        let mut io = io;
        loop {
            match &mut self.stage {
                ReadStage::Header(buf) | ReadStage::Length { buf, .. } => {
                    let mut byte = [0u8; 1];
                    match io.as_mut().poll_read(cx, &mut byte) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(Err(e)) => return Poll::Ready(Err(e.into())),
                        Poll::Ready(Ok(0)) => {
                            return Poll::Ready(Err(CodecError::Io(io::ErrorKind::UnexpectedEof.into())))
                        }
                        Poll::Ready(Ok(_)) => {
                            let continuation = byte[0] & 0x80 != 0;
                            buf.push(byte[0]);
                            if buf.len() > MAX_VARINT_BYTES {
                                return Poll::Ready(Err(CodecError::Io(io::Error::new(
                                    io::ErrorKind::InvalidData,
                                    "varint too long",
                                ))));
                            }
                            if continuation {
                                continue;
                            }
                            let (value, _) = unsigned_varint::decode::u64(buf).map_err(|_| {
                                CodecError::Io(io::Error::new(io::ErrorKind::InvalidData, "bad varint"))
                            })?;
                            self.stage = match &self.stage {
                                ReadStage::Header(_) => ReadStage::Length { header: value, buf: Vec::with_capacity(MAX_VARINT_BYTES) },
                                ReadStage::Length { header, .. } => {
                                    let header = *header;
                                    let tag = header & 0x7;
                                    let limit = if tag == 0 { MAX_NEW_STREAM_LEN } else { MAX_MESSAGE_LEN };
                                    if value as usize > limit {
                                        let err = if tag == 0 {
                                            CodecError::NewStreamTooLarge(value as usize, limit)
                                        } else {
                                            CodecError::MessageTooLarge(value as usize, limit)
                                        };
                                        return Poll::Ready(Err(err));
                                    }
                                    ReadStage::Payload { header, len: value as usize, data: Vec::with_capacity(value as usize) }
                                }
                                ReadStage::Payload { .. } => unreachable!(),
                            };
                        }
                    }
                }
                ReadStage::Payload { header, len, data } => {
                    if data.len() == *len {
                        let header = *header;
                        let tag = header & 0x7;
                        let stream_id = header >> 3;
                        let initiator = tag % 2 == 0;
                        let taken = std::mem::take(data);
                        let body = match tag {
                            0 => {
                                let name = if taken.is_empty() { None } else { Some(String::from_utf8_lossy(&taken).into_owned()) };
                                FrameBody::NewStream(name)
                            }
                            1 | 2 => FrameBody::Message(Bytes::from(taken)),
                            3 | 4 => FrameBody::Close,
                            5 | 6 => FrameBody::Reset,
                            other => return Poll::Ready(Err(CodecError::UnknownTag(other))),
                        };
                        self.stage = ReadStage::Header(Vec::with_capacity(MAX_VARINT_BYTES));
                        return Poll::Ready(Ok(Frame { stream_id, initiator, body }));
                    }
                    let mut chunk = vec![0u8; len - data.len()];
                    match io.as_mut().poll_read(cx, &mut chunk) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(Err(e)) => return Poll::Ready(Err(e.into())),
                        Poll::Ready(Ok(0)) => {
                            return Poll::Ready(Err(CodecError::Io(io::ErrorKind::UnexpectedEof.into())))
                        }
                        Poll::Ready(Ok(n)) => data.extend_from_slice(&chunk[..n]),
                    }
                }
            }
        }
    }
}

/// A FIFO of already-serialized frames waiting to go out, plus the partial
/// write offset into the frame currently being written.
pub(crate) struct FrameWriter {
    queue: VecDeque<Vec<u8>>,
    cursor: usize,
}

impl FrameWriter {
    pub fn new() -> Self {
        FrameWriter { queue: VecDeque::new(), cursor: 0 }
    }

    pub fn enqueue(&mut self, frame: &Frame) -> Result<(), CodecError> {
        self.queue.push_back(serialize_frame(frame)?);
        Ok(())
    }

    pub fn pending_frames(&self) -> usize {
        self.queue.len()
    }

    /// Drives as many queued frames to the socket as it will currently
    /// accept. Returns `Ready(Ok(()))` once the queue is fully drained.
    pub fn poll_flush<T: AsyncWrite + Unpin>(&mut self, mut io: Pin<&mut T>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        loop {
            let front = match self.queue.front() {
                Some(f) => f,
                None => return Poll::Ready(Ok(())),
            };
            while self.cursor < front.len() {
                match io.as_mut().poll_write(cx, &front[self.cursor..]) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Ready(Ok(0)) => {
                        return Poll::Ready(Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0")))
                    }
                    Poll::Ready(Ok(n)) => self.cursor += n,
                }
            }
            self.queue.pop_front();
            self.cursor = 0;
        }
    }
}
