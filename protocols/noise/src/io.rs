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

//! Post-handshake Noise framing: `u16-be(len) || ciphertext` chunks, each
//! decrypting to at most 65535 - 16 plaintext bytes (spec §4.5). Built as a
//! resumable-across-polls state machine in the same style as this
//! workspace's mplex frame driver, since `AsyncRead`/`AsyncWrite` here are
//! poll-based, not `async fn`.

use futures::io::{AsyncRead, AsyncWrite};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Max ciphertext length per Noise transport message; `snow` enforces this
/// too, but checking here gives a clear error instead of a panic.
const MAX_FRAME_LEN: usize = 65535;
/// AEAD tag overhead `snow` adds to each transport message.
const TAG_LEN: usize = 16;
const MAX_PLAINTEXT_LEN: usize = MAX_FRAME_LEN - TAG_LEN;

enum ReadState {
    ReadLen { buf: [u8; 2], pos: usize },
    ReadFrame { len: usize, buf: Vec<u8>, pos: usize },
    Readable { data: Vec<u8>, pos: usize },
}

enum WriteState {
    Ready,
    Writing { buf: Vec<u8>, pos: usize, consumed: usize },
}

/// A duplex stream `C` with a completed Noise transport session layered on
/// top: every byte in and out passes through AEAD encryption.
pub struct NoiseOutput<C> {
    io: C,
    session: snow::TransportState,
    read_state: ReadState,
    write_state: WriteState,
}

impl<C> NoiseOutput<C> {
    pub(crate) fn new(io: C, session: snow::TransportState) -> Self {
        NoiseOutput {
            io,
            session,
            read_state: ReadState::ReadLen { buf: [0u8; 2], pos: 0 },
            write_state: WriteState::Ready,
        }
    }
}

impl<C: AsyncRead + Unpin> AsyncRead for NoiseOutput<C> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        loop {
            match &mut this.read_state {
                ReadState::ReadLen { buf: len_buf, pos } => {
                    while *pos < 2 {
                        match Pin::new(&mut this.io).poll_read(cx, &mut len_buf[*pos..2])? {
                            Poll::Ready(0) => return Poll::Ready(Ok(0)),
                            Poll::Ready(n) => *pos += n,
                            Poll::Pending => return Poll::Pending,
                        }
                    }
                    let len = u16::from_be_bytes(*len_buf) as usize;
                    this.read_state = ReadState::ReadFrame { len, buf: vec![0u8; len], pos: 0 };
                }
                ReadState::ReadFrame { len, buf: frame, pos } => {
                    while *pos < *len {
                        match Pin::new(&mut this.io).poll_read(cx, &mut frame[*pos..])? {
                            Poll::Ready(0) => return Poll::Ready(Err(io::ErrorKind::UnexpectedEof.into())),
                            Poll::Ready(n) => *pos += n,
                            Poll::Pending => return Poll::Pending,
                        }
                    }
                    let mut plaintext = vec![0u8; *len];
                    let n = this
                        .session
                        .read_message(frame, &mut plaintext)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                    plaintext.truncate(n);
                    this.read_state = ReadState::Readable { data: plaintext, pos: 0 };
                }
                ReadState::Readable { data, pos } => {
                    if *pos == data.len() {
                        this.read_state = ReadState::ReadLen { buf: [0u8; 2], pos: 0 };
                        continue;
                    }
                    let n = std::cmp::min(buf.len(), data.len() - *pos);
                    buf[..n].copy_from_slice(&data[*pos..*pos + n]);
                    *pos += n;
                    return Poll::Ready(Ok(n));
                }
            }
        }
    }
}

impl<C: AsyncWrite + Unpin> AsyncWrite for NoiseOutput<C> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        loop {
            match &mut this.write_state {
                WriteState::Ready => {
                    if buf.is_empty() {
                        return Poll::Ready(Ok(0));
                    }
                    let chunk_len = std::cmp::min(buf.len(), MAX_PLAINTEXT_LEN);
                    let mut ciphertext = vec![0u8; MAX_FRAME_LEN];
                    let n = this
                        .session
                        .write_message(&buf[..chunk_len], &mut ciphertext)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                    ciphertext.truncate(n);
                    let mut framed = Vec::with_capacity(2 + ciphertext.len());
                    framed.extend_from_slice(&(n as u16).to_be_bytes());
                    framed.extend_from_slice(&ciphertext);
                    this.write_state = WriteState::Writing { buf: framed, pos: 0, consumed: chunk_len };
                }
                WriteState::Writing { buf: framed, pos, consumed } => {
                    while *pos < framed.len() {
                        match Pin::new(&mut this.io).poll_write(cx, &framed[*pos..])? {
                            Poll::Ready(0) => return Poll::Ready(Err(io::ErrorKind::WriteZero.into())),
                            Poll::Ready(n) => *pos += n,
                            Poll::Pending => return Poll::Pending,
                        }
                    }
                    let consumed = *consumed;
                    this.write_state = WriteState::Ready;
                    return Poll::Ready(Ok(consumed));
                }
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let WriteState::Writing { buf, pos, .. } = &mut this.write_state {
            while *pos < buf.len() {
                match Pin::new(&mut this.io).poll_write(cx, &buf[*pos..])? {
                    Poll::Ready(0) => return Poll::Ready(Err(io::ErrorKind::WriteZero.into())),
                    Poll::Ready(n) => *pos += n,
                    Poll::Pending => return Poll::Pending,
                }
            }
            this.write_state = WriteState::Ready;
        }
        Pin::new(&mut this.io).poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.as_mut().poll_flush(cx) {
            Poll::Ready(Ok(())) => {}
            other => return other,
        }
        Pin::new(&mut self.get_mut().io).poll_close(cx)
    }
}
