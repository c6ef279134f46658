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

//! Sum types for composing two alternative outputs or errors without
//! boxing, the way this crate's security-transport registry (C6) picks
//! between Plaintext and Noise at runtime.

use futures::io::{AsyncRead, AsyncWrite};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EitherOutput<A, B> {
    First(A),
    Second(B),
}

impl<A, B> AsyncRead for EitherOutput<A, B>
where
    A: AsyncRead + Unpin,
    B: AsyncRead + Unpin,
{
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            EitherOutput::First(a) => Pin::new(a).poll_read(cx, buf),
            EitherOutput::Second(b) => Pin::new(b).poll_read(cx, buf),
        }
    }
}

impl<A, B> AsyncWrite for EitherOutput<A, B>
where
    A: AsyncWrite + Unpin,
    B: AsyncWrite + Unpin,
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            EitherOutput::First(a) => Pin::new(a).poll_write(cx, buf),
            EitherOutput::Second(b) => Pin::new(b).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            EitherOutput::First(a) => Pin::new(a).poll_flush(cx),
            EitherOutput::Second(b) => Pin::new(b).poll_flush(cx),
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            EitherOutput::First(a) => Pin::new(a).poll_close(cx),
            EitherOutput::Second(b) => Pin::new(b).poll_close(cx),
        }
    }
}

#[derive(Debug)]
pub enum EitherError<A, B> {
    First(A),
    Second(B),
}

impl<A: std::fmt::Display, B: std::fmt::Display> std::fmt::Display for EitherError<A, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EitherError::First(a) => a.fmt(f),
            EitherError::Second(b) => b.fmt(f),
        }
    }
}

impl<A: std::fmt::Debug + std::fmt::Display, B: std::fmt::Debug + std::fmt::Display> std::error::Error for EitherError<A, B> {}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::{AsyncReadExt, AsyncWriteExt, Cursor};

    #[async_std::test]
    async fn first_variant_delegates_to_inner_io() {
        let mut out: EitherOutput<Cursor<Vec<u8>>, Cursor<Vec<u8>>> = EitherOutput::First(Cursor::new(Vec::new()));
        out.write_all(b"hello").await.unwrap();
        if let EitherOutput::First(cursor) = &mut out {
            cursor.set_position(0);
        }
        let mut buf = [0u8; 5];
        out.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[async_std::test]
    async fn second_variant_delegates_to_inner_io() {
        let mut out: EitherOutput<Cursor<Vec<u8>>, Cursor<Vec<u8>>> = EitherOutput::Second(Cursor::new(Vec::new()));
        out.write_all(b"world").await.unwrap();
        if let EitherOutput::Second(cursor) = &mut out {
            cursor.set_position(0);
        }
        let mut buf = [0u8; 5];
        out.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn either_error_display_forwards_to_the_active_variant() {
        let err: EitherError<&str, &str> = EitherError::First("boom");
        assert_eq!(err.to_string(), "boom");
    }
}
