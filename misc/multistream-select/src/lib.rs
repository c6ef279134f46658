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

//! Implementation of the `multistream-select` protocol.
//!
//! This is a line protocol used to negotiate, out of a list of protocol
//! names, which one to use on a freshly opened channel. It is used at three
//! distinct places in this stack: choosing a security transport, choosing a
//! stream multiplexer, and choosing an application protocol per stream.

mod dialer;
mod error;
mod line;
mod listener;
mod negotiated;
mod simultaneous;

pub use dialer::{dialer_select_proto, dialer_select_proto_lazy};
pub use error::NegotiationError;
pub use listener::listener_select_proto;
pub use negotiated::Negotiated;
pub use simultaneous::{negotiate_simultaneous_open, Role as SimultaneousOpenRole};

/// The literal handshake token every peer sends as its first line.
pub const HANDSHAKE: &[u8] = b"/multistream/1.0.0";

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::{AsyncRead, AsyncWrite};
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// An in-memory duplex pipe, for exercising dialer/listener against each
    /// other without a real socket.
    struct Chan {
        write_to: std::rc::Rc<std::cell::RefCell<std::collections::VecDeque<u8>>>,
        read_from: std::rc::Rc<std::cell::RefCell<std::collections::VecDeque<u8>>>,
    }

    fn pipe() -> (Chan, Chan) {
        let a_to_b = std::rc::Rc::new(std::cell::RefCell::new(std::collections::VecDeque::new()));
        let b_to_a = std::rc::Rc::new(std::cell::RefCell::new(std::collections::VecDeque::new()));
        (
            Chan { write_to: a_to_b.clone(), read_from: b_to_a.clone() },
            Chan { write_to: b_to_a, read_from: a_to_b },
        )
    }

    impl AsyncRead for Chan {
        fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
            let mut src = self.read_from.borrow_mut();
            if src.is_empty() {
                // No real I/O reactor backs this in-memory pipe; spin rather
                // than stall so the executor keeps polling until the peer
                // writes.
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
    async fn negotiates_first_supported() {
        let (dialer_io, listener_io) = pipe();
        let dialer = dialer_select_proto_lazy(dialer_io, vec!["/q/1", "/w/1", "/a/1", "/y/1", "/b/1"]);
        let listener = listener_select_proto(listener_io, vec!["/a/1", "/b/1", "/c/1"]);
        let (dialer_res, listener_res) = futures::join!(dialer, listener);
        let (chosen, _) = dialer_res.unwrap();
        let (matched, _) = listener_res.unwrap();
        assert_eq!(chosen, "/a/1");
        assert_eq!(matched, "/a/1");
    }

    #[async_std::test]
    async fn fails_when_nothing_in_common() {
        let (dialer_io, listener_io) = pipe();
        let dialer = dialer_select_proto(dialer_io, "/z/1");
        let listener = listener_select_proto(listener_io, vec!["/a/1"]);
        let (dialer_res, _listener_res) = futures::join!(dialer, listener);
        assert!(matches!(dialer_res.unwrap_err(), NegotiationError::ProtocolNotSupported));
    }
}
