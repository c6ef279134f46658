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

//! The ping example protocol (spec §4.13): the dialer repeatedly sends a
//! random 32-byte payload and expects the exact same bytes back, sampling
//! the round-trip time; the listener just echoes whatever it receives.
//! Applying a deadline to a ping round trip is left to the caller (e.g. via
//! `async_std::future::timeout`), which is why [`PingError`] carries a
//! `Timeout` variant this crate never constructs itself.

use futures::future::BoxFuture;
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use libp2p_core::upgrade::{InboundUpgrade, OutboundUpgrade, UpgradeInfo};
use rand::RngCore;
use std::time::Duration;
use thiserror::Error;
use wasm_timer::Instant;

/// The protocol identifier ping speaks.
pub const PROTOCOL_ID: &str = "/ipfs/ping/1.0.0";

const PING_SIZE: usize = 32;

#[derive(Debug, Error)]
pub enum PingError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("pong payload did not match the ping payload")]
    UnexpectedPayload,
    #[error("ping round trip timed out")]
    Timeout,
}

/// The ping protocol, selected by [`UpgradeInfo::protocol_info`] as
/// `/ipfs/ping/1.0.0`. As an outbound upgrade it yields one RTT sample; as
/// an inbound upgrade it runs the echo responder until the stream closes.
#[derive(Clone, Copy, Debug, Default)]
pub struct PingConfig;

impl UpgradeInfo for PingConfig {
    fn protocol_info(&self) -> Vec<String> {
        vec![PROTOCOL_ID.to_string()]
    }
}

impl<C> OutboundUpgrade<C> for PingConfig
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Output = Duration;
    type Error = PingError;

    fn upgrade_outbound(self, socket: C, _protocol: String) -> BoxFuture<'static, Result<Self::Output, Self::Error>> {
        Box::pin(async move {
            let mut socket = socket;
            ping_once(&mut socket).await
        })
    }
}

impl<C> InboundUpgrade<C> for PingConfig
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Output = ();
    type Error = PingError;

    fn upgrade_inbound(self, socket: C, _protocol: String) -> BoxFuture<'static, Result<Self::Output, Self::Error>> {
        Box::pin(answer(socket))
    }
}

/// Sends one random 32-byte payload and waits for the identical bytes back,
/// returning the measured round-trip time.
pub async fn ping_once<C: AsyncRead + AsyncWrite + Unpin>(socket: &mut C) -> Result<Duration, PingError> {
    let mut payload = [0u8; PING_SIZE];
    rand::thread_rng().fill_bytes(&mut payload);

    let start = Instant::now();
    socket.write_all(&payload).await?;
    socket.flush().await?;

    let mut echoed = [0u8; PING_SIZE];
    socket.read_exact(&mut echoed).await?;
    let rtt = start.elapsed();

    if echoed != payload {
        return Err(PingError::UnexpectedPayload);
    }
    Ok(rtt)
}

/// Runs `count` sequential ping round trips over the same stream, as in the
/// ping scenario's "run 5 pings" check.
pub async fn ping<C: AsyncRead + AsyncWrite + Unpin>(socket: &mut C, count: usize) -> Result<Vec<Duration>, PingError> {
    let mut samples = Vec::with_capacity(count);
    for _ in 0..count {
        samples.push(ping_once(socket).await?);
    }
    Ok(samples)
}

/// The listener side: echoes back every 32-byte payload it receives until
/// the stream reaches EOF.
pub async fn answer<C: AsyncRead + AsyncWrite + Unpin>(mut socket: C) -> Result<(), PingError> {
    let mut buf = [0u8; PING_SIZE];
    loop {
        match socket.read_exact(&mut buf).await {
            Ok(()) => {
                socket.write_all(&buf).await?;
                socket.flush().await?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(PingError::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future;

    /// An in-memory duplex pipe, the same shape used across this workspace's
    /// protocol test suites.
    struct Chan {
        write_to: std::rc::Rc<std::cell::RefCell<std::collections::VecDeque<u8>>>,
        read_from: std::rc::Rc<std::cell::RefCell<std::collections::VecDeque<u8>>>,
        /// Set by `poll_close` on this side.
        my_closed: std::rc::Rc<std::cell::Cell<bool>>,
        /// The other side's `my_closed`, checked by `poll_read` for EOF.
        peer_closed: std::rc::Rc<std::cell::Cell<bool>>,
    }

    fn pipe() -> (Chan, Chan) {
        let a_to_b = std::rc::Rc::new(std::cell::RefCell::new(std::collections::VecDeque::new()));
        let b_to_a = std::rc::Rc::new(std::cell::RefCell::new(std::collections::VecDeque::new()));
        let a_closed = std::rc::Rc::new(std::cell::Cell::new(false));
        let b_closed = std::rc::Rc::new(std::cell::Cell::new(false));
        (
            Chan { write_to: a_to_b.clone(), read_from: b_to_a.clone(), my_closed: a_closed.clone(), peer_closed: b_closed.clone() },
            Chan { write_to: b_to_a, read_from: a_to_b, my_closed: b_closed, peer_closed: a_closed },
        )
    }

    impl AsyncRead for Chan {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &mut [u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            let mut src = self.read_from.borrow_mut();
            if src.is_empty() {
                if self.peer_closed.get() {
                    return std::task::Poll::Ready(Ok(0));
                }
                cx.waker().wake_by_ref();
                return std::task::Poll::Pending;
            }
            let n = std::cmp::min(buf.len(), src.len());
            for slot in buf.iter_mut().take(n) {
                *slot = src.pop_front().unwrap();
            }
            std::task::Poll::Ready(Ok(n))
        }
    }

    impl AsyncWrite for Chan {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            self.write_to.borrow_mut().extend(buf.iter().copied());
            std::task::Poll::Ready(Ok(buf.len()))
        }
        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
        fn poll_close(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            self.my_closed.set(true);
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[async_std::test]
    async fn five_pings_all_succeed_with_positive_rtt() {
        let (mut dialer, listener) = pipe();
        let responder = async_std::task::spawn(async move { answer(listener).await });

        let samples = ping(&mut dialer, 5).await.unwrap();
        assert_eq!(samples.len(), 5);
        assert!(samples.iter().all(|rtt| *rtt >= Duration::from_nanos(0)));

        dialer.close().await.unwrap();
        responder.await.unwrap();
    }

    #[async_std::test]
    async fn mismatched_payload_is_rejected() {
        let (mut dialer, mut listener) = pipe();
        let responder = async_std::task::spawn(async move {
            let mut buf = [0u8; PING_SIZE];
            listener.read_exact(&mut buf).await.unwrap();
            let wrong = [0xffu8; PING_SIZE];
            listener.write_all(&wrong).await.unwrap();
        });
        let result = ping_once(&mut dialer).await;
        assert!(matches!(result, Err(PingError::UnexpectedPayload)));
        responder.await;
    }
}
