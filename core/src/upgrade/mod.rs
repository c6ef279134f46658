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

//! Protocol-negotiated upgrades: the glue between a raw duplex byte stream
//! and a concrete implementation picked by running `multistream-select`
//! (C2) over it. C6 (security muxer) and C7 (stream-muxer registry) are
//! both instances of this pattern.

pub mod select;

pub use select::SelectUpgrade;

use futures::future::BoxFuture;
use futures::io::{AsyncRead, AsyncWrite};

/// The set of protocol ids an upgrade can be selected under.
pub trait UpgradeInfo {
    fn protocol_info(&self) -> Vec<String>;
}

/// Applies an upgrade to a socket this side dialed (so negotiation runs in
/// the multistream-select dialer role).
pub trait InboundUpgrade<C>: UpgradeInfo {
    type Output;
    type Error;

    fn upgrade_inbound(self, socket: C, protocol: String) -> BoxFuture<'static, Result<Self::Output, Self::Error>>;
}

pub trait OutboundUpgrade<C>: UpgradeInfo {
    type Output;
    type Error;

    fn upgrade_outbound(self, socket: C, protocol: String) -> BoxFuture<'static, Result<Self::Output, Self::Error>>;
}

/// Runs multistream-select in listener role, then hands the winning
/// protocol to `upgrade`.
pub async fn apply_inbound<C, U>(socket: C, upgrade: U) -> Result<U::Output, UpgradeError<U::Error>>
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    U: InboundUpgrade<C>,
{
    let protocols = upgrade.protocol_info();
    let (protocol, io) = multistream_select::listener_select_proto(socket, protocols)
        .await
        .map_err(UpgradeError::Negotiation)?;
    upgrade
        .upgrade_inbound(io, protocol)
        .await
        .map_err(UpgradeError::Apply)
}

/// Runs multistream-select in dialer role for the single protocol `upgrade`
/// advertises (the case C6/C7 use: security and muxer upgrades each offer
/// exactly one candidate per connection attempt).
pub async fn apply_outbound<C, U>(socket: C, upgrade: U) -> Result<U::Output, UpgradeError<U::Error>>
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    U: OutboundUpgrade<C>,
{
    let protocols = upgrade.protocol_info();
    let protocol = protocols.first().cloned().ok_or(UpgradeError::NoProtocols)?;
    let (_, io) = multistream_select::dialer_select_proto(socket, &protocol)
        .await
        .map_err(UpgradeError::Negotiation)?;
    upgrade
        .upgrade_outbound(io, protocol)
        .await
        .map_err(UpgradeError::Apply)
}

#[derive(Debug)]
pub enum UpgradeError<E> {
    Negotiation(multistream_select::NegotiationError),
    Apply(E),
    NoProtocols,
}

impl<E: std::fmt::Display> std::fmt::Display for UpgradeError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpgradeError::Negotiation(e) => write!(f, "negotiation failed: {}", e),
            UpgradeError::Apply(e) => write!(f, "upgrade failed: {}", e),
            UpgradeError::NoProtocols => write!(f, "upgrade advertised no protocols"),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for UpgradeError<E> {}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::FutureExt;
    use futures::io::{AsyncRead, AsyncWrite};
    use std::convert::Infallible;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};

    /// A `Send`-safe in-memory duplex pipe (unlike the `Rc`-based `Chan` the
    /// multistream-select tests use), so it satisfies `apply_inbound`'s and
    /// `apply_outbound`'s `C: Send` bound.
    struct Chan {
        write_to: Arc<Mutex<std::collections::VecDeque<u8>>>,
        read_from: Arc<Mutex<std::collections::VecDeque<u8>>>,
    }

    fn pipe() -> (Chan, Chan) {
        let a_to_b = Arc::new(Mutex::new(std::collections::VecDeque::new()));
        let b_to_a = Arc::new(Mutex::new(std::collections::VecDeque::new()));
        (Chan { write_to: a_to_b.clone(), read_from: b_to_a.clone() }, Chan { write_to: b_to_a, read_from: a_to_b })
    }

    impl AsyncRead for Chan {
        fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<std::io::Result<usize>> {
            let mut src = self.read_from.lock().unwrap();
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
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
            self.write_to.lock().unwrap().extend(buf.iter().copied());
            Poll::Ready(Ok(buf.len()))
        }
        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[derive(Clone)]
    struct Echo;

    impl UpgradeInfo for Echo {
        fn protocol_info(&self) -> Vec<String> {
            vec!["/echo/1.0.0".to_string()]
        }
    }

    impl<C: Send + 'static> InboundUpgrade<C> for Echo {
        type Output = C;
        type Error = Infallible;
        fn upgrade_inbound(self, socket: C, _protocol: String) -> BoxFuture<'static, Result<C, Infallible>> {
            futures::future::ready(Ok(socket)).boxed()
        }
    }

    impl<C: Send + 'static> OutboundUpgrade<C> for Echo {
        type Output = C;
        type Error = Infallible;
        fn upgrade_outbound(self, socket: C, _protocol: String) -> BoxFuture<'static, Result<C, Infallible>> {
            futures::future::ready(Ok(socket)).boxed()
        }
    }

    #[derive(Clone)]
    struct NoProtocols;

    impl UpgradeInfo for NoProtocols {
        fn protocol_info(&self) -> Vec<String> {
            Vec::new()
        }
    }

    impl<C: Send + 'static> OutboundUpgrade<C> for NoProtocols {
        type Output = C;
        type Error = Infallible;
        fn upgrade_outbound(self, socket: C, _protocol: String) -> BoxFuture<'static, Result<C, Infallible>> {
            futures::future::ready(Ok(socket)).boxed()
        }
    }

    #[async_std::test]
    async fn apply_inbound_and_outbound_negotiate_and_run_the_upgrade() {
        let (dialer_io, listener_io) = pipe();
        let (dialer_res, listener_res) = futures::join!(apply_outbound(dialer_io, Echo), apply_inbound(listener_io, Echo));
        dialer_res.unwrap();
        listener_res.unwrap();
    }

    #[async_std::test]
    async fn apply_outbound_fails_fast_when_upgrade_advertises_no_protocols() {
        let (dialer_io, _listener_io) = pipe();
        let err = apply_outbound(dialer_io, NoProtocols).await.unwrap_err();
        assert!(matches!(err, UpgradeError::NoProtocols));
    }

    #[test]
    fn upgrade_error_display_matches_variant() {
        assert_eq!(UpgradeError::<Infallible>::NoProtocols.to_string(), "upgrade advertised no protocols");
    }
}
