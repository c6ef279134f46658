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

//! The `Transport` trait (C9's contract): dialing and listening over some
//! underlying network, producing raw duplex byte connections that C8 then
//! upgrades.

pub mod upgrade;

use crate::error::TransportError;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use multiaddr::Multiaddr;

/// A raw, not-yet-secured, not-yet-multiplexed duplex connection plus the
/// address it was reached on.
pub trait Transport {
    type Output: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + Send + 'static;

    /// True iff `addr`'s components match what this transport can dial
    /// (spec §4.9: for TCP, an `ip4|ip6|dns*` component followed by
    /// `tcp/<port>` with `port > 0`).
    fn can_dial(&self, addr: &Multiaddr) -> bool;

    fn dial(&self, addr: Multiaddr) -> Result<BoxFuture<'static, Result<Self::Output, TransportError>>, TransportError>;

    fn listen_on(&self, addr: Multiaddr) -> Result<Listener<Self::Output>, TransportError>;
}

/// Events a listener produces: a new inbound connection, or the fact that
/// it has stopped accepting (spec §4.9 `ListenerClosed`).
pub enum ListenerEvent<T> {
    Incoming { upgrade: BoxFuture<'static, Result<T, TransportError>>, local_addr: Multiaddr, remote_addr: Multiaddr },
    Closed(Option<TransportError>),
}

pub struct Listener<T> {
    pub local_addr: Multiaddr,
    pub events: BoxStream<'static, ListenerEvent<T>>,
}
