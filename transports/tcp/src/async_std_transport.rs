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

use crate::addr::{local_addresses, multiaddr_to_socketaddr, socketaddr_to_multiaddr};
use async_std::net::{TcpListener, TcpStream};
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use libp2p_core::error::TransportError;
use libp2p_core::transport::{Listener, ListenerEvent, Transport};
use libp2p_core::Multiaddr;

/// The TCP transport, running on the `async-std` reactor.
#[derive(Clone, Default)]
pub struct TcpConfig {
    ttl: Option<u32>,
    nodelay: Option<bool>,
}

impl TcpConfig {
    pub fn new() -> Self {
        TcpConfig::default()
    }

    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = Some(nodelay);
        self
    }

    fn configure(&self, stream: &TcpStream) -> Result<(), TransportError> {
        if let Some(ttl) = self.ttl {
            stream.set_ttl(ttl)?;
        }
        if let Some(nodelay) = self.nodelay {
            stream.set_nodelay(nodelay)?;
        }
        Ok(())
    }
}

impl Transport for TcpConfig {
    type Output = TcpStream;

    fn can_dial(&self, addr: &Multiaddr) -> bool {
        multiaddr_to_socketaddr(addr).is_some()
    }

    fn dial(&self, addr: Multiaddr) -> Result<BoxFuture<'static, Result<Self::Output, TransportError>>, TransportError> {
        let socket_addr =
            multiaddr_to_socketaddr(&addr).ok_or_else(|| TransportError::protocol("address is not dialable by TCP"))?;
        let config = self.clone();
        Ok(Box::pin(async move {
            log::debug!("dialing {}", socket_addr);
            let stream = TcpStream::connect(socket_addr).await?;
            config.configure(&stream)?;
            Ok(stream)
        }))
    }

    fn listen_on(&self, addr: Multiaddr) -> Result<Listener<Self::Output>, TransportError> {
        let socket_addr =
            multiaddr_to_socketaddr(&addr).ok_or_else(|| TransportError::protocol("address is not listenable by TCP"))?;

        // Bind synchronously via `std`, then hand the socket to async-std's
        // reactor. Binding is a single non-blocking syscall, so there is no
        // need to defer it into the returned stream.
        let std_listener = std::net::TcpListener::bind(socket_addr)?;
        std_listener.set_nonblocking(true)?;
        let listener: TcpListener = std_listener.into();
        let bound_addr = listener.local_addr()?;

        let local_addr = local_addresses(&bound_addr).into_iter().next().unwrap_or(addr);
        let reported_local = local_addr.clone();
        let config = self.clone();

        let events: BoxStream<'static, ListenerEvent<Self::Output>> =
            stream::unfold((listener, config, reported_local), |(listener, config, local_addr)| async move {
                match listener.accept().await {
                    Ok((stream, remote)) => {
                        let remote_addr = socketaddr_to_multiaddr(&remote);
                        let local = local_addr.clone();
                        let upgrade: BoxFuture<'static, Result<TcpStream, TransportError>> = Box::pin(async move {
                            config.configure(&stream)?;
                            Ok(stream)
                        });
                        let event = ListenerEvent::Incoming { upgrade, local_addr: local, remote_addr };
                        Some((event, (listener, config, local_addr)))
                    }
                    Err(e) => Some((ListenerEvent::Closed(Some(e.into())), (listener, config, local_addr))),
                }
            })
            .boxed();

        Ok(Listener { local_addr, events })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::{AsyncReadExt, AsyncWriteExt};

    #[async_std::test]
    async fn dial_accepts_and_exchanges_bytes() {
        let config = TcpConfig::new();
        let mut listener = config.listen_on("/ip4/127.0.0.1/tcp/0".parse().unwrap()).unwrap();
        let listen_addr = listener.local_addr.clone();

        let server = async_std::task::spawn(async move {
            match listener.events.next().await.unwrap() {
                ListenerEvent::Incoming { upgrade, .. } => {
                    let mut stream = upgrade.await.unwrap();
                    let mut buf = [0u8; 5];
                    stream.read_exact(&mut buf).await.unwrap();
                    assert_eq!(&buf, b"hello");
                }
                ListenerEvent::Closed(_) => panic!("listener closed before accepting"),
            }
        });

        let socket_addr = multiaddr_to_socketaddr(&listen_addr).unwrap();
        let dial_addr: Multiaddr = format!("/ip4/127.0.0.1/tcp/{}", socket_addr.port()).parse().unwrap();
        let mut stream = config.dial(dial_addr).unwrap().await.unwrap();
        stream.write_all(b"hello").await.unwrap();

        server.await;
    }

    #[test]
    fn cannot_dial_non_tcp() {
        let config = TcpConfig::new();
        let addr: Multiaddr = "/ip4/127.0.0.1/udp/1234".parse().unwrap();
        assert!(!config.can_dial(&addr));
    }
}
