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

//! The Noise security transport (spec §4.5): a Noise XX handshake binding
//! each side's long-term identity key to an ephemeral Noise static key via
//! a signature, followed by an encrypted transport phase. See [`io`] for
//! the post-handshake framing and [`handshake`] for the XX exchange itself.

mod handshake;
mod io;

use futures::future::BoxFuture;
use futures::io::{AsyncRead, AsyncWrite};
use libp2p_core::identities::LocalIdentity;
use libp2p_core::transport::upgrade::Authenticated;
use libp2p_core::upgrade::{InboundUpgrade, OutboundUpgrade, UpgradeInfo};
use thiserror::Error;

pub use io::NoiseOutput;

/// Generated from `noise.proto`.
mod proto {
    include!(concat!(env!("OUT_DIR"), "/noise_pb.rs"));
}

/// `Noise_XX_25519_ChaChaPoly_SHA256`, the one pattern this transport speaks.
const NOISE_PARAMS: &str = "Noise_XX_25519_ChaChaPoly_SHA256";

/// Domain-separation prefix signed over a connection's ephemeral Noise
/// static key to bind it to the signer's long-term identity (spec §4.5).
const STATIC_KEY_DOMAIN: &[u8] = b"noise-libp2p-static-key:";

#[derive(Debug, Error)]
pub enum NoiseError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("noise protocol error: {0}")]
    Noise(#[from] snow::Error),
    #[error("invalid protobuf encoding for NoiseHandshakePayload")]
    InvalidPayload(#[from] prost::DecodeError),
    #[error("remote handshake payload is missing its identity key")]
    MissingIdentityKey,
    #[error("remote identity key does not decode: {0}")]
    InvalidIdentityKey(libp2p_core::identity::DecodingError),
    #[error("remote identity signature does not verify over its noise static key")]
    BadSignature,
    #[error("noise frame exceeds the 65535-byte maximum")]
    FrameTooLong,
}

/// The Noise security transport, configured with this host's identity key
/// (used only to sign the per-connection ephemeral Noise static key, never
/// transmitted itself).
#[derive(Clone)]
pub struct NoiseConfig {
    pub local_id: LocalIdentity,
}

impl NoiseConfig {
    pub fn new(local_id: LocalIdentity) -> Self {
        NoiseConfig { local_id }
    }
}

impl UpgradeInfo for NoiseConfig {
    fn protocol_info(&self) -> Vec<String> {
        vec!["/noise".to_string()]
    }
}

impl<C> InboundUpgrade<C> for NoiseConfig
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Output = Authenticated<NoiseOutput<C>>;
    type Error = NoiseError;

    fn upgrade_inbound(self, socket: C, _protocol: String) -> BoxFuture<'static, Result<Self::Output, Self::Error>> {
        Box::pin(handshake::run(socket, self.local_id, handshake::Role::Responder))
    }
}

impl<C> OutboundUpgrade<C> for NoiseConfig
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Output = Authenticated<NoiseOutput<C>>;
    type Error = NoiseError;

    fn upgrade_outbound(self, socket: C, _protocol: String) -> BoxFuture<'static, Result<Self::Output, Self::Error>> {
        Box::pin(handshake::run(socket, self.local_id, handshake::Role::Initiator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future;
    use futures::io::{AsyncReadExt, AsyncWriteExt};
    use libp2p_core::identity::Keypair;

    /// An in-memory duplex pipe, the same shape used by the mplex and
    /// plaintext test suites in this workspace.
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
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &mut [u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            let mut src = self.read_from.borrow_mut();
            if src.is_empty() {
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
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[async_std::test]
    async fn handshake_then_encrypted_round_trip() {
        let alice_id = LocalIdentity::from_keypair(Keypair::generate_ed25519());
        let bob_id = LocalIdentity::from_keypair(Keypair::generate_ed25519());
        let alice_peer = alice_id.peer_id().clone();
        let bob_peer = bob_id.peer_id().clone();

        let (a, b) = pipe();
        let (alice_res, bob_res) = future::join(
            handshake::run(a, alice_id, handshake::Role::Initiator),
            handshake::run(b, bob_id, handshake::Role::Responder),
        )
        .await;

        let mut alice = alice_res.unwrap();
        let mut bob = bob_res.unwrap();
        assert_eq!(*alice.remote.peer_id(), bob_peer);
        assert_eq!(*bob.remote.peer_id(), alice_peer);

        let (write_res, read_buf) = future::join(alice.io.write_all(b"hello over noise"), async {
            let mut buf = [0u8; 17];
            bob.io.read_exact(&mut buf).await.unwrap();
            buf
        })
        .await;
        write_res.unwrap();
        assert_eq!(&read_buf, b"hello over noise");
    }
}
