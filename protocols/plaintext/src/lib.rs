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

//! The Plaintext/2.0.0 security transport (spec §4.5): no encryption, just
//! an exchange of `Exchange{id, pubkey}` protobufs so both sides learn and
//! verify each other's `PeerId`. Exists for tests and for transports that
//! already provide confidentiality out of band; never select this over
//! Noise on an untrusted network.

use futures::future;
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use futures::future::BoxFuture;
use libp2p_core::identities::{LocalIdentity, RemoteIdentity};
use libp2p_core::identity::PublicKey;
use libp2p_core::peer_id::PeerId;
use libp2p_core::transport::upgrade::Authenticated;
use libp2p_core::upgrade::{InboundUpgrade, OutboundUpgrade, UpgradeInfo};
use prost::Message as _;
use thiserror::Error;

/// Generated from `plaintext.proto`.
mod proto {
    include!(concat!(env!("OUT_DIR"), "/plaintext_pb.rs"));
}

const MAX_EXCHANGE_LEN: usize = 4096;

#[derive(Debug, Error)]
pub enum PlaintextError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid protobuf encoding for Exchange")]
    InvalidExchange(#[from] prost::DecodeError),
    #[error("Exchange missing required field {0:?}")]
    MissingField(&'static str),
    #[error("remote public key does not decode: {0}")]
    InvalidPublicKey(libp2p_core::identity::DecodingError),
    #[error("remote-advertised peer id does not match its public key")]
    PeerIdMismatch,
    #[error("Exchange length {0} exceeds the maximum of 4096 bytes")]
    ExchangeTooLong(usize),
}

/// The Plaintext/2.0.0 security transport, configured with this host's
/// identity so it can assemble and sign (well, simply attach) its half of
/// the `Exchange`.
#[derive(Clone)]
pub struct PlainText2Config {
    pub local_id: LocalIdentity,
}

impl PlainText2Config {
    pub fn new(local_id: LocalIdentity) -> Self {
        PlainText2Config { local_id }
    }
}

impl UpgradeInfo for PlainText2Config {
    fn protocol_info(&self) -> Vec<String> {
        vec!["/plaintext/2.0.0".to_string()]
    }
}

impl<C> InboundUpgrade<C> for PlainText2Config
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Output = Authenticated<C>;
    type Error = PlaintextError;

    fn upgrade_inbound(self, socket: C, _protocol: String) -> BoxFuture<'static, Result<Self::Output, Self::Error>> {
        Box::pin(handshake(socket, self.local_id))
    }
}

impl<C> OutboundUpgrade<C> for PlainText2Config
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Output = Authenticated<C>;
    type Error = PlaintextError;

    fn upgrade_outbound(self, socket: C, _protocol: String) -> BoxFuture<'static, Result<Self::Output, Self::Error>> {
        Box::pin(handshake(socket, self.local_id))
    }
}

/// Runs the symmetric Plaintext/2.0.0 exchange: write our `Exchange`, read
/// theirs, concurrently (a sequential write-then-read risks deadlock if a
/// peer's outbound buffer fills before the reader drains it; `join` avoids
/// relying on that).
async fn handshake<C>(socket: C, local_id: LocalIdentity) -> Result<Authenticated<C>, PlaintextError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let local_exchange = proto::Exchange {
        id: Some(local_id.peer_id().to_bytes()),
        pubkey: Some(local_id.public_key().into_protobuf_encoding()),
    };
    let mut local_bytes = Vec::with_capacity(local_exchange.encoded_len());
    local_exchange
        .encode(&mut local_bytes)
        .expect("Vec<u8> provides sufficient capacity");

    // The read and write halves are driven concurrently, not sequentially:
    // a write-then-read ordering can deadlock if a peer's exchange is larger
    // than the transport's buffer and it blocks writing before we start
    // reading.
    let (mut reader, mut writer) = socket.split();
    let (read_result, write_result) =
        future::join(read_exchange(&mut reader), write_exchange(&mut writer, &local_bytes)).await;
    write_result?;
    let remote_exchange = read_result?;
    let socket = match reader.reunite(writer) {
        Ok(socket) => socket,
        Err(_) => unreachable!("a split pair always reunites with its own half"),
    };

    let remote_id_bytes = remote_exchange.id.ok_or(PlaintextError::MissingField("id"))?;
    let remote_pubkey_bytes = remote_exchange.pubkey.ok_or(PlaintextError::MissingField("pubkey"))?;

    let remote_public_key =
        PublicKey::from_protobuf_encoding(&remote_pubkey_bytes).map_err(PlaintextError::InvalidPublicKey)?;
    let claimed_peer_id = PeerId::from_bytes(&remote_id_bytes).map_err(|_| PlaintextError::PeerIdMismatch)?;
    if !claimed_peer_id.matches_public_key(&remote_public_key) {
        return Err(PlaintextError::PeerIdMismatch);
    }

    let remote = RemoteIdentity::from_public_key(remote_public_key);
    log::debug!("plaintext handshake with {} complete", remote.peer_id());
    Ok(Authenticated { remote, io: socket })
}

async fn write_exchange<W: AsyncWrite + Unpin>(io: &mut W, bytes: &[u8]) -> Result<(), PlaintextError> {
    let mut len_buf = unsigned_varint::encode::usize_buffer();
    let len_enc = unsigned_varint::encode::usize(bytes.len(), &mut len_buf);
    io.write_all(len_enc).await?;
    io.write_all(bytes).await?;
    io.flush().await?;
    Ok(())
}

async fn read_exchange<R: AsyncRead + Unpin>(io: &mut R) -> Result<proto::Exchange, PlaintextError> {
    let len = read_varint_len(io).await?;
    if len > MAX_EXCHANGE_LEN {
        return Err(PlaintextError::ExchangeTooLong(len));
    }
    let mut buf = vec![0u8; len];
    io.read_exact(&mut buf).await?;
    proto::Exchange::decode(&buf[..]).map_err(PlaintextError::from)
}

async fn read_varint_len<R: AsyncRead + Unpin>(io: &mut R) -> Result<usize, PlaintextError> {
    let mut buf = [0u8; 10];
    let mut i = 0;
    loop {
        if i >= buf.len() {
            return Err(PlaintextError::ExchangeTooLong(usize::MAX));
        }
        let mut byte = [0u8; 1];
        let n = io.read(&mut byte).await?;
        if n == 0 {
            return Err(PlaintextError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        buf[i] = byte[0];
        i += 1;
        if byte[0] & 0x80 == 0 {
            break;
        }
    }
    let (value, _) = unsigned_varint::decode::usize(&buf[..i]).map_err(|_| PlaintextError::ExchangeTooLong(0))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p_core::identity::Keypair;

    /// An in-memory duplex pipe, the same shape used by the mplex test suite
    /// in this workspace.
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
    async fn handshake_succeeds_and_verifies_peer_ids() {
        let alice_id = LocalIdentity::from_keypair(Keypair::generate_ed25519());
        let bob_id = LocalIdentity::from_keypair(Keypair::generate_ed25519());
        let alice_peer = alice_id.peer_id().clone();
        let bob_peer = bob_id.peer_id().clone();

        let (a, b) = pipe();
        let (alice_res, bob_res) = future::join(handshake(a, alice_id), handshake(b, bob_id)).await;

        let alice_auth = alice_res.unwrap();
        let bob_auth = bob_res.unwrap();
        assert_eq!(*alice_auth.remote.peer_id(), bob_peer);
        assert_eq!(*bob_auth.remote.peer_id(), alice_peer);
    }

    #[async_std::test]
    async fn rejects_mismatched_peer_id() {
        let real_id = LocalIdentity::from_keypair(Keypair::generate_ed25519());
        let impostor_peer_id = LocalIdentity::from_keypair(Keypair::generate_ed25519()).peer_id().clone();

        let forged = proto::Exchange {
            id: Some(impostor_peer_id.to_bytes()),
            pubkey: Some(real_id.public_key().into_protobuf_encoding()),
        };
        let mut forged_bytes = Vec::new();
        forged.encode(&mut forged_bytes).unwrap();

        let (mut a, b) = pipe();
        let honest_id = LocalIdentity::from_keypair(Keypair::generate_ed25519());
        let honest = async { handshake(b, honest_id).await };
        let forge = async {
            write_exchange(&mut a, &forged_bytes).await.unwrap();
            // Drain whatever the honest side sent so it doesn't block forever.
            let mut sink = [0u8; 4096];
            let _ = a.read(&mut sink).await;
        };
        let (honest_res, _) = future::join(honest, forge).await;
        assert!(matches!(honest_res, Err(PlaintextError::PeerIdMismatch)));
    }
}
