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

//! The identify example protocol (spec §4.13): on open, each side sends a
//! length-prefixed `Identify` protobuf describing itself, and
//! `/ipfs/id/push/1.0.0` re-sends that payload unsolicited when local state
//! changes. Applying the received [`IdentifyInfo`] to a host's Peerstore is
//! left to the caller, which is why this crate does not depend on `swarm`.

use futures::future;
use futures::future::BoxFuture;
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use libp2p_core::identity::PublicKey;
use libp2p_core::upgrade::{InboundUpgrade, OutboundUpgrade, UpgradeInfo};
use libp2p_core::Multiaddr;
use prost::Message as _;
use std::convert::TryFrom;
use thiserror::Error;

mod proto {
    include!(concat!(env!("OUT_DIR"), "/identify_pb.rs"));
}

/// The protocol identifier for the request/response identify exchange.
pub const PROTOCOL_ID: &str = "/ipfs/id/1.0.0";
/// The protocol identifier for unsolicited identify pushes.
pub const PUSH_PROTOCOL_ID: &str = "/ipfs/id/push/1.0.0";

const MAX_MESSAGE_LEN: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum IdentifyError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid protobuf encoding for Identify")]
    InvalidMessage(#[from] prost::DecodeError),
    #[error("Identify message missing required field {0:?}")]
    MissingField(&'static str),
    #[error("remote public key does not decode: {0}")]
    InvalidPublicKey(libp2p_core::identity::DecodingError),
    #[error("a listen or observed multiaddress does not decode")]
    InvalidMultiaddr,
    #[error("Identify message length {0} exceeds the maximum of {1} bytes")]
    MessageTooLong(usize, usize),
}

/// Everything one side of an identify exchange learns about the other.
#[derive(Debug, Clone)]
pub struct IdentifyInfo {
    pub public_key: PublicKey,
    pub protocol_version: String,
    pub agent_version: String,
    pub listen_addrs: Vec<Multiaddr>,
    pub observed_addr: Option<Multiaddr>,
    pub protocols: Vec<String>,
    pub signed_peer_record: Option<Vec<u8>>,
}

impl IdentifyInfo {
    fn into_message(self) -> proto::Identify {
        proto::Identify {
            protocol_version: Some(self.protocol_version),
            agent_version: Some(self.agent_version),
            public_key: Some(self.public_key.into_protobuf_encoding()),
            listen_addrs: self.listen_addrs.into_iter().map(Vec::from).collect(),
            observed_addr: self.observed_addr.map(Vec::from),
            protocols: self.protocols,
            signed_peer_record: self.signed_peer_record,
        }
    }

    fn from_message(msg: proto::Identify) -> Result<Self, IdentifyError> {
        let public_key_bytes = msg.public_key.ok_or(IdentifyError::MissingField("publicKey"))?;
        let public_key = PublicKey::from_protobuf_encoding(&public_key_bytes).map_err(IdentifyError::InvalidPublicKey)?;
        let listen_addrs = msg
            .listen_addrs
            .into_iter()
            .map(|bytes| Multiaddr::try_from(bytes).map_err(|_| IdentifyError::InvalidMultiaddr))
            .collect::<Result<Vec<_>, _>>()?;
        let observed_addr = msg
            .observed_addr
            .map(|bytes| Multiaddr::try_from(bytes).map_err(|_| IdentifyError::InvalidMultiaddr))
            .transpose()?;
        Ok(IdentifyInfo {
            public_key,
            protocol_version: msg.protocol_version.unwrap_or_default(),
            agent_version: msg.agent_version.unwrap_or_default(),
            listen_addrs,
            observed_addr,
            protocols: msg.protocols,
            signed_peer_record: msg.signed_peer_record,
        })
    }
}

/// The identify request/response upgrade: the dialer and the listener both
/// send their own [`IdentifyInfo`] and both learn the other's.
#[derive(Clone)]
pub struct IdentifyConfig {
    pub local_info: IdentifyInfo,
}

impl IdentifyConfig {
    pub fn new(local_info: IdentifyInfo) -> Self {
        IdentifyConfig { local_info }
    }
}

impl UpgradeInfo for IdentifyConfig {
    fn protocol_info(&self) -> Vec<String> {
        vec![PROTOCOL_ID.to_string()]
    }
}

impl<C> InboundUpgrade<C> for IdentifyConfig
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Output = IdentifyInfo;
    type Error = IdentifyError;

    fn upgrade_inbound(self, socket: C, _protocol: String) -> BoxFuture<'static, Result<Self::Output, Self::Error>> {
        Box::pin(exchange(socket, self.local_info))
    }
}

impl<C> OutboundUpgrade<C> for IdentifyConfig
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Output = IdentifyInfo;
    type Error = IdentifyError;

    fn upgrade_outbound(self, socket: C, _protocol: String) -> BoxFuture<'static, Result<Self::Output, Self::Error>> {
        Box::pin(exchange(socket, self.local_info))
    }
}

/// Sends `local_info` and reads the remote's, concurrently (write-then-read
/// can deadlock if a peer's message is larger than the transport's buffer).
async fn exchange<C>(socket: C, local_info: IdentifyInfo) -> Result<IdentifyInfo, IdentifyError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let message = local_info.into_message();
    let mut bytes = Vec::with_capacity(message.encoded_len());
    message.encode(&mut bytes).expect("Vec<u8> provides sufficient capacity");

    let (mut reader, mut writer) = socket.split();
    let (read_result, write_result) = future::join(read_message(&mut reader), write_message(&mut writer, &bytes)).await;
    write_result?;
    let remote_message = read_result?;
    drop(reader.reunite(writer));

    let info = IdentifyInfo::from_message(remote_message)?;
    log::debug!(
        "identify exchange complete: agent_version={:?} protocols={:?}",
        info.agent_version,
        info.protocols
    );
    Ok(info)
}

/// Sends an unsolicited identify push: just the message, no response read.
pub async fn push<W: AsyncWrite + Unpin>(writer: &mut W, local_info: IdentifyInfo) -> Result<(), IdentifyError> {
    let message = local_info.into_message();
    let mut bytes = Vec::with_capacity(message.encoded_len());
    message.encode(&mut bytes).expect("Vec<u8> provides sufficient capacity");
    write_message(writer, &bytes).await
}

/// Reads one pushed identify message from an inbound `/ipfs/id/push/1.0.0`
/// stream.
pub async fn recv_push<R: AsyncRead + Unpin>(reader: &mut R) -> Result<IdentifyInfo, IdentifyError> {
    let message = read_message(reader).await?;
    IdentifyInfo::from_message(message)
}

async fn write_message<W: AsyncWrite + Unpin>(io: &mut W, bytes: &[u8]) -> Result<(), IdentifyError> {
    let mut len_buf = unsigned_varint::encode::usize_buffer();
    let len_enc = unsigned_varint::encode::usize(bytes.len(), &mut len_buf);
    io.write_all(len_enc).await?;
    io.write_all(bytes).await?;
    io.flush().await?;
    Ok(())
}

async fn read_message<R: AsyncRead + Unpin>(io: &mut R) -> Result<proto::Identify, IdentifyError> {
    let len = read_varint_len(io).await?;
    if len > MAX_MESSAGE_LEN {
        return Err(IdentifyError::MessageTooLong(len, MAX_MESSAGE_LEN));
    }
    let mut buf = vec![0u8; len];
    io.read_exact(&mut buf).await?;
    proto::Identify::decode(&buf[..]).map_err(IdentifyError::from)
}

async fn read_varint_len<R: AsyncRead + Unpin>(io: &mut R) -> Result<usize, IdentifyError> {
    let mut buf = [0u8; 10];
    let mut i = 0;
    loop {
        if i >= buf.len() {
            return Err(IdentifyError::MessageTooLong(usize::MAX, MAX_MESSAGE_LEN));
        }
        let mut byte = [0u8; 1];
        let n = io.read(&mut byte).await?;
        if n == 0 {
            return Err(IdentifyError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        buf[i] = byte[0];
        i += 1;
        if byte[0] & 0x80 == 0 {
            break;
        }
    }
    let (value, _) =
        unsigned_varint::decode::usize(&buf[..i]).map_err(|_| IdentifyError::MessageTooLong(0, MAX_MESSAGE_LEN))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p_core::identity::Keypair;

    /// An in-memory duplex pipe, the same shape used across this workspace's
    /// security-transport test suites.
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

    fn sample_info(agent: &str) -> IdentifyInfo {
        IdentifyInfo {
            public_key: Keypair::generate_ed25519().public(),
            protocol_version: "ipfs/0.1.0".to_string(),
            agent_version: agent.to_string(),
            listen_addrs: vec!["/ip4/127.0.0.1/tcp/4001".parse().unwrap()],
            observed_addr: Some("/ip4/1.2.3.4/tcp/9999".parse().unwrap()),
            protocols: vec!["/ipfs/id/1.0.0".to_string(), "/ipfs/ping/1.0.0".to_string()],
            signed_peer_record: None,
        }
    }

    #[async_std::test]
    async fn exchange_round_trips_both_sides() {
        let alice_info = sample_info("alice/0.1.0");
        let bob_info = sample_info("bob/0.1.0");

        let (a, b) = pipe();
        let (alice_res, bob_res) = future::join(exchange(a, alice_info), exchange(b, bob_info)).await;

        let alice_learned = alice_res.unwrap();
        let bob_learned = bob_res.unwrap();
        assert_eq!(alice_learned.agent_version, "bob/0.1.0");
        assert_eq!(bob_learned.agent_version, "alice/0.1.0");
        assert_eq!(alice_learned.protocols, vec!["/ipfs/id/1.0.0", "/ipfs/ping/1.0.0"]);
    }

    #[async_std::test]
    async fn push_delivers_unsolicited_update() {
        let pushed = sample_info("alice/0.2.0");
        let (mut a, mut b) = pipe();
        let (push_res, recv_res) = future::join(push(&mut a, pushed), recv_push(&mut b)).await;
        push_res.unwrap();
        let received = recv_res.unwrap();
        assert_eq!(received.agent_version, "alice/0.2.0");
    }
}
