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

//! Runs the three-message Noise XX pattern over a raw duplex stream,
//! exchanging signed identity payloads on messages 2 and 3, then hands back
//! an [`Authenticated`] wrapper around the post-handshake transport state.

use crate::io::NoiseOutput;
use crate::proto;
use crate::{NoiseError, NOISE_PARAMS, STATIC_KEY_DOMAIN};
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use libp2p_core::identities::{LocalIdentity, RemoteIdentity};
use libp2p_core::identity::PublicKey;
use libp2p_core::transport::upgrade::Authenticated;
use prost::Message as _;
use std::convert::TryFrom;

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Initiator,
    Responder,
}

pub(crate) async fn run<C>(
    mut socket: C,
    local_id: LocalIdentity,
    role: Role,
) -> Result<Authenticated<NoiseOutput<C>>, NoiseError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let keypair = snow::Builder::new(NOISE_PARAMS.parse().unwrap()).generate_keypair()?;

    let mut to_sign = Vec::with_capacity(STATIC_KEY_DOMAIN.len() + keypair.public.len());
    to_sign.extend_from_slice(STATIC_KEY_DOMAIN);
    to_sign.extend_from_slice(&keypair.public);
    let local_payload = proto::NoiseHandshakePayload {
        identity_key: Some(local_id.public_key().into_protobuf_encoding()),
        identity_sig: Some(local_id.keypair().sign(&to_sign)),
        data: None,
    };
    let mut local_payload_bytes = Vec::with_capacity(local_payload.encoded_len());
    local_payload
        .encode(&mut local_payload_bytes)
        .expect("Vec<u8> provides sufficient capacity");

    let builder = snow::Builder::new(NOISE_PARAMS.parse().unwrap()).local_private_key(&keypair.private);
    let mut session = match role {
        Role::Initiator => builder.build_initiator()?,
        Role::Responder => builder.build_responder()?,
    };

    let mut remote_static: Option<Vec<u8>> = None;
    let mut remote_payload_bytes: Option<Vec<u8>> = None;

    match role {
        Role::Initiator => {
            // -> e
            send_frame(&mut socket, &mut session, &[]).await?;
            // <- e, ee, s, es, payload
            let msg2 = recv_frame(&mut socket, &mut session).await?;
            remote_static = session.get_remote_static().map(|k| k.to_vec());
            remote_payload_bytes = Some(msg2);
            // -> s, se, payload
            send_frame(&mut socket, &mut session, &local_payload_bytes).await?;
        }
        Role::Responder => {
            // <- e
            let _ = recv_frame(&mut socket, &mut session).await?;
            // -> e, ee, s, es, payload
            send_frame(&mut socket, &mut session, &local_payload_bytes).await?;
            // <- s, se, payload
            let msg3 = recv_frame(&mut socket, &mut session).await?;
            remote_static = session.get_remote_static().map(|k| k.to_vec());
            remote_payload_bytes = Some(msg3);
        }
    }

    let remote_static = remote_static.expect("remote static key is known once both sides have sent s");
    let remote_payload_bytes = remote_payload_bytes.expect("payload collected above for both roles");
    let remote_payload = proto::NoiseHandshakePayload::decode(&remote_payload_bytes[..])?;

    let remote_identity_key_bytes = remote_payload.identity_key.ok_or(NoiseError::MissingIdentityKey)?;
    let remote_identity_sig = remote_payload.identity_sig.ok_or(NoiseError::MissingIdentityKey)?;
    let remote_public_key =
        PublicKey::from_protobuf_encoding(&remote_identity_key_bytes).map_err(NoiseError::InvalidIdentityKey)?;

    let mut expected_sig_msg = Vec::with_capacity(STATIC_KEY_DOMAIN.len() + remote_static.len());
    expected_sig_msg.extend_from_slice(STATIC_KEY_DOMAIN);
    expected_sig_msg.extend_from_slice(&remote_static);
    if !remote_public_key.verify(&expected_sig_msg, &remote_identity_sig) {
        return Err(NoiseError::BadSignature);
    }

    let transport = session.into_transport_mode()?;
    let remote = RemoteIdentity::from_public_key(remote_public_key);
    log::debug!("noise handshake with {} complete", remote.peer_id());

    Ok(Authenticated {
        remote,
        io: NoiseOutput::new(socket, transport),
    })
}

/// Writes one handshake message: `payload` embedded (and, from message 2
/// onward, encrypted) by `snow`, framed as `u16-be(len) || ciphertext`.
async fn send_frame<C: AsyncWrite + Unpin>(
    socket: &mut C,
    session: &mut snow::HandshakeState,
    payload: &[u8],
) -> Result<(), NoiseError> {
    let mut buf = vec![0u8; 65535];
    let len = session.write_message(payload, &mut buf)?;
    let len_u16 = u16::try_from(len).map_err(|_| NoiseError::FrameTooLong)?;
    socket.write_all(&len_u16.to_be_bytes()).await?;
    socket.write_all(&buf[..len]).await?;
    socket.flush().await?;
    Ok(())
}

/// Reads one handshake message and returns the decrypted payload it carried.
async fn recv_frame<C: AsyncRead + Unpin>(
    socket: &mut C,
    session: &mut snow::HandshakeState,
) -> Result<Vec<u8>, NoiseError> {
    let mut len_buf = [0u8; 2];
    socket.read_exact(&mut len_buf).await?;
    let len = u16::from_be_bytes(len_buf) as usize;
    let mut frame = vec![0u8; len];
    socket.read_exact(&mut frame).await?;
    let mut payload = vec![0u8; len];
    let payload_len = session.read_message(&frame, &mut payload)?;
    payload.truncate(payload_len);
    Ok(payload)
}
