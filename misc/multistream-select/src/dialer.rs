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

use crate::error::NegotiationError;
use crate::line::{read_line, write_line};
use crate::negotiated::Negotiated;
use crate::HANDSHAKE;
use futures::io::{AsyncRead, AsyncWrite};

/// Dials a single protocol: send the multistream handshake and the
/// candidate, then expect the same id echoed back.
///
/// On `na` fails with [`NegotiationError::ProtocolNotSupported`], per spec
/// §4.2 "Client (dialer) role — single candidate".
pub async fn dialer_select_proto<T, P>(
    mut io: T,
    protocol: P,
) -> Result<Negotiated<T>, NegotiationError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    P: AsRef<[u8]>,
{
    write_line(&mut io, HANDSHAKE).await?;
    let server_hs = read_line(&mut io).await?;
    if server_hs != HANDSHAKE {
        return Err(NegotiationError::HandshakeMismatch);
    }

    write_line(&mut io, protocol.as_ref()).await?;
    let reply = read_line(&mut io).await?;
    if reply == b"na" {
        return Err(NegotiationError::ProtocolNotSupported);
    }
    if reply != protocol.as_ref() {
        return Err(NegotiationError::ProtocolViolation("unexpected echo"));
    }
    Ok(Negotiated::new(io))
}

/// Dials a batch of candidates one at a time (spec §4.2 "Client — lazy/batch")
/// until the listener echoes one back, returning which protocol won.
pub async fn dialer_select_proto_lazy<T, I, P>(
    mut io: T,
    protocols: I,
) -> Result<(P, Negotiated<T>), NegotiationError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    write_line(&mut io, HANDSHAKE).await?;
    let server_hs = read_line(&mut io).await?;
    if server_hs != HANDSHAKE {
        return Err(NegotiationError::HandshakeMismatch);
    }

    for protocol in protocols {
        write_line(&mut io, protocol.as_ref()).await?;
        let reply = read_line(&mut io).await?;
        if reply == protocol.as_ref() {
            return Ok((protocol, Negotiated::new(io)));
        }
        if reply != b"na" {
            return Err(NegotiationError::ProtocolViolation("unexpected reply"));
        }
    }
    Err(NegotiationError::ProtocolNotSupported)
}
