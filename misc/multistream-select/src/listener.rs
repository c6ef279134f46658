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

/// Runs the listener role of multistream-select: read candidates one at a
/// time, echoing the first one found in `protocols`, replying `na` to
/// anything else, and answering `ls` with the supported set (spec §4.2
/// "Server (listener) role").
pub async fn listener_select_proto<T, I, P>(
    mut io: T,
    protocols: I,
) -> Result<(P, Negotiated<T>), NegotiationError>
where
    T: AsyncRead + AsyncWrite + Unpin,
    I: IntoIterator<Item = P> + Clone,
    P: AsRef<[u8]> + PartialEq,
{
    let client_hs = read_line(&mut io).await?;
    if client_hs != HANDSHAKE {
        return Err(NegotiationError::HandshakeMismatch);
    }
    write_line(&mut io, HANDSHAKE).await?;

    loop {
        let requested = read_line(&mut io).await?;
        if requested == b"ls" {
            write_ls_response(&mut io, protocols.clone()).await?;
            continue;
        }
        if let Some(matched) = protocols.clone().into_iter().find(|p| p.as_ref() == requested.as_slice()) {
            write_line(&mut io, matched.as_ref()).await?;
            return Ok((matched, Negotiated::new(io)));
        }
        write_line(&mut io, b"na").await?;
    }
}

/// Writes the `ls` diagnostic response: a single varint-prefixed block
/// containing `varint(count)` followed by each protocol as its own
/// varint-prefixed, newline-terminated line (spec §4.2).
async fn write_ls_response<T, I, P>(io: &mut T, protocols: I) -> Result<(), NegotiationError>
where
    T: AsyncWrite + Unpin,
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    use futures::io::AsyncWriteExt;

    let mut payload = Vec::new();
    let entries: Vec<P> = protocols.into_iter().collect();
    let mut count_buf = unsigned_varint::encode::usize_buffer();
    payload.extend_from_slice(unsigned_varint::encode::usize(entries.len(), &mut count_buf));
    for p in &entries {
        let mut len_buf = unsigned_varint::encode::usize_buffer();
        payload.extend_from_slice(unsigned_varint::encode::usize(p.as_ref().len() + 1, &mut len_buf));
        payload.extend_from_slice(p.as_ref());
        payload.push(b'\n');
    }
    let mut outer_len_buf = unsigned_varint::encode::usize_buffer();
    io.write_all(unsigned_varint::encode::usize(payload.len(), &mut outer_len_buf)).await?;
    io.write_all(&payload).await?;
    io.flush().await?;
    Ok(())
}
