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

//! The multistream-select line framing: `varint(len(payload)+1) ‖ payload ‖ '\n'`.

use crate::error::NegotiationError;
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum accepted line payload; guards against an adversarial peer
/// claiming an unbounded length prefix.
const MAX_LINE_LEN: usize = 64 * 1024;

/// Writes `payload ‖ '\n'`, length-prefixed, as one multistream-select line.
pub async fn write_line<W: AsyncWrite + Unpin>(io: &mut W, payload: &[u8]) -> Result<(), NegotiationError> {
    if payload.contains(&b'\n') {
        return Err(NegotiationError::ProtocolViolation("line payload must not contain '\\n'"));
    }
    let mut len_buf = unsigned_varint::encode::usize_buffer();
    let len_enc = unsigned_varint::encode::usize(payload.len() + 1, &mut len_buf);
    io.write_all(len_enc).await?;
    io.write_all(payload).await?;
    io.write_all(b"\n").await?;
    io.flush().await?;
    Ok(())
}

/// Reads one multistream-select line and returns its payload, without the
/// trailing `'\n'`.
pub async fn read_line<R: AsyncRead + Unpin>(io: &mut R) -> Result<Vec<u8>, NegotiationError> {
    let len = read_varint(io).await?;
    if len == 0 {
        return Err(NegotiationError::ProtocolViolation("zero-length line"));
    }
    if len > MAX_LINE_LEN {
        return Err(NegotiationError::ProtocolViolation("line exceeds maximum length"));
    }
    let mut buf = vec![0u8; len];
    io.read_exact(&mut buf).await?;
    if buf.pop() != Some(b'\n') {
        return Err(NegotiationError::ProtocolViolation("line not newline-terminated"));
    }
    Ok(buf)
}

/// Reads a raw unsigned varint, one byte at a time (no look-ahead, so no
/// bytes beyond the negotiation are ever consumed from `io`).
pub async fn read_varint<R: AsyncRead + Unpin>(io: &mut R) -> Result<usize, NegotiationError> {
    let mut buf = [0u8; 10];
    let mut i = 0;
    loop {
        if i >= buf.len() {
            return Err(NegotiationError::ProtocolViolation("varint too long"));
        }
        let mut byte = [0u8; 1];
        let n = io.read(&mut byte).await?;
        if n == 0 {
            return Err(NegotiationError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        buf[i] = byte[0];
        i += 1;
        if byte[0] & 0x80 == 0 {
            break;
        }
    }
    let (value, _) =
        unsigned_varint::decode::usize(&buf[..i]).map_err(|_| NegotiationError::ProtocolViolation("bad varint"))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[async_std::test]
    async fn round_trip() {
        let mut buf = Vec::new();
        write_line(&mut buf, b"/multistream/1.0.0").await.unwrap();
        let mut cursor = &buf[..];
        let line = read_line(&mut cursor).await.unwrap();
        assert_eq!(line, b"/multistream/1.0.0");
    }

    #[async_std::test]
    async fn rejects_embedded_newline() {
        let mut buf = Vec::new();
        let err = write_line(&mut buf, b"foo\nbar").await.unwrap_err();
        assert!(matches!(err, NegotiationError::ProtocolViolation(_)));
    }
}
