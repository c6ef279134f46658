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

//! Unsigned LEB128 varint encoding, shared by the multistream-select line
//! protocol and the mplex frame codec.

use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use std::io;
use thiserror::Error;

/// Maximum number of bytes a 64-bit varint can occupy (`ceil(64 / 7)`).
const MAX_VARINT_BYTES: usize = 10;

#[derive(Debug, Error)]
pub enum VarintError {
    #[error("varint is longer than the maximum of 10 bytes")]
    Overflow,
    #[error("stream ended before a complete varint was read")]
    Truncated,
    #[error("varint encoding is not canonical (trailing zero byte)")]
    NotCanonical,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Encodes `value` as an unsigned LEB128 varint.
pub fn encode(mut value: u64) -> smallvec::SmallVec<[u8; MAX_VARINT_BYTES]> {
    let mut out = smallvec::SmallVec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
    out
}

/// Decodes an unsigned LEB128 varint from the front of `buf`, returning the
/// value and the number of bytes consumed.
pub fn decode(buf: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_VARINT_BYTES {
            return Err(VarintError::Overflow);
        }
        let low7 = (byte & 0x7f) as u64;
        value |= low7 << (7 * i);
        if byte & 0x80 == 0 {
            // Last byte. Reject non-canonical zero-padding: a final byte of
            // zero is only valid when it encodes the value 0 itself.
            if byte == 0 && i != 0 {
                return Err(VarintError::NotCanonical);
            }
            return Ok((value, i + 1));
        }
    }
    Err(VarintError::Truncated)
}

/// Reads one varint from an async byte stream, one byte at a time.
pub async fn read_varint<R: AsyncRead + Unpin>(io: &mut R) -> Result<u64, VarintError> {
    let mut value: u64 = 0;
    let mut byte = [0u8; 1];
    for i in 0..MAX_VARINT_BYTES {
        let n = io.read(&mut byte).await?;
        if n == 0 {
            return Err(VarintError::Truncated);
        }
        let low7 = (byte[0] & 0x7f) as u64;
        value |= low7 << (7 * i);
        if byte[0] & 0x80 == 0 {
            if byte[0] == 0 && i != 0 {
                return Err(VarintError::NotCanonical);
            }
            return Ok(value);
        }
    }
    Err(VarintError::Overflow)
}

/// Writes one varint to an async byte stream.
pub async fn write_varint<W: AsyncWrite + Unpin>(io: &mut W, value: u64) -> Result<(), VarintError> {
    let bytes = encode(value);
    io.write_all(&bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    quickcheck! {
        fn round_trip(v: u64) -> bool {
            let enc = encode(v);
            let (dec, consumed) = decode(&enc).unwrap();
            dec == v && consumed == enc.len()
        }
    }

    #[test]
    fn truncated_stream_fails() {
        // Continuation bit set, then the stream ends.
        let buf = [0x80u8];
        assert!(matches!(decode(&buf), Err(VarintError::Truncated)));
    }

    #[test]
    fn overflow_fails() {
        let buf = [0x80u8; 11];
        assert!(matches!(decode(&buf), Err(VarintError::Overflow)));
    }

    #[test]
    fn non_canonical_trailing_zero_rejected() {
        // 0x00 0x00: second byte has high bit clear but is a redundant zero byte.
        let buf = [0x80u8, 0x00];
        assert!(matches!(decode(&buf), Err(VarintError::NotCanonical)));
    }

    #[async_std::test]
    async fn async_round_trip() {
        for v in [0u64, 1, 127, 128, 16384, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(&mut buf, v).await.unwrap();
            let mut cursor = &buf[..];
            let got = read_varint(&mut cursor).await.unwrap();
            assert_eq!(got, v);
        }
    }
}
