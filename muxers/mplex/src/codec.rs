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

//! The mplex frame wire format (spec §3/§4.3): `header = (stream_id << 3) |
//! tag`, a varint, followed by a varint-prefixed payload.

use bytes::Bytes;
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use std::io;
use thiserror::Error;

/// `NewStream` payloads above this size are a fatal protocol violation.
pub const MAX_NEW_STREAM_LEN: usize = 1024;
/// `Message` payloads above this size are a fatal protocol violation.
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    NewStream(Option<String>),
    Message(Bytes),
    Close,
    Reset,
}

/// A decoded mplex frame. `initiator` is the *sender's* perspective: true
/// iff the sender is the side that originally opened the addressed stream
/// (spec §3: "initiator frames address streams the sender originated").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub stream_id: u64,
    pub initiator: bool,
    pub body: FrameBody,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("mplex NewStream payload of {0} bytes exceeds the {1}-byte limit")]
    NewStreamTooLarge(usize, usize),
    #[error("mplex Message payload of {0} bytes exceeds the {1}-byte limit")]
    MessageTooLarge(usize, usize),
    #[error("mplex frame carries an unknown tag {0}")]
    UnknownTag(u64),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub(crate) fn tag_of(body: &FrameBody, initiator: bool) -> u64 {
    match (body, initiator) {
        (FrameBody::NewStream(_), _) => 0,
        (FrameBody::Message(_), false) => 1,
        (FrameBody::Message(_), true) => 2,
        (FrameBody::Close, false) => 3,
        (FrameBody::Close, true) => 4,
        (FrameBody::Reset, false) => 5,
        (FrameBody::Reset, true) => 6,
    }
}

pub(crate) fn payload_bytes(body: &FrameBody) -> Vec<u8> {
    match body {
        FrameBody::NewStream(name) => name.as_ref().map(|n| n.as_bytes().to_vec()).unwrap_or_default(),
        FrameBody::Message(b) => b.to_vec(),
        FrameBody::Close | FrameBody::Reset => Vec::new(),
    }
}

/// Serializes `frame` to its on-the-wire bytes without performing any I/O.
/// Shared by the async [`write_frame`] helper (used in tests) and the
/// poll-based connection driver that actually owns the socket.
pub(crate) fn serialize_frame(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    let tag = tag_of(&frame.body, frame.initiator);
    let header = (frame.stream_id << 3) | tag;
    let payload = payload_bytes(&frame.body);

    if matches!(frame.body, FrameBody::NewStream(_)) && payload.len() > MAX_NEW_STREAM_LEN {
        return Err(CodecError::NewStreamTooLarge(payload.len(), MAX_NEW_STREAM_LEN));
    }
    if matches!(frame.body, FrameBody::Message(_)) && payload.len() > MAX_MESSAGE_LEN {
        return Err(CodecError::MessageTooLarge(payload.len(), MAX_MESSAGE_LEN));
    }

    let mut out = Vec::with_capacity(payload.len() + 10);
    let mut hdr_buf = unsigned_varint::encode::u64_buffer();
    out.extend_from_slice(unsigned_varint::encode::u64(header, &mut hdr_buf));
    let mut len_buf = unsigned_varint::encode::usize_buffer();
    out.extend_from_slice(unsigned_varint::encode::usize(payload.len(), &mut len_buf));
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Encodes `frame` onto the wire.
pub async fn write_frame<W: AsyncWrite + Unpin>(io: &mut W, frame: &Frame) -> Result<(), CodecError> {
    let bytes = serialize_frame(frame)?;
    io.write_all(&bytes).await?;
    io.flush().await?;
    Ok(())
}

/// Reads one raw varint, one byte at a time, to avoid over-reading past a
/// frame boundary.
async fn read_raw_varint<R: AsyncRead + Unpin>(io: &mut R) -> Result<u64, CodecError> {
    let mut buf = [0u8; 10];
    let mut i = 0;
    loop {
        let mut byte = [0u8; 1];
        let n = io.read(&mut byte).await?;
        if n == 0 {
            return Err(CodecError::Io(io::ErrorKind::UnexpectedEof.into()));
        }
        buf[i] = byte[0];
        i += 1;
        if byte[0] & 0x80 == 0 {
            break;
        }
    }
    let (v, _) = unsigned_varint::decode::u64(&buf[..i])
        .map_err(|_| CodecError::Io(io::Error::new(io::ErrorKind::InvalidData, "bad varint")))?;
    Ok(v)
}

/// Decodes one frame from the wire.
pub async fn read_frame<R: AsyncRead + Unpin>(io: &mut R) -> Result<Frame, CodecError> {
    let header = read_raw_varint(io).await?;
    let tag = header & 0x7;
    let stream_id = header >> 3;
    let initiator = tag % 2 == 0;

    let len = read_raw_varint(io).await? as usize;
    let body = match tag {
        0 => {
            if len > MAX_NEW_STREAM_LEN {
                return Err(CodecError::NewStreamTooLarge(len, MAX_NEW_STREAM_LEN));
            }
            let mut buf = vec![0u8; len];
            io.read_exact(&mut buf).await?;
            let name = if buf.is_empty() { None } else { Some(String::from_utf8_lossy(&buf).into_owned()) };
            FrameBody::NewStream(name)
        }
        1 | 2 => {
            if len > MAX_MESSAGE_LEN {
                return Err(CodecError::MessageTooLarge(len, MAX_MESSAGE_LEN));
            }
            let mut buf = vec![0u8; len];
            io.read_exact(&mut buf).await?;
            FrameBody::Message(Bytes::from(buf))
        }
        3 | 4 => {
            let mut buf = vec![0u8; len];
            io.read_exact(&mut buf).await?;
            FrameBody::Close
        }
        5 | 6 => {
            let mut buf = vec![0u8; len];
            io.read_exact(&mut buf).await?;
            FrameBody::Reset
        }
        other => return Err(CodecError::UnknownTag(other)),
    };

    Ok(Frame { stream_id, initiator, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    async fn round_trip(frame: Frame) -> Frame {
        let mut buf = Vec::new();
        write_frame(&mut buf, &frame).await.unwrap();
        let mut cursor = &buf[..];
        read_frame(&mut cursor).await.unwrap()
    }

    #[async_std::test]
    async fn round_trips_each_tag() {
        // NewStream has a single tag (0) regardless of direction: the wire
        // format only ever sees it sent by whichever side opened the stream,
        // so it round-trips as `initiator = true` and has no `false` case.
        let directional_bodies = vec![FrameBody::Message(Bytes::from_static(b"hello")), FrameBody::Close, FrameBody::Reset];
        for body in directional_bodies {
            for initiator in [true, false] {
                let frame = Frame { stream_id: 42, initiator, body: body.clone() };
                let got = round_trip(frame.clone()).await;
                assert_eq!(got, frame);
            }
        }
        for body in [FrameBody::NewStream(Some("chat".into())), FrameBody::NewStream(None)] {
            let frame = Frame { stream_id: 42, initiator: true, body };
            let got = round_trip(frame.clone()).await;
            assert_eq!(got, frame);
        }
    }

    #[async_std::test]
    async fn rejects_oversize_message() {
        let huge = Bytes::from(vec![0u8; MAX_MESSAGE_LEN + 1]);
        let frame = Frame { stream_id: 1, initiator: true, body: FrameBody::Message(huge) };
        let mut buf = Vec::new();
        assert!(matches!(write_frame(&mut buf, &frame).await, Err(CodecError::MessageTooLarge(_, _))));
    }

    #[async_std::test]
    async fn rejects_oversize_new_stream_name() {
        let huge = "x".repeat(MAX_NEW_STREAM_LEN + 1);
        let frame = Frame { stream_id: 1, initiator: true, body: FrameBody::NewStream(Some(huge)) };
        let mut buf = Vec::new();
        assert!(matches!(write_frame(&mut buf, &frame).await, Err(CodecError::NewStreamTooLarge(_, _))));
    }

    quickcheck! {
        fn fuzz_message_frames(stream_id: u64, initiator: bool, payload: Vec<u8>) -> bool {
            let stream_id = stream_id & ((1u64 << 60) - 1);
            let payload = if payload.len() > 1024 { payload[..1024].to_vec() } else { payload };
            let frame = Frame { stream_id, initiator, body: FrameBody::Message(Bytes::from(payload)) };
            async_std::task::block_on(async {
                round_trip(frame.clone()).await == frame
            })
        }
    }
}
