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

use crate::codec::CodecError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MplexError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("remote reset stream {0}")]
    RemoteReset(u64),
    #[error("stream {0} was already reset or closed locally")]
    StreamClosed(u64),
    #[error("peer addressed a stream id that was never opened: {0}")]
    UnknownStream(u64),
    #[error("peer reused a stream id {0} that is still open")]
    StreamIdReuse(u64),
    #[error("the connection is shutting down")]
    Shutdown,
    #[error("remote exceeded the per-stream receive buffer without reading")]
    BufferTimeout(u64),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Clone for MplexError {
    fn clone(&self) -> Self {
        match self {
            MplexError::Codec(e) => MplexError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())),
            MplexError::RemoteReset(id) => MplexError::RemoteReset(*id),
            MplexError::StreamClosed(id) => MplexError::StreamClosed(*id),
            MplexError::UnknownStream(id) => MplexError::UnknownStream(*id),
            MplexError::StreamIdReuse(id) => MplexError::StreamIdReuse(*id),
            MplexError::Shutdown => MplexError::Shutdown,
            MplexError::BufferTimeout(id) => MplexError::BufferTimeout(*id),
            MplexError::Io(e) => MplexError::Io(io::Error::new(e.kind(), e.to_string())),
        }
    }
}
