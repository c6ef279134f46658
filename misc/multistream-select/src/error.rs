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

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NegotiationError {
    /// None of the protocols offered by the dialer were supported.
    #[error("protocol negotiation failed: no supported protocol")]
    ProtocolNotSupported,
    /// The peer did not start with the expected `/multistream/1.0.0` line.
    #[error("multistream handshake mismatch")]
    HandshakeMismatch,
    /// A line violated the line-protocol framing rules.
    #[error("malformed multistream-select line: {0}")]
    ProtocolViolation(&'static str),
    /// Two rounds of simultaneous-open nonces both tied.
    #[error("simultaneous-open nonce comparison could not be resolved")]
    SimultaneousOpenTieUnresolved,
    #[error(transparent)]
    Io(#[from] io::Error),
}
