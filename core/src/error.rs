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

//! The top-level error taxonomy every layer of this stack funnels into.
//! Concrete crates (transports, security, muxers) define their own
//! `thiserror` enums and convert them into one of these categories at the
//! boundary where a caller needs a stable, matchable error type.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("negotiation failed: {0}")]
    Negotiation(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("operation vetoed by connection gater: {0}")]
    Authorization(String),
    #[error("resource limit exceeded: {0}")]
    Resource(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid lifecycle transition: {0}")]
    Lifecycle(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn protocol(msg: impl fmt::Display) -> Self {
        TransportError::Protocol(msg.to_string())
    }
    pub fn negotiation(msg: impl fmt::Display) -> Self {
        TransportError::Negotiation(msg.to_string())
    }
    pub fn authentication(msg: impl fmt::Display) -> Self {
        TransportError::Authentication(msg.to_string())
    }
    pub fn authorization(msg: impl fmt::Display) -> Self {
        TransportError::Authorization(msg.to_string())
    }
    pub fn resource(msg: impl fmt::Display) -> Self {
        TransportError::Resource(msg.to_string())
    }
    pub fn not_found(msg: impl fmt::Display) -> Self {
        TransportError::NotFound(msg.to_string())
    }
    pub fn transport(msg: impl fmt::Display) -> Self {
        TransportError::Transport(msg.to_string())
    }
}
