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

//! Core types and traits shared by every crate in this workspace: identity
//! and key material, multiaddress helpers, the connection/muxing/transport
//! trait contracts, and the upgrade pipeline that composes them.

pub mod addr;
pub mod connection;
pub mod either;
pub mod error;
pub mod gater;
pub mod identities;
pub mod identity;
pub mod multihash;
pub mod muxing;
pub mod peer_id;
pub mod resource;
pub mod transport;
pub mod upgrade;
pub mod varint;

pub use connection::{ConnectedPoint, ConnectionId, Direction, ListenerId};
pub use error::TransportError;
pub use identities::{LocalIdentity, RemoteIdentity};
pub use identity::{Keypair, PublicKey};
pub use multiaddr::Multiaddr;
pub use peer_id::PeerId;
