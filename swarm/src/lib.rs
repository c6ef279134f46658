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

//! The libp2p swarm: everything a running node needs above the bare
//! transport/security/muxer stack in `libp2p-core` — the Peerstore, the
//! event bus, the connection registry, the dial coordinator and the Host
//! that ties them together behind a `ProtocolId -> StreamHandler` table.

pub mod dial;
pub mod event;
pub mod host;
pub mod listener;
pub mod peerstore;
pub mod record;
pub mod registry;

pub use dial::{DialConfig, DialCoordinator};
pub use event::{Connectedness, Event, EventBus, EventSubscription, Reachability};
pub use host::{Host, StreamHandler};
pub use listener::ListenerManager;
pub use peerstore::Peerstore;
pub use record::{Envelope, PeerRecord, RecordError};
pub use registry::{ConnectionHandle, ConnectionRegistry};
