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

//! Peer-to-peer networking library.
//!
//! This crate is a thin facade: it re-exports `libp2p-core`'s types and
//! traits, `libp2p-swarm`'s Host/Peerstore/dial machinery, and each
//! transport/security/muxer/protocol crate behind the feature named in this
//! crate's `Cargo.toml`. Pick the pieces you need from the module tree below
//! and wire them up through `libp2p_swarm::Host`; there is no bundled
//! "one call starts everything" builder.

pub use libp2p_core as core;
pub use libp2p_swarm as swarm;
pub use multiaddr;
pub use multistream_select;

#[cfg(feature = "identify")]
pub use libp2p_identify as identify;
#[cfg(feature = "mplex")]
pub use libp2p_mplex as mplex;
#[cfg(feature = "noise")]
pub use libp2p_noise as noise;
#[cfg(feature = "ping")]
pub use libp2p_ping as ping;
#[cfg(feature = "plaintext")]
pub use libp2p_plaintext as plaintext;
#[cfg(any(feature = "tcp-async-std", feature = "tcp-tokio"))]
pub use libp2p_tcp as tcp;

pub use core::{ConnectedPoint, ConnectionId, Direction, Keypair, ListenerId, LocalIdentity, Multiaddr, PeerId, PublicKey, RemoteIdentity, TransportError};
pub use swarm::{
    Connectedness, ConnectionHandle, ConnectionRegistry, DialConfig, DialCoordinator, Envelope, Event, EventBus,
    EventSubscription, Host, ListenerManager, PeerRecord, Peerstore, Reachability, RecordError, StreamHandler,
};
