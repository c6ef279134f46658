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

//! Simultaneous-open tie-breaking (spec §4.2): when both sides of a
//! connection attempt to be the dialer, they fall back to a nonce race to
//! decide which one actually drives the rest of the negotiation.

use crate::error::NegotiationError;
use crate::line::{read_line, write_line};
use crate::negotiated::Negotiated;
use futures::io::{AsyncRead, AsyncWrite};
use rand::RngCore;
use std::cmp::Ordering;

const SIMULTANEOUS_CONNECT: &[u8] = b"/libp2p/simultaneous-connect";
const NONCE_LEN: usize = 32;
/// Bails out rather than looping forever against a peer whose RNG is
/// somehow producing a run of colliding nonces.
const MAX_TIE_ROUNDS: usize = 8;

/// The role this side of a simultaneous-open tie-break ends up playing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Role {
    /// Won the nonce race: continues as if it were the dialer.
    Select,
    /// Lost the nonce race: continues as if it were the listener.
    Respond,
}

/// Runs the `/libp2p/simultaneous-connect` exchange and nonce race.
/// Assumes the regular `/multistream/1.0.0` handshake has already completed
/// on `io`.
pub async fn negotiate_simultaneous_open<T>(mut io: T) -> Result<(Role, Negotiated<T>), NegotiationError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    write_line(&mut io, SIMULTANEOUS_CONNECT).await?;
    let peer_token = read_line(&mut io).await?;
    if peer_token != SIMULTANEOUS_CONNECT {
        return Err(NegotiationError::ProtocolViolation("expected simultaneous-connect token"));
    }

    for _ in 0..MAX_TIE_ROUNDS {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        write_line(&mut io, hex_encode(&nonce).as_bytes()).await?;
        let peer_hex = read_line(&mut io).await?;
        let peer_nonce = hex_decode(&peer_hex)?;

        match nonce[..].cmp(&peer_nonce[..]) {
            Ordering::Greater => return Ok((Role::Select, Negotiated::new(io))),
            Ordering::Less => return Ok((Role::Respond, Negotiated::new(io))),
            Ordering::Equal => continue,
        }
    }
    Err(NegotiationError::SimultaneousOpenTieUnresolved)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hex_decode(hex: &[u8]) -> Result<Vec<u8>, NegotiationError> {
    if hex.len() % 2 != 0 {
        return Err(NegotiationError::ProtocolViolation("odd-length hex nonce"));
    }
    hex.chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair).map_err(|_| NegotiationError::ProtocolViolation("non-utf8 hex nonce"))?;
            u8::from_str_radix(s, 16).map_err(|_| NegotiationError::ProtocolViolation("invalid hex nonce"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips() {
        let bytes: Vec<u8> = (0..32).collect();
        let encoded = hex_encode(&bytes);
        let decoded = hex_decode(encoded.as_bytes()).unwrap();
        assert_eq!(bytes, decoded);
    }
}
