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

//! Conversions between `Multiaddr` and `SocketAddr`, and the local-interface
//! expansion used when a listen address's host is the wildcard `0.0.0.0` /
//! `::` (spec §4.9: "derive local multiaddress from the actual local
//! endpoint" — when that endpoint is a wildcard, report every concrete
//! interface address bound to it instead of the meaningless wildcard).

use libp2p_core::addr::Protocol;
use libp2p_core::Multiaddr;
use std::net::{IpAddr, SocketAddr};

/// Extracts a dialable `SocketAddr` from `addr`, if `addr` is of the shape
/// `{ip4,ip6}/tcp/<port>`. DNS components are not resolved here; callers
/// that accept `dns*` addresses must resolve them first.
pub fn multiaddr_to_socketaddr(addr: &Multiaddr) -> Option<SocketAddr> {
    let mut iter = addr.iter();
    let ip = match iter.next()? {
        Protocol::Ip4(ip) => IpAddr::V4(ip),
        Protocol::Ip6(ip) => IpAddr::V6(ip),
        _ => return None,
    };
    let port = match iter.next()? {
        Protocol::Tcp(port) => port,
        _ => return None,
    };
    if iter.next().is_some() {
        return None;
    }
    Some(SocketAddr::new(ip, port))
}

/// Builds the `{ip4,ip6}/tcp/<port>` multiaddress for a bound socket
/// address.
pub fn socketaddr_to_multiaddr(socket_addr: &SocketAddr) -> Multiaddr {
    let mut addr = Multiaddr::empty();
    match socket_addr.ip() {
        IpAddr::V4(ip) => addr.push(Protocol::Ip4(ip)),
        IpAddr::V6(ip) => addr.push(Protocol::Ip6(ip)),
    }
    addr.push(Protocol::Tcp(socket_addr.port()));
    addr
}

/// True iff `ip` is the unspecified (wildcard) address.
fn is_wildcard(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => ip.is_unspecified(),
        IpAddr::V6(ip) => ip.is_unspecified(),
    }
}

/// Expands a bound local socket address into the set of multiaddresses this
/// host is actually reachable at: itself, unless its host is a wildcard, in
/// which case every local interface's address with the bound port.
#[cfg(feature = "get_if_addrs")]
pub fn local_addresses(bound: &SocketAddr) -> Vec<Multiaddr> {
    if !is_wildcard(bound.ip()) {
        return vec![socketaddr_to_multiaddr(bound)];
    }
    match get_if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces
            .into_iter()
            .filter(|iface| !iface.is_loopback())
            .map(|iface| socketaddr_to_multiaddr(&SocketAddr::new(iface.ip(), bound.port())))
            .collect(),
        Err(e) => {
            log::warn!("failed to enumerate local interfaces: {}", e);
            vec![socketaddr_to_multiaddr(bound)]
        }
    }
}

#[cfg(not(feature = "get_if_addrs"))]
pub fn local_addresses(bound: &SocketAddr) -> Vec<Multiaddr> {
    vec![socketaddr_to_multiaddr(bound)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ip4_tcp() {
        let a: Multiaddr = "/ip4/127.0.0.1/tcp/4001".parse().unwrap();
        let sock = multiaddr_to_socketaddr(&a).unwrap();
        assert_eq!(sock.to_string(), "127.0.0.1:4001");
        assert_eq!(socketaddr_to_multiaddr(&sock), a);
    }

    #[test]
    fn rejects_dns() {
        let a: Multiaddr = "/dns4/example.com/tcp/443".parse().unwrap();
        assert!(multiaddr_to_socketaddr(&a).is_none());
    }
}
