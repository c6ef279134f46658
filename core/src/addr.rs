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

//! Helpers over the external `multiaddr` crate (the multiaddress parser is
//! an out-of-scope collaborator per spec §1/§6: we depend on it rather than
//! reimplement it).

pub use multiaddr::{Multiaddr, Protocol};

/// True iff `addr` is dialable by the TCP transport: `{ip4,ip6,dns,dns4,dns6}`
/// followed by `tcp/<port>` with `port > 0`, per spec §3.
pub fn is_tcp_dialable(addr: &Multiaddr) -> bool {
    let mut iter = addr.iter();
    let first = match iter.next() {
        Some(p) => p,
        None => return false,
    };
    let host_ok = matches!(
        first,
        Protocol::Ip4(_) | Protocol::Ip6(_) | Protocol::Dns(_) | Protocol::Dns4(_) | Protocol::Dns6(_)
    );
    if !host_ok {
        return false;
    }
    match iter.next() {
        Some(Protocol::Tcp(port)) => port > 0 && iter.next().is_none(),
        _ => false,
    }
}

/// Extracts the TCP port from a TCP-dialable address.
pub fn tcp_port(addr: &Multiaddr) -> Option<u16> {
    addr.iter().find_map(|p| match p {
        Protocol::Tcp(port) => Some(port),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ip4_tcp() {
        let a: Multiaddr = "/ip4/127.0.0.1/tcp/4001".parse().unwrap();
        assert!(is_tcp_dialable(&a));
        assert_eq!(tcp_port(&a), Some(4001));
    }

    #[test]
    fn rejects_port_zero() {
        let a: Multiaddr = "/ip4/127.0.0.1/tcp/0".parse().unwrap();
        assert!(!is_tcp_dialable(&a));
    }

    #[test]
    fn accepts_dns4() {
        let a: Multiaddr = "/dns4/example.com/tcp/443".parse().unwrap();
        assert!(is_tcp_dialable(&a));
    }

    #[test]
    fn rejects_udp() {
        let a: Multiaddr = "/ip4/127.0.0.1/udp/4001".parse().unwrap();
        assert!(!is_tcp_dialable(&a));
    }
}
