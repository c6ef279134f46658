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

//! Combines two upgrades into one that advertises both protocol ids and
//! dispatches to whichever one multistream-select actually picked. This is
//! how C6 offers both Plaintext and Noise under one negotiation round.

use crate::either::{EitherError, EitherOutput};
use crate::upgrade::{InboundUpgrade, OutboundUpgrade, UpgradeInfo};
use futures::future::{BoxFuture, FutureExt};

pub struct SelectUpgrade<A, B>(pub A, pub B);

impl<A: UpgradeInfo, B: UpgradeInfo> UpgradeInfo for SelectUpgrade<A, B> {
    fn protocol_info(&self) -> Vec<String> {
        let mut protocols = self.0.protocol_info();
        protocols.extend(self.1.protocol_info());
        protocols
    }
}

impl<C, A, B> InboundUpgrade<C> for SelectUpgrade<A, B>
where
    A: InboundUpgrade<C>,
    B: InboundUpgrade<C>,
    A::Output: Send + 'static,
    B::Output: Send + 'static,
    A::Error: Send + 'static,
    B::Error: Send + 'static,
{
    type Output = EitherOutput<A::Output, B::Output>;
    type Error = EitherError<A::Error, B::Error>;

    fn upgrade_inbound(self, socket: C, protocol: String) -> BoxFuture<'static, Result<Self::Output, Self::Error>> {
        if self.0.protocol_info().iter().any(|p| *p == protocol) {
            self.0
                .upgrade_inbound(socket, protocol)
                .map(|r| r.map(EitherOutput::First).map_err(EitherError::First))
                .boxed()
        } else {
            self.1
                .upgrade_inbound(socket, protocol)
                .map(|r| r.map(EitherOutput::Second).map_err(EitherError::Second))
                .boxed()
        }
    }
}

impl<C, A, B> OutboundUpgrade<C> for SelectUpgrade<A, B>
where
    A: OutboundUpgrade<C>,
    B: OutboundUpgrade<C>,
    A::Output: Send + 'static,
    B::Output: Send + 'static,
    A::Error: Send + 'static,
    B::Error: Send + 'static,
{
    type Output = EitherOutput<A::Output, B::Output>;
    type Error = EitherError<A::Error, B::Error>;

    fn upgrade_outbound(self, socket: C, protocol: String) -> BoxFuture<'static, Result<Self::Output, Self::Error>> {
        if self.0.protocol_info().iter().any(|p| *p == protocol) {
            self.0
                .upgrade_outbound(socket, protocol)
                .map(|r| r.map(EitherOutput::First).map_err(EitherError::First))
                .boxed()
        } else {
            self.1
                .upgrade_outbound(socket, protocol)
                .map(|r| r.map(EitherOutput::Second).map_err(EitherError::Second))
                .boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[derive(Clone)]
    struct Single(&'static str);

    impl UpgradeInfo for Single {
        fn protocol_info(&self) -> Vec<String> {
            vec![self.0.to_string()]
        }
    }

    impl InboundUpgrade<()> for Single {
        type Output = &'static str;
        type Error = Infallible;
        fn upgrade_inbound(self, _socket: (), _protocol: String) -> BoxFuture<'static, Result<Self::Output, Self::Error>> {
            futures::future::ready(Ok(self.0)).boxed()
        }
    }

    #[test]
    fn protocol_info_advertises_both_branches() {
        let select = SelectUpgrade(Single("/a/1.0.0"), Single("/b/1.0.0"));
        assert_eq!(select.protocol_info(), vec!["/a/1.0.0".to_string(), "/b/1.0.0".to_string()]);
    }

    #[async_std::test]
    async fn dispatches_to_first_branch_when_its_protocol_is_chosen() {
        let select = SelectUpgrade(Single("/a/1.0.0"), Single("/b/1.0.0"));
        let out = select.upgrade_inbound((), "/a/1.0.0".to_string()).await.unwrap();
        assert!(matches!(out, EitherOutput::First("/a/1.0.0")));
    }

    #[async_std::test]
    async fn dispatches_to_second_branch_when_its_protocol_is_chosen() {
        let select = SelectUpgrade(Single("/a/1.0.0"), Single("/b/1.0.0"));
        let out = select.upgrade_inbound((), "/b/1.0.0".to_string()).await.unwrap();
        assert!(matches!(out, EitherOutput::Second("/b/1.0.0")));
    }
}
