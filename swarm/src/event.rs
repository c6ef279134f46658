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

//! The Event tagged union (spec §3) and EventBus (spec §5): single-writer,
//! many-reader publish/subscribe with bounded, drop-oldest per-subscriber
//! queues so a slow subscriber never stalls the publisher.

use libp2p_core::{Multiaddr, PeerId};
use std::collections::VecDeque;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use parking_lot::Mutex;

/// Minimum per-subscriber queue depth, per spec §5.
pub const MIN_QUEUE_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Connectedness {
    Connected,
    Disconnected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reachability {
    Public,
    Private,
    Unknown,
}

#[derive(Clone, Debug)]
pub enum Event {
    PeerConnectednessChanged(PeerId, Connectedness),
    LocalAddressesUpdated(Vec<Multiaddr>),
    PeerIdentificationCompleted(PeerId),
    PeerIdentificationFailed(PeerId, String),
    LocalProtocolsUpdated(Vec<String>),
    PeerProtocolsUpdated(PeerId, Vec<String>),
    LocalReachabilityChanged(Reachability),
}

struct Subscriber {
    queue: Mutex<VecDeque<Event>>,
    waker: Mutex<Option<Waker>>,
    capacity: usize,
}

/// A single-writer, many-reader event channel. `publish` never blocks: a
/// full subscriber queue drops its oldest entry to make room, per spec §5.
pub struct EventBus {
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::with_capacity(MIN_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        EventBus { subscribers: Mutex::new(Vec::new()), capacity: capacity.max(MIN_QUEUE_CAPACITY) }
    }

    pub fn subscribe(&self) -> EventSubscription {
        let subscriber =
            Arc::new(Subscriber { queue: Mutex::new(VecDeque::new()), waker: Mutex::new(None), capacity: self.capacity });
        self.subscribers.lock().push(subscriber.clone());
        EventSubscription { subscriber }
    }

    /// Delivers `event` to every live subscriber, in publication order.
    pub fn publish(&self, event: Event) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| Arc::strong_count(s) > 1);
        for subscriber in subscribers.iter() {
            let mut queue = subscriber.queue.lock();
            if queue.len() >= subscriber.capacity {
                queue.pop_front();
            }
            queue.push_back(event.clone());
            drop(queue);
            if let Some(waker) = subscriber.waker.lock().take() {
                waker.wake();
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new()
    }
}

/// A subscriber's handle onto the bus. Implements [`futures::Stream`].
pub struct EventSubscription {
    subscriber: Arc<Subscriber>,
}

impl futures::Stream for EventSubscription {
    type Item = Event;

    fn poll_next(self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        let mut queue = self.subscriber.queue.lock();
        if let Some(event) = queue.pop_front() {
            return Poll::Ready(Some(event));
        }
        drop(queue);
        *self.subscriber.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn publish_is_delivered_in_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.publish(Event::LocalProtocolsUpdated(vec!["/a".to_string()]));
        bus.publish(Event::LocalProtocolsUpdated(vec!["/b".to_string()]));

        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        let first = std::pin::Pin::new(&mut sub).poll_next(&mut cx);
        let second = std::pin::Pin::new(&mut sub).poll_next(&mut cx);
        assert!(matches!(first, Poll::Ready(Some(Event::LocalProtocolsUpdated(ref v))) if v == &["/a".to_string()]));
        assert!(matches!(second, Poll::Ready(Some(Event::LocalProtocolsUpdated(ref v))) if v == &["/b".to_string()]));
    }

    #[async_std::test]
    async fn overflow_drops_oldest_entry() {
        let bus = EventBus::with_capacity(2);
        let sub = bus.subscribe();
        for i in 0..5u32 {
            bus.publish(Event::LocalReachabilityChanged(if i % 2 == 0 {
                Reachability::Public
            } else {
                Reachability::Private
            }));
        }
        let received: Vec<_> = sub.take(2).collect().await;
        assert_eq!(received.len(), 2);
        // Only the last two publications should have survived the drop-oldest queue.
        assert!(matches!(received[0], Event::LocalReachabilityChanged(Reachability::Public)));
        assert!(matches!(received[1], Event::LocalReachabilityChanged(Reachability::Private)));
    }
}
