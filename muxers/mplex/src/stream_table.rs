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

//! Bookkeeping for the set of logical streams on one connection (spec §4.4's
//! `OPEN -> WR_CLOSED/RD_CLOSED -> CLOSED` state machine, with `RESET`
//! reachable from any state). Holds no I/O: the connection driver mutates
//! this table and then, separately, talks to the wire (spec §5: "the stream
//! map mutex MUST be released before writing to the wire").

use fnv::FnvHashMap;
use std::collections::VecDeque;
use std::task::Waker;
use std::time::Instant;

/// Key identifying a logical stream: the id it was allocated under, and
/// which side allocated it. Mirrors the wire's `initiator` bit, but from the
/// *local* side's perspective rather than a frame sender's.
pub(crate) type StreamKey = (bool, u64);

pub(crate) struct StreamEntry {
    pub read_closed: bool,
    pub write_closed: bool,
    pub reset: bool,
    pub recv_buf: VecDeque<u8>,
    pub buffer_full_since: Option<Instant>,
    pub read_wakers: Vec<Waker>,
    pub write_wakers: Vec<Waker>,
}

impl StreamEntry {
    fn new() -> Self {
        StreamEntry {
            read_closed: false,
            write_closed: false,
            reset: false,
            recv_buf: VecDeque::new(),
            buffer_full_since: None,
            read_wakers: Vec::new(),
            write_wakers: Vec::new(),
        }
    }

    pub fn wake_readers(&mut self) {
        for w in self.read_wakers.drain(..) {
            w.wake();
        }
    }

    pub fn wake_writers(&mut self) {
        for w in self.write_wakers.drain(..) {
            w.wake();
        }
    }

    pub fn is_fully_closed(&self) -> bool {
        self.reset || (self.read_closed && self.write_closed)
    }
}

pub(crate) struct StreamTable {
    pub streams: FnvHashMap<StreamKey, StreamEntry>,
    pub next_outbound_id: u64,
    pub inbound_queue: VecDeque<StreamKey>,
    pub accept_wakers: Vec<Waker>,
    pub closed: bool,
}

impl StreamTable {
    pub fn new() -> Self {
        StreamTable {
            streams: FnvHashMap::default(),
            next_outbound_id: 0,
            inbound_queue: VecDeque::new(),
            accept_wakers: Vec::new(),
            closed: false,
        }
    }

    pub fn alloc_outbound_id(&mut self) -> u64 {
        let id = self.next_outbound_id;
        self.next_outbound_id += 1;
        id
    }

    pub fn insert(&mut self, key: StreamKey) -> &mut StreamEntry {
        self.streams.entry(key).or_insert_with(StreamEntry::new)
    }

    pub fn get_mut(&mut self, key: &StreamKey) -> Option<&mut StreamEntry> {
        self.streams.get_mut(key)
    }

    pub fn wake_all(&mut self) {
        for w in self.accept_wakers.drain(..) {
            w.wake();
        }
        for entry in self.streams.values_mut() {
            entry.wake_readers();
            entry.wake_writers();
        }
    }
}
