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

//! MetricsStore (spec §4.10): a per-peer exponentially weighted moving
//! average of latency, fed by ping round trips.

use libp2p_core::PeerId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

const ALPHA: f64 = 0.1;

pub struct MetricsStore {
    ewma: Mutex<HashMap<PeerId, f64>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        MetricsStore { ewma: Mutex::new(HashMap::new()) }
    }

    /// Folds one latency sample into `peer`'s running average:
    /// `ewma := alpha * sample + (1 - alpha) * ewma`, seeding the average
    /// with the first sample observed for a peer.
    pub fn record_latency(&self, peer: &PeerId, sample: Duration) {
        let sample_millis = sample.as_secs_f64() * 1000.0;
        let mut ewma = self.ewma.lock();
        ewma.entry(peer.clone())
            .and_modify(|avg| *avg = ALPHA * sample_millis + (1.0 - ALPHA) * *avg)
            .or_insert(sample_millis);
    }

    /// The current latency estimate for `peer`, in milliseconds.
    pub fn latency_ewma(&self, peer: &PeerId) -> Option<Duration> {
        self.ewma.lock().get(peer).map(|millis| Duration::from_secs_f64(millis / 1000.0))
    }

    pub(crate) fn remove_peer(&self, peer: &PeerId) {
        self.ewma.lock().remove(peer);
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        MetricsStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p_core::identity::Keypair;

    fn peer() -> PeerId {
        PeerId::from_public_key(&Keypair::generate_ed25519().public())
    }

    #[test]
    fn first_sample_seeds_the_average() {
        let store = MetricsStore::new();
        let p = peer();
        store.record_latency(&p, Duration::from_millis(100));
        assert_eq!(store.latency_ewma(&p), Some(Duration::from_millis(100)));
    }

    #[test]
    fn second_sample_moves_the_average_toward_it() {
        let store = MetricsStore::new();
        let p = peer();
        store.record_latency(&p, Duration::from_millis(100));
        store.record_latency(&p, Duration::from_millis(200));
        // 0.1 * 200 + 0.9 * 100 = 110ms
        let got = store.latency_ewma(&p).unwrap();
        assert!((got.as_secs_f64() * 1000.0 - 110.0).abs() < 0.001);
    }
}
