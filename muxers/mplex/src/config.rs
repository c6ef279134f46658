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

use std::time::Duration;

/// Tunables for a [`crate::Multiplex`] instance (spec §4.4, §5).
#[derive(Debug, Clone)]
pub struct MplexConfig {
    /// Per-stream receive buffer cap before the sender is backpressured.
    /// Spec §4.4 requires at least 256 KiB.
    pub max_buffer_len: usize,
    /// How long a stream may sit with a full receive buffer and no reader
    /// before it is reset, per spec §4.4's "configurable reset-on-timeout".
    pub max_buffer_behaviour_timeout: Duration,
    /// Splits outbound `Message` frames larger than this into multiple
    /// frames so no single write monopolises the connection.
    pub split_send_size: usize,
}

impl Default for MplexConfig {
    fn default() -> Self {
        MplexConfig {
            max_buffer_len: 256 * 1024,
            max_buffer_behaviour_timeout: Duration::from_secs(5),
            split_send_size: 16 * 1024,
        }
    }
}
