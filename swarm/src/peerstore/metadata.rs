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

//! MetadataStore (spec §4.10): `(PeerId, key) -> serialized value`, where the
//! caller supplies the serializer so this store stays payload-agnostic.

use libp2p_core::PeerId;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to serialize metadata value: {0}")]
    SerializationError(String),
}

pub struct MetadataStore {
    entries: Mutex<HashMap<(PeerId, String), Vec<u8>>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        MetadataStore { entries: Mutex::new(HashMap::new()) }
    }

    /// Stores `value` under `(peer, key)`, serialized by `to_bytes`. The
    /// caller picks the encoding (JSON, protobuf, bincode, ...); a failure
    /// there is surfaced as [`MetadataError::SerializationError`].
    pub fn put<T>(
        &self,
        peer: &PeerId,
        key: impl Into<String>,
        value: &T,
        to_bytes: impl FnOnce(&T) -> Result<Vec<u8>, String>,
    ) -> Result<(), MetadataError> {
        let bytes = to_bytes(value).map_err(MetadataError::SerializationError)?;
        self.entries.lock().insert((peer.clone(), key.into()), bytes);
        Ok(())
    }

    /// Looks up `(peer, key)` and decodes it with `from_bytes`, if present.
    pub fn get<T>(
        &self,
        peer: &PeerId,
        key: &str,
        from_bytes: impl FnOnce(&[u8]) -> Result<T, String>,
    ) -> Result<Option<T>, MetadataError> {
        let entries = self.entries.lock();
        match entries.get(&(peer.clone(), key.to_string())) {
            Some(bytes) => from_bytes(bytes).map(Some).map_err(MetadataError::SerializationError),
            None => Ok(None),
        }
    }

    pub(crate) fn remove_peer(&self, peer: &PeerId) {
        self.entries.lock().retain(|(p, _), _| p != peer);
    }
}

impl Default for MetadataStore {
    fn default() -> Self {
        MetadataStore::new()
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
    fn put_then_get_round_trips() {
        let store = MetadataStore::new();
        let p = peer();
        store.put(&p, "nick", &"alice".to_string(), |v| Ok(v.as_bytes().to_vec())).unwrap();
        let got: Option<String> =
            store.get(&p, "nick", |b| String::from_utf8(b.to_vec()).map_err(|e| e.to_string())).unwrap();
        assert_eq!(got, Some("alice".to_string()));
    }

    #[test]
    fn missing_key_is_none() {
        let store = MetadataStore::new();
        let p = peer();
        let got: Option<String> = store.get(&p, "nick", |b| String::from_utf8(b.to_vec()).map_err(|e| e.to_string())).unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn unserializable_value_fails() {
        let store = MetadataStore::new();
        let p = peer();
        let result = store.put(&p, "bad", &(), |_| Err("cannot encode".to_string()));
        assert!(matches!(result, Err(MetadataError::SerializationError(_))));
    }
}
