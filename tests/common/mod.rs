//! Shared test doubles and slot helpers.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dictcache::ds::mix64;
use dictcache::error::CacheError;
use dictcache::source::{DictionarySource, MemorySource, RecordStream};

/// Source wrapper recording every id list it serves.
pub struct CountingSource {
    inner: MemorySource,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<u64>>>,
}

impl CountingSource {
    pub fn new(inner: MemorySource) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent id list, sorted for stable assertions.
    pub fn last_request(&self) -> Vec<u64> {
        let mut ids = self
            .requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }
}

impl DictionarySource for CountingSource {
    fn supports_selective_load(&self) -> bool {
        true
    }

    fn load_ids(&self, ids: &[u64]) -> Result<Box<dyn RecordStream + '_>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(ids.to_vec());
        self.inner.load_ids(ids)
    }

    fn clone_source(&self) -> Box<dyn DictionarySource> {
        self.inner.clone_source()
    }
}

/// Source whose streams fail after a fixed number of successful blocks.
pub struct FailAfter {
    inner: Box<dyn DictionarySource>,
    ok_blocks: usize,
}

impl FailAfter {
    pub fn new(inner: Box<dyn DictionarySource>, ok_blocks: usize) -> Self {
        Self { inner, ok_blocks }
    }
}

impl DictionarySource for FailAfter {
    fn supports_selective_load(&self) -> bool {
        self.inner.supports_selective_load()
    }

    fn load_ids(&self, ids: &[u64]) -> Result<Box<dyn RecordStream + '_>, CacheError> {
        Ok(Box::new(FailingStream {
            inner: self.inner.load_ids(ids)?,
            remaining: self.ok_blocks,
        }))
    }

    fn clone_source(&self) -> Box<dyn DictionarySource> {
        Box::new(Self {
            inner: self.inner.clone_source(),
            ok_blocks: self.ok_blocks,
        })
    }
}

struct FailingStream<'a> {
    inner: Box<dyn RecordStream + 'a>,
    remaining: usize,
}

impl RecordStream for FailingStream<'_> {
    fn read(&mut self) -> Result<Option<dictcache::source::Block>, CacheError> {
        match self.inner.read()? {
            None => Ok(None),
            Some(block) => {
                if self.remaining == 0 {
                    return Err(CacheError::source(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "stream interrupted",
                    )));
                }
                self.remaining -= 1;
                Ok(Some(block))
            }
        }
    }
}

/// Slot index a key lands in for a power-of-two `capacity`.
pub fn slot_of(key: u64, capacity: usize) -> usize {
    (mix64(key) & (capacity as u64 - 1)) as usize
}

/// Returns `count` non-zero keys that all land in pairwise distinct slots.
pub fn keys_in_distinct_slots(capacity: usize, count: usize) -> Vec<u64> {
    assert!(count <= capacity);
    let mut keys = Vec::with_capacity(count);
    let mut used = vec![false; capacity];
    let mut key = 1u64;
    while keys.len() < count {
        let slot = slot_of(key, capacity);
        if !used[slot] {
            used[slot] = true;
            keys.push(key);
        }
        key += 1;
    }
    keys
}

/// Returns a non-zero key other than `key` that shares its slot.
pub fn colliding_key(key: u64, capacity: usize) -> u64 {
    let slot = slot_of(key, capacity);
    (1..)
        .find(|&candidate| candidate != key && slot_of(candidate, capacity) == slot)
        .unwrap()
}
