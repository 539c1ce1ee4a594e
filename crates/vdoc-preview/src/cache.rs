//! Bounded LRU cache for shared pixel buffers.
//!
//! The component initiating transport owns one of these and passes it by
//! reference wherever frames are resolved; dropping the owner drops every
//! buffer with it. There is no global registry.

/// Keyed pixel buffers with least-recently-used eviction. Insertion and
/// lookup both count as a use.
#[derive(Debug)]
pub struct SharedBufferCache {
    /// Most recently used last.
    entries: Vec<(u32, Vec<u8>)>,
    capacity: usize,
}

impl SharedBufferCache {
    /// `capacity` is the maximum number of buffers kept; at least one is
    /// always allowed.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: u32) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    /// Store a buffer under `key`, replacing any previous one. Evicts the
    /// least recently used entry when over capacity.
    pub fn insert(&mut self, key: u32, pixels: Vec<u8>) {
        if let Some(pos) = self.entries.iter().position(|(k, _)| *k == key) {
            self.entries.remove(pos);
        }
        self.entries.push((key, pixels));
        while self.entries.len() > self.capacity {
            let (evicted, buffer) = self.entries.remove(0);
            log::debug!(
                "shared buffer cache: evicting key {evicted} ({} bytes)",
                buffer.len()
            );
        }
    }

    /// Look up a buffer and mark it most recently used.
    pub fn get(&mut self, key: u32) -> Option<&[u8]> {
        let pos = self.entries.iter().position(|(k, _)| *k == key)?;
        let entry = self.entries.remove(pos);
        self.entries.push(entry);
        self.entries.last().map(|(_, pixels)| pixels.as_slice())
    }

    /// Drop a single buffer, e.g. when the producer recycles its segment.
    pub fn remove(&mut self, key: u32) -> Option<Vec<u8>> {
        let pos = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
