use std::collections::HashMap;

/// Remembers when each series was last tagged.
///
/// An entry exists for a series if tags were sent for it and the entry has not been evicted
/// since. The cache grows with the number of distinct series and is only ever shrunk by
/// [`evict`](Self::evict).
#[derive(Clone, Debug, Default)]
pub struct TagCache {
    entries: HashMap<String, u64>,
}

impl TagCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the series has an entry.
    pub fn is_fresh(&self, full_name: &str) -> bool {
        self.entries.contains_key(full_name)
    }

    /// Records that the series was tagged at `now`, in milliseconds.
    pub fn mark_tagged(&mut self, full_name: &str, now: u64) {
        match self.entries.get_mut(full_name) {
            Some(timestamp) => *timestamp = now,
            None => {
                self.entries.insert(full_name.to_owned(), now);
            }
        }
    }

    /// Removes all entries tagged strictly before `now - ttl`.
    ///
    /// Returns the number of removed entries.
    pub fn evict(&mut self, now: u64, ttl: u64) -> usize {
        let threshold = now.saturating_sub(ttl);
        let before = self.entries.len();
        self.entries.retain(|_, tagged_at| *tagged_at >= threshold);
        before - self.entries.len()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
