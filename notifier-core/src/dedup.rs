use std::collections::HashSet;

/// Ids of every post the stream coordinator has already processed.
///
/// Entries are never evicted, so memory grows with the number of distinct
/// posts seen during the process lifetime. Nothing is persisted.
#[derive(Debug, Default, Clone)]
pub struct DedupTracker {
    seen: HashSet<String>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Marking an id twice is a no-op.
    pub fn mark_seen(&mut self, id: &str) {
        if !self.seen.contains(id) {
            self.seen.insert(id.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
