use std::collections::HashSet;

use pw_common::CharacterId;

/// Character IDs with an outstanding refresh request.
///
/// Not synchronized on its own; the owning queue guards it together with
/// the item sequence so membership and the queue contents never disagree.
#[derive(Debug, Default)]
pub struct PendingSet {
    ids: HashSet<CharacterId>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the ID was already pending
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.ids.insert(id.to_string())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
