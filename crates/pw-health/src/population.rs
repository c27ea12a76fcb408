use dashmap::DashMap;
use tracing::debug;

use pw_common::{CharacterId, ShardId};

/// Current live population of a shard
pub trait PopulationSource: Send + Sync {
    /// `None` when nothing is known about the shard yet
    fn shard_population(&self, shard: ShardId) -> Option<u32>;
}

/// Who is online where, fed by login and logout events.
///
/// Owned by the service and shared by `Arc`; every accessor is synchronized
/// internally so callers never take an outside lock.
#[derive(Debug, Default)]
pub struct PopulationRegistry {
    online: DashMap<CharacterId, ShardId>,
    counts: DashMap<ShardId, u32>,
    /// Fixed populations that take precedence over the tracked counts
    overrides: DashMap<ShardId, u32>,
}

impl PopulationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_login(&self, character_id: impl Into<CharacterId>, shard: ShardId) {
        let previous = self.online.insert(character_id.into(), shard);
        match previous {
            Some(old) if old == shard => return,
            Some(old) => self.decrement(old),
            None => {}
        }
        *self.counts.entry(shard).or_insert(0) += 1;
    }

    pub fn record_logout(&self, character_id: &str) {
        if let Some((_, shard)) = self.online.remove(character_id) {
            self.decrement(shard);
        } else {
            debug!(character_id = %character_id, "Logout for character not tracked as online");
        }
    }

    pub fn set_population(&self, shard: ShardId, population: u32) {
        self.overrides.insert(shard, population);
    }

    pub fn clear_population(&self, shard: ShardId) {
        self.overrides.remove(&shard);
    }

    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    fn decrement(&self, shard: ShardId) {
        if let Some(mut count) = self.counts.get_mut(&shard) {
            *count = count.saturating_sub(1);
        }
    }
}

impl PopulationSource for PopulationRegistry {
    fn shard_population(&self, shard: ShardId) -> Option<u32> {
        if let Some(fixed) = self.overrides.get(&shard) {
            return Some(*fixed);
        }
        self.counts.get(&shard).map(|c| *c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_logout_counts() {
        let registry = PopulationRegistry::new();
        registry.record_login("a", 1);
        registry.record_login("b", 1);
        registry.record_login("c", 10);
        registry.record_login("a", 1);

        assert_eq!(registry.shard_population(1), Some(2));
        assert_eq!(registry.shard_population(10), Some(1));
        assert_eq!(registry.shard_population(40), None);

        registry.record_logout("b");
        registry.record_logout("never-seen");
        assert_eq!(registry.shard_population(1), Some(1));
        assert_eq!(registry.online_count(), 2);
    }

    #[test]
    fn test_login_on_new_shard_moves_character() {
        let registry = PopulationRegistry::new();
        registry.record_login("a", 1);
        registry.record_login("a", 17);

        // Emptied shards report zero, not unknown
        assert_eq!(registry.shard_population(1), Some(0));
        assert_eq!(registry.shard_population(17), Some(1));
    }

    #[test]
    fn test_override_wins() {
        let registry = PopulationRegistry::new();
        registry.record_login("a", 1);
        registry.set_population(1, 500);
        assert_eq!(registry.shard_population(1), Some(500));

        registry.clear_population(1);
        assert_eq!(registry.shard_population(1), Some(1));
    }

    #[test]
    fn test_override_on_unseen_shard() {
        let registry = PopulationRegistry::new();
        assert_eq!(registry.shard_population(3), None);

        registry.set_population(3, 0);
        assert_eq!(registry.shard_population(3), Some(0));

        registry.clear_population(3);
        assert_eq!(registry.shard_population(3), None);
    }
}
