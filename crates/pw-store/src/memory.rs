//! In-memory local store
//!
//! Backs every storage contract with DashMaps. Upserts overwrite by the
//! entry's natural key, so repeating a refresh with identical upstream data
//! leaves the store unchanged.

use async_trait::async_trait;
use anyhow::Result;
use dashmap::DashMap;
use tracing::debug;

use pw_common::{
    BaseStat, CharacterDirective, CharacterDirectiveObjective, CharacterDirectiveTier,
    CharacterDirectiveTree, CharacterFriend, CharacterId, CharacterItem, CharacterMetadata,
    CharacterRecord, HistoryStat, StatBundle, WeaponStat,
};
use crate::repository::{CharacterStore, MetadataStore, StatStore};

#[derive(Default)]
pub struct MemoryStore {
    characters: DashMap<CharacterId, CharacterRecord>,
    metadata: DashMap<CharacterId, CharacterMetadata>,
    /// (character, item, vehicle)
    weapon_stats: DashMap<(CharacterId, String, String), WeaponStat>,
    /// (character, stat type)
    history_stats: DashMap<(CharacterId, String), HistoryStat>,
    items: DashMap<CharacterId, Vec<CharacterItem>>,
    stats: DashMap<CharacterId, Vec<BaseStat>>,
    friends: DashMap<CharacterId, Vec<CharacterFriend>>,
    /// (character, directive)
    directives: DashMap<(CharacterId, u32), CharacterDirective>,
    /// (character, tree)
    directive_trees: DashMap<(CharacterId, u32), CharacterDirectiveTree>,
    /// (character, tree, tier)
    directive_tiers: DashMap<(CharacterId, u32, u32), CharacterDirectiveTier>,
    /// (character, directive, objective)
    directive_objectives: DashMap<(CharacterId, u32, u32), CharacterDirectiveObjective>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// Everything stored for a character, each list in natural-key order
    pub fn bundle(&self, character_id: &str) -> StatBundle {
        let mut bundle = StatBundle {
            weapon_stats: collect(&self.weapon_stats, |k| k.0 == character_id),
            history_stats: collect(&self.history_stats, |k| k.0 == character_id),
            items: self.items.get(character_id).map(|v| v.clone()).unwrap_or_default(),
            stats: self.stats.get(character_id).map(|v| v.clone()).unwrap_or_default(),
            friends: self.friends.get(character_id).map(|v| v.clone()).unwrap_or_default(),
            directives: collect(&self.directives, |k| k.0 == character_id),
            directive_trees: collect(&self.directive_trees, |k| k.0 == character_id),
            directive_tiers: collect(&self.directive_tiers, |k| k.0 == character_id),
            directive_objectives: collect(&self.directive_objectives, |k| k.0 == character_id),
        };

        bundle.weapon_stats.sort_by(|a, b| (&a.item_id, &a.vehicle_id).cmp(&(&b.item_id, &b.vehicle_id)));
        bundle.history_stats.sort_by(|a, b| a.stat_type.cmp(&b.stat_type));
        bundle.directives.sort_by_key(|d| d.directive_id);
        bundle.directive_trees.sort_by_key(|t| t.tree_id);
        bundle.directive_tiers.sort_by_key(|t| (t.tree_id, t.tier_id));
        bundle.directive_objectives.sort_by_key(|o| (o.directive_id, o.objective_id));
        bundle
    }
}

fn collect<K, V, F>(map: &DashMap<K, V>, filter: F) -> Vec<V>
where
    K: Eq + std::hash::Hash,
    V: Clone,
    F: Fn(&K) -> bool,
{
    map.iter()
        .filter(|entry| filter(entry.key()))
        .map(|entry| entry.value().clone())
        .collect()
}

#[async_trait]
impl CharacterStore for MemoryStore {
    async fn upsert_character(&self, character: &CharacterRecord) -> Result<()> {
        self.characters.insert(character.id.clone(), character.clone());
        Ok(())
    }

    async fn get_character(&self, character_id: &str) -> Result<Option<CharacterRecord>> {
        Ok(self.characters.get(character_id).map(|c| c.clone()))
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn get_metadata(&self, character_id: &str) -> Result<Option<CharacterMetadata>> {
        Ok(self.metadata.get(character_id).map(|m| m.clone()))
    }

    async fn upsert_metadata(&self, character_id: &str, metadata: &CharacterMetadata) -> Result<()> {
        self.metadata.insert(character_id.to_string(), metadata.clone());
        Ok(())
    }
}

#[async_trait]
impl StatStore for MemoryStore {
    async fn upsert_weapon_stat(&self, stat: &WeaponStat) -> Result<()> {
        let key = (stat.character_id.clone(), stat.item_id.clone(), stat.vehicle_id.clone());
        self.weapon_stats.insert(key, stat.clone());
        Ok(())
    }

    async fn upsert_history_stat(&self, character_id: &str, stat: &HistoryStat) -> Result<()> {
        let key = (character_id.to_string(), stat.stat_type.clone());
        self.history_stats.insert(key, stat.clone());
        Ok(())
    }

    async fn set_items(&self, character_id: &str, items: &[CharacterItem]) -> Result<()> {
        debug!(character_id = %character_id, count = items.len(), "Replacing items");
        self.items.insert(character_id.to_string(), items.to_vec());
        Ok(())
    }

    async fn set_stats(&self, character_id: &str, stats: &[BaseStat]) -> Result<()> {
        self.stats.insert(character_id.to_string(), stats.to_vec());
        Ok(())
    }

    async fn set_friends(&self, character_id: &str, friends: &[CharacterFriend]) -> Result<()> {
        self.friends.insert(character_id.to_string(), friends.to_vec());
        Ok(())
    }

    async fn upsert_directive(&self, character_id: &str, directive: &CharacterDirective) -> Result<()> {
        self.directives
            .insert((character_id.to_string(), directive.directive_id), directive.clone());
        Ok(())
    }

    async fn upsert_directive_tree(&self, character_id: &str, tree: &CharacterDirectiveTree) -> Result<()> {
        self.directive_trees
            .insert((character_id.to_string(), tree.tree_id), tree.clone());
        Ok(())
    }

    async fn upsert_directive_tier(&self, character_id: &str, tier: &CharacterDirectiveTier) -> Result<()> {
        self.directive_tiers
            .insert((character_id.to_string(), tier.tree_id, tier.tier_id), tier.clone());
        Ok(())
    }

    async fn upsert_directive_objective(&self, character_id: &str, objective: &CharacterDirectiveObjective) -> Result<()> {
        let key = (character_id.to_string(), objective.directive_id, objective.objective_id);
        self.directive_objectives.insert(key, objective.clone());
        Ok(())
    }
}
