use std::sync::Arc;
use async_trait::async_trait;
use anyhow::Result;
use pw_common::{
    BaseStat, CharacterDirective, CharacterDirectiveObjective, CharacterDirectiveTier,
    CharacterDirectiveTree, CharacterFriend, CharacterItem, CharacterMetadata, CharacterRecord,
    HistoryStat, WeaponStat,
};

#[async_trait]
pub trait CharacterStore: Send + Sync {
    async fn upsert_character(&self, character: &CharacterRecord) -> Result<()>;
    async fn get_character(&self, character_id: &str) -> Result<Option<CharacterRecord>>;
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_metadata(&self, character_id: &str) -> Result<Option<CharacterMetadata>>;
    async fn upsert_metadata(&self, character_id: &str, metadata: &CharacterMetadata) -> Result<()>;
}

/// Per-category stat storage. `upsert_*` overwrites a single entry by its
/// natural key, `set_*` replaces the whole list for the character.
#[async_trait]
pub trait StatStore: Send + Sync {
    async fn upsert_weapon_stat(&self, stat: &WeaponStat) -> Result<()>;
    async fn upsert_history_stat(&self, character_id: &str, stat: &HistoryStat) -> Result<()>;
    async fn set_items(&self, character_id: &str, items: &[CharacterItem]) -> Result<()>;
    async fn set_stats(&self, character_id: &str, stats: &[BaseStat]) -> Result<()>;
    async fn set_friends(&self, character_id: &str, friends: &[CharacterFriend]) -> Result<()>;
    async fn upsert_directive(&self, character_id: &str, directive: &CharacterDirective) -> Result<()>;
    async fn upsert_directive_tree(&self, character_id: &str, tree: &CharacterDirectiveTree) -> Result<()>;
    async fn upsert_directive_tier(&self, character_id: &str, tier: &CharacterDirectiveTier) -> Result<()>;
    async fn upsert_directive_objective(&self, character_id: &str, objective: &CharacterDirectiveObjective) -> Result<()>;
}

/// The local stores the refresh worker reconciles into
#[derive(Clone)]
pub struct LocalStores {
    pub characters: Arc<dyn CharacterStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub stats: Arc<dyn StatStore>,
}

impl LocalStores {
    pub fn new(
        characters: Arc<dyn CharacterStore>,
        metadata: Arc<dyn MetadataStore>,
        stats: Arc<dyn StatStore>,
    ) -> Self {
        Self { characters, metadata, stats }
    }

    /// All three backed by one store
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: CharacterStore + MetadataStore + StatStore + 'static,
    {
        Self {
            characters: store.clone(),
            metadata: store.clone(),
            stats: store,
        }
    }
}
