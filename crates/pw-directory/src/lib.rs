//! Upstream character directory
//!
//! The directory is the authoritative source of character records and
//! per-category statistics. Every call returns a tagged `DirectoryError`
//! so callers can tell a transient timeout from any other failure.

pub mod http;

use async_trait::async_trait;
use pw_common::{
    BaseStat, CharacterDirective, CharacterDirectiveObjective, CharacterDirectiveTier,
    CharacterDirectiveTree, CharacterFriend, CharacterItem, CharacterRecord, HistoryStat,
    WeaponStat,
};

pub use http::HttpDirectory;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// Connection or request timed out; worth retrying later
    #[error("Upstream timeout: {0}")]
    Timeout(String),

    #[error("Upstream error: {0}")]
    Other(String),
}

impl DirectoryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DirectoryError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

#[async_trait]
pub trait CharacterDirectory: Send + Sync {
    /// `None` when upstream has no such character
    async fn resolve_character(&self, character_id: &str) -> Result<Option<CharacterRecord>>;

    async fn weapon_stats(&self, character_id: &str) -> Result<Vec<WeaponStat>>;
    async fn history_stats(&self, character_id: &str) -> Result<Vec<HistoryStat>>;
    async fn items(&self, character_id: &str) -> Result<Vec<CharacterItem>>;
    async fn stats(&self, character_id: &str) -> Result<Vec<BaseStat>>;
    async fn friends(&self, character_id: &str) -> Result<Vec<CharacterFriend>>;
    async fn directives(&self, character_id: &str) -> Result<Vec<CharacterDirective>>;
    async fn directive_trees(&self, character_id: &str) -> Result<Vec<CharacterDirectiveTree>>;
    async fn directive_tiers(&self, character_id: &str) -> Result<Vec<CharacterDirectiveTier>>;
    async fn directive_objectives(&self, character_id: &str) -> Result<Vec<CharacterDirectiveObjective>>;
}
