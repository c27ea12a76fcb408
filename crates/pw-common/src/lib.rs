use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::fmt;

/// Opaque upstream character identifier
pub type CharacterId = String;

/// Game-world partition of the live event feed
pub type ShardId = u16;

// ============================================================================
// Character Types
// ============================================================================

/// Character record as returned by the upstream directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub id: CharacterId,
    pub name: String,
    pub shard_id: ShardId,
    pub faction_id: u16,
    pub outfit_id: Option<String>,
    pub battle_rank: u32,
    /// Last time the character was active upstream
    pub last_login: DateTime<Utc>,
}

/// Local bookkeeping for how fresh a character's cached stats are
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterMetadata {
    pub character_id: CharacterId,
    pub last_updated: DateTime<Utc>,
    /// Consecutive upstream lookups that found nothing
    pub not_found_count: u32,
}

impl CharacterMetadata {
    /// Metadata for a character that has never been reconciled
    pub fn new(character_id: impl Into<CharacterId>) -> Self {
        Self {
            character_id: character_id.into(),
            last_updated: DateTime::<Utc>::MIN_UTC,
            not_found_count: 0,
        }
    }
}

/// A request to bring a character's cached stats up to date
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshRequest {
    pub character_id: CharacterId,
    /// Pre-fetched upstream record, saves the resolve round trip
    pub snapshot: Option<CharacterRecord>,
    /// Skip the freshness check
    pub force: bool,
}

impl RefreshRequest {
    pub fn new(character_id: impl Into<CharacterId>) -> Self {
        Self {
            character_id: character_id.into(),
            snapshot: None,
            force: false,
        }
    }

    pub fn with_snapshot(character: CharacterRecord) -> Self {
        Self {
            character_id: character.id.clone(),
            snapshot: Some(character),
            force: false,
        }
    }

    pub fn forced(character_id: impl Into<CharacterId>) -> Self {
        Self {
            force: true,
            ..Self::new(character_id)
        }
    }
}

// ============================================================================
// Stat Categories
// ============================================================================

/// Per-statistic groupings fetched from upstream and stored locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatCategory {
    WeaponStats,
    HistoryStats,
    Items,
    Stats,
    Friends,
    Directives,
    DirectiveTrees,
    DirectiveTiers,
    DirectiveObjectives,
}

impl StatCategory {
    /// Reconciliation order
    pub const ALL: [StatCategory; 9] = [
        StatCategory::WeaponStats,
        StatCategory::HistoryStats,
        StatCategory::Items,
        StatCategory::Stats,
        StatCategory::Friends,
        StatCategory::Directives,
        StatCategory::DirectiveTrees,
        StatCategory::DirectiveTiers,
        StatCategory::DirectiveObjectives,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatCategory::WeaponStats => "weapon_stats",
            StatCategory::HistoryStats => "history_stats",
            StatCategory::Items => "items",
            StatCategory::Stats => "stats",
            StatCategory::Friends => "friends",
            StatCategory::Directives => "directives",
            StatCategory::DirectiveTrees => "directive_trees",
            StatCategory::DirectiveTiers => "directive_tiers",
            StatCategory::DirectiveObjectives => "directive_objectives",
        }
    }

    /// Part of the directive/tree/tier/objective hierarchy
    pub fn is_directive(&self) -> bool {
        matches!(
            self,
            StatCategory::Directives
                | StatCategory::DirectiveTrees
                | StatCategory::DirectiveTiers
                | StatCategory::DirectiveObjectives
        )
    }
}

impl fmt::Display for StatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponStat {
    pub character_id: CharacterId,
    pub item_id: String,
    pub vehicle_id: String,
    pub kills: i64,
    pub deaths: i64,
    pub shots: i64,
    pub shots_hit: i64,
    pub headshots: i64,
    pub seconds_with: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStat {
    pub character_id: CharacterId,
    pub stat_type: String,
    pub all_time: i64,
    pub one_life_max: i64,
    pub last_save: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterItem {
    pub character_id: CharacterId,
    pub item_id: String,
    pub account_level: bool,
    pub stack_count: Option<u32>,
}

/// Non-history character stat (profile scoped)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseStat {
    pub character_id: CharacterId,
    pub stat_name: String,
    pub profile_id: u32,
    pub value_forever: i64,
    pub value_monthly: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterFriend {
    pub character_id: CharacterId,
    pub friend_id: CharacterId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDirective {
    pub character_id: CharacterId,
    pub directive_id: u32,
    pub tree_id: u32,
    pub completion_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDirectiveTree {
    pub character_id: CharacterId,
    pub tree_id: u32,
    pub current_tier: u32,
    pub completion_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDirectiveTier {
    pub character_id: CharacterId,
    pub tree_id: u32,
    pub tier_id: u32,
    pub completion_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDirectiveObjective {
    pub character_id: CharacterId,
    pub directive_id: u32,
    pub objective_id: u32,
    pub objective_group_id: u32,
    pub status: u32,
    pub state_data: i64,
}

/// Everything fetched for one character in a single refresh pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatBundle {
    pub weapon_stats: Vec<WeaponStat>,
    pub history_stats: Vec<HistoryStat>,
    pub items: Vec<CharacterItem>,
    pub stats: Vec<BaseStat>,
    pub friends: Vec<CharacterFriend>,
    pub directives: Vec<CharacterDirective>,
    pub directive_trees: Vec<CharacterDirectiveTree>,
    pub directive_tiers: Vec<CharacterDirectiveTier>,
    pub directive_objectives: Vec<CharacterDirectiveObjective>,
}

impl StatBundle {
    pub fn len_of(&self, category: StatCategory) -> usize {
        match category {
            StatCategory::WeaponStats => self.weapon_stats.len(),
            StatCategory::HistoryStats => self.history_stats.len(),
            StatCategory::Items => self.items.len(),
            StatCategory::Stats => self.stats.len(),
            StatCategory::Friends => self.friends.len(),
            StatCategory::Directives => self.directives.len(),
            StatCategory::DirectiveTrees => self.directive_trees.len(),
            StatCategory::DirectiveTiers => self.directive_tiers.len(),
            StatCategory::DirectiveObjectives => self.directive_objectives.len(),
        }
    }
}

// ============================================================================
// Stream Health Types
// ============================================================================

/// Class of live event tracked separately for health purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamCategory {
    /// Death events
    Primary,
    /// Experience events
    Secondary,
}

impl StreamCategory {
    pub const ALL: [StreamCategory; 2] = [StreamCategory::Primary, StreamCategory::Secondary];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamCategory::Primary => "primary",
            StreamCategory::Secondary => "secondary",
        }
    }
}

impl fmt::Display for StreamCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Liveness state of one (shard, category) stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHealthEntry {
    pub shard_id: ShardId,
    pub category: StreamCategory,
    pub first_event: DateTime<Utc>,
    pub last_event: Option<DateTime<Utc>>,
    pub failure_count: u32,
    pub event_count: u64,
}

impl StreamHealthEntry {
    pub fn new(shard_id: ShardId, category: StreamCategory, timestamp: DateTime<Utc>) -> Self {
        Self {
            shard_id,
            category,
            first_event: timestamp,
            last_event: Some(timestamp),
            failure_count: 0,
            event_count: 0,
        }
    }

    /// Whole seconds since the last event, never negative
    pub fn seconds_without_event(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_event.map(|last| (now - last).num_seconds().max(0))
    }
}

/// Recorded once each time a degraded stream starts producing events again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectRecord {
    pub shard_id: ShardId,
    pub category: StreamCategory,
    pub duration_without_event_secs: i64,
    pub event_count: u64,
    pub failure_count: u32,
    pub timestamp: DateTime<Utc>,
}

/// Human readable note about a stream that was unhealthy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthAlert {
    pub id: String,
    pub when: DateTime<Utc>,
    pub what: String,
}

impl HealthAlert {
    pub fn new(when: DateTime<Utc>, what: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            when,
            what,
        }
    }

    pub fn for_reconnect(record: &ReconnectRecord, event_time: DateTime<Utc>) -> Self {
        Self::new(
            event_time,
            format!(
                "Shard {}'s {} stream was {}s without an event, failed {} times before reconnect, had {} events on the stream",
                record.shard_id,
                record.category,
                record.duration_without_event_secs,
                record.failure_count,
                record.event_count,
            ),
        )
    }
}
