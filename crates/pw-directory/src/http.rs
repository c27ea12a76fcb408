//! HTTP directory client
//!
//! - `GET {base}/characters/{id}` resolves a character, 404 means not found
//! - `GET {base}/characters/{id}/{category}` returns a JSON array of entries

use std::time::Duration;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use pw_common::{
    BaseStat, CharacterDirective, CharacterDirectiveObjective, CharacterDirectiveTier,
    CharacterDirectiveTree, CharacterFriend, CharacterItem, CharacterRecord, HistoryStat,
    StatCategory, WeaponStat,
};
use pw_config::DirectoryConfig;
use crate::{CharacterDirectory, DirectoryError, Result};

pub struct HttpDirectory {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpDirectory {
    pub fn new(config: &DirectoryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DirectoryError::Other(e.to_string()))?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| DirectoryError::Other(format!("Invalid directory URL {}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::Other(format!("Invalid directory URL {}", config.base_url)));
        }

        Ok(Self { base_url, client })
    }

    /// `{base}/characters/{id}[/{category}]` with the ID percent-encoded as one segment
    fn character_url(&self, character_id: &str, category: Option<StatCategory>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| DirectoryError::Other(format!("Invalid directory URL {}", self.base_url)))?;
            segments.pop_if_empty().push("characters").push(character_id);
            if let Some(category) = category {
                segments.push(category.as_str());
            }
        }
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response> {
        self.client.get(url).send().await.map_err(classify)
    }

    async fn fetch_list<T: DeserializeOwned>(&self, character_id: &str, category: StatCategory) -> Result<Vec<T>> {
        let url = self.character_url(character_id, Some(category))?;
        let response = self.get(url.clone()).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(character_id = %character_id, category = %category, "No entries upstream");
            return Ok(Vec::new());
        }
        check_status(status, url.as_str())?;

        response.json::<Vec<T>>().await.map_err(classify)
    }
}

fn check_status(status: StatusCode, url: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    let message = format!("{} returned {}", url, status);
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT | StatusCode::SERVICE_UNAVAILABLE => {
            Err(DirectoryError::Timeout(message))
        }
        _ => Err(DirectoryError::Other(message)),
    }
}

fn classify(e: reqwest::Error) -> DirectoryError {
    if e.is_timeout() || e.is_connect() {
        DirectoryError::Timeout(e.to_string())
    } else {
        DirectoryError::Other(e.to_string())
    }
}

#[async_trait]
impl CharacterDirectory for HttpDirectory {
    async fn resolve_character(&self, character_id: &str) -> Result<Option<CharacterRecord>> {
        let url = self.character_url(character_id, None)?;
        let response = self.get(url.clone()).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(status, url.as_str())?;

        response.json::<CharacterRecord>().await.map(Some).map_err(classify)
    }

    async fn weapon_stats(&self, character_id: &str) -> Result<Vec<WeaponStat>> {
        self.fetch_list(character_id, StatCategory::WeaponStats).await
    }

    async fn history_stats(&self, character_id: &str) -> Result<Vec<HistoryStat>> {
        self.fetch_list(character_id, StatCategory::HistoryStats).await
    }

    async fn items(&self, character_id: &str) -> Result<Vec<CharacterItem>> {
        self.fetch_list(character_id, StatCategory::Items).await
    }

    async fn stats(&self, character_id: &str) -> Result<Vec<BaseStat>> {
        self.fetch_list(character_id, StatCategory::Stats).await
    }

    async fn friends(&self, character_id: &str) -> Result<Vec<CharacterFriend>> {
        self.fetch_list(character_id, StatCategory::Friends).await
    }

    async fn directives(&self, character_id: &str) -> Result<Vec<CharacterDirective>> {
        self.fetch_list(character_id, StatCategory::Directives).await
    }

    async fn directive_trees(&self, character_id: &str) -> Result<Vec<CharacterDirectiveTree>> {
        self.fetch_list(character_id, StatCategory::DirectiveTrees).await
    }

    async fn directive_tiers(&self, character_id: &str) -> Result<Vec<CharacterDirectiveTier>> {
        self.fetch_list(character_id, StatCategory::DirectiveTiers).await
    }

    async fn directive_objectives(&self, character_id: &str) -> Result<Vec<CharacterDirectiveObjective>> {
        self.fetch_list(character_id, StatCategory::DirectiveObjectives).await
    }
}
