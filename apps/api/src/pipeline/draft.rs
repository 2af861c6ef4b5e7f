//! Drafts: the persisted `{document, phase, extras}` triple a session can be
//! rehydrated from. The pipeline never stores anything itself; the HTTP layer saves
//! a draft after each successful mutation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::collaborators::{ProfileType, ScoreReport};
use crate::dialogue::orchestrator::QuestionOrchestrator;
use crate::pipeline::phase::Phase;
use crate::profile::diff::DiffReview;
use crate::profile::document::ProfileDocument;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("draft is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Everything besides document and phase needed to resume without repeating work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftExtras {
    #[serde(default)]
    pub profile_type: Option<ProfileType>,
    #[serde(default)]
    pub improve_loops: u32,
    /// Unanswered questions of the current phase, asked texts and collected answers.
    #[serde(default)]
    pub queue: QuestionOrchestrator,
    /// An improve result still waiting for accept/reject.
    #[serde(default)]
    pub pending_review: Option<DiffReview>,
    #[serde(default)]
    pub last_score: Option<ScoreReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: Uuid,
    pub document: ProfileDocument,
    pub phase: Phase,
    #[serde(default)]
    pub extras: DraftExtras,
    pub saved_at: DateTime<Utc>,
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save(&self, draft: &Draft) -> Result<(), DraftError>;
    async fn load(&self, id: Uuid) -> Result<Option<Draft>, DraftError>;
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store (default when no Redis URL is configured)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<Uuid, Draft>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn save(&self, draft: &Draft) -> Result<(), DraftError> {
        self.drafts.write().await.insert(draft.id, draft.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<Draft>, DraftError> {
        Ok(self.drafts.read().await.get(&id).cloned())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis store
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisDraftStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisDraftStore {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }

    fn key(id: Uuid) -> String {
        format!("cvflow:draft:{id}")
    }
}

#[async_trait]
impl DraftStore for RedisDraftStore {
    async fn save(&self, draft: &Draft) -> Result<(), DraftError> {
        let json = serde_json::to_string(draft)?;
        let mut con = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("SET")
            .arg(Self::key(draft.id))
            .arg(json)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async::<_, ()>(&mut con)
            .await?;
        debug!(draft_id = %draft.id, phase = %draft.phase, "draft saved to redis");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<Draft>, DraftError> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let json: Option<String> = redis::cmd("GET").arg(Self::key(id)).query_async(&mut con).await?;
        json.map(|j| serde_json::from_str(&j)).transpose().map_err(DraftError::from)
    }
}
