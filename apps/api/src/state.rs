use std::sync::Arc;

use crate::collaborators::ProfileServices;
use crate::pipeline::{DraftStore, PipelineSettings};
use crate::sessions::SessionRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    /// Redis-backed when `REDIS_URL` is set, in-memory otherwise.
    pub drafts: Arc<dyn DraftStore>,
    /// Pluggable collaborators. Default: `LlmProfileServices`.
    pub services: Arc<dyn ProfileServices>,
    pub settings: PipelineSettings,
}
