//! In-memory registry of live pipeline sessions.
//!
//! Each controller sits behind its own `tokio::sync::Mutex`. Handlers use
//! `try_lock`, so a request that arrives while another one is still advancing the
//! same session is refused instead of queued.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use crate::errors::AppError;
use crate::pipeline::PipelineController;

pub type SharedSession = Arc<Mutex<PipelineController>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new controller. A session that is already live is never replaced.
    pub async fn insert(&self, controller: PipelineController) -> Result<SharedSession, AppError> {
        let id = controller.id();
        match self.sessions.write().await.entry(id) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!("session {id} is already active"))),
            Entry::Vacant(slot) => Ok(Arc::clone(slot.insert(Arc::new(Mutex::new(controller))))),
        }
    }

    pub async fn find(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn get(&self, id: Uuid) -> Result<SharedSession, AppError> {
        self.find(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("session {id}")))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Locks a session without waiting. Another request holding the lock means a phase
/// transition is in flight.
pub fn lock_now(session: &SharedSession) -> Result<MutexGuard<'_, PipelineController>, AppError> {
    session
        .try_lock()
        .map_err(|_| AppError::Conflict("another request is still updating this session".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::fake::{controller, FakeServices};

    #[tokio::test]
    async fn test_insert_and_get() {
        let registry = SessionRegistry::new();
        let session = registry.insert(controller(Arc::new(FakeServices::default()))).await.unwrap();
        let id = session.lock().await.id();
        assert!(registry.get(id).await.is_ok());
        assert!(matches!(registry.get(Uuid::new_v4()).await, Err(AppError::NotFound(_))));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_live_session_is_never_replaced() {
        let registry = SessionRegistry::new();
        let services = Arc::new(FakeServices::default());
        let first = registry.insert(controller(services.clone())).await.unwrap();
        let id = first.lock().await.id();

        let twin = PipelineController::new(id, services, Default::default());
        assert!(matches!(registry.insert(twin).await, Err(AppError::Conflict(_))));
        let live = registry.find(id).await.unwrap();
        assert!(Arc::ptr_eq(&live, &first));
    }

    #[tokio::test]
    async fn test_second_lock_is_a_conflict() {
        let registry = SessionRegistry::new();
        let session = registry.insert(controller(Arc::new(FakeServices::default()))).await.unwrap();
        let _held = lock_now(&session).unwrap();
        assert!(matches!(lock_now(&session), Err(AppError::Conflict(_))));
    }
}
