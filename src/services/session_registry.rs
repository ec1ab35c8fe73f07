use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::intake_service::{IntakeService, IntakeWorkflow};

pub type SharedWorkflow = Arc<Mutex<IntakeWorkflow>>;

struct SessionEntry {
    workflow: SharedWorkflow,
    last_seen: DateTime<Utc>,
}

/// Open registration forms, one workflow per form instance.
///
/// Each workflow sits behind its own mutex, so a form runs one operation at a time
/// while different forms never contend with each other.
#[derive(Clone)]
pub struct IntakeSessions {
    service: IntakeService,
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    ttl: Duration,
    max_sessions: usize,
}

impl IntakeSessions {
    pub fn new(service: IntakeService, ttl_secs: i64, max_sessions: usize) -> Self {
        Self {
            service,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs.max(60)),
            max_sessions: max_sessions.max(1),
        }
    }

    pub async fn create(&self) -> AppResult<(Uuid, SharedWorkflow)> {
        self.create_at(Utc::now()).await
    }

    /// Opens a form, sweeping idle ones first when the registry is full.
    pub(crate) async fn create_at(&self, now: DateTime<Utc>) -> AppResult<(Uuid, SharedWorkflow)> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            sessions.retain(|_, entry| now.signed_duration_since(entry.last_seen) < self.ttl);
            if sessions.len() >= self.max_sessions {
                log::warn!("Intake session limit reached ({})", self.max_sessions);
                return Err(AppError::Unavailable(
                    "Too many open registration forms, please try again later".to_string(),
                ));
            }
        }

        let id = Uuid::new_v4();
        let workflow = Arc::new(Mutex::new(self.service.new_workflow()));
        sessions.insert(
            id,
            SessionEntry {
                workflow: workflow.clone(),
                last_seen: now,
            },
        );
        log::debug!("Intake session opened: {}", id);
        Ok((id, workflow))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<SharedWorkflow> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Intake session {} not found", id)))?;
        entry.last_seen = Utc::now();
        Ok(entry.workflow.clone())
    }

    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| log::debug!("Intake session closed: {}", id))
            .ok_or_else(|| AppError::NotFound(format!("Intake session {} not found", id)))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops forms idle for longer than the TTL. Returns how many were removed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now.signed_duration_since(entry.last_seen) < self.ttl);
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntakeConfig;
    use crate::models::LeadField;
    use crate::services::intake_service::tests::{FakeStore, FakeVerifier, service_with};

    fn sessions() -> IntakeSessions {
        let service = service_with(
            IntakeConfig::default(),
            Arc::new(FakeVerifier::default()),
            Arc::new(FakeStore::default()),
        );
        IntakeSessions::new(service, 600, 100)
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let sessions = sessions();
        let (a, _) = sessions.create().await.unwrap();
        let (b, _) = sessions.create().await.unwrap();

        sessions
            .get(a)
            .await
            .unwrap()
            .lock()
            .await
            .update_field(LeadField::Name, "Asha")
            .await;

        let b_form = sessions.get(b).await.unwrap();
        assert_eq!(b_form.lock().await.draft().name, "");
        let a_form = sessions.get(a).await.unwrap();
        assert_eq!(a_form.lock().await.draft().name, "Asha");
    }

    #[tokio::test]
    async fn test_remove_and_missing_session() {
        let sessions = sessions();
        let (id, _) = sessions.create().await.unwrap();
        sessions.remove(id).await.unwrap();
        assert!(matches!(sessions.get(id).await, Err(AppError::NotFound(_))));
        assert!(sessions.remove(id).await.is_err());
        assert!(sessions.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let sessions = sessions();
        let (stale, _) = sessions.create().await.unwrap();
        sessions.create().await.unwrap();

        let later = Utc::now() + Duration::seconds(601);
        sessions.get(stale).await.unwrap();
        assert_eq!(sessions.sweep_expired(later).await, 2);
        assert!(sessions.is_empty().await);

        sessions.create().await.unwrap();
        assert_eq!(sessions.sweep_expired(Utc::now()).await, 0);
        assert_eq!(sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_session_limit_rejects_until_idle_forms_expire() {
        let service = service_with(
            IntakeConfig::default(),
            Arc::new(FakeVerifier::default()),
            Arc::new(FakeStore::default()),
        );
        let sessions = IntakeSessions::new(service, 600, 2);
        let now = Utc::now();
        sessions.create_at(now).await.unwrap();
        sessions.create_at(now).await.unwrap();

        let err = sessions.create_at(now).await.err().unwrap();
        assert!(matches!(err, AppError::Unavailable(_)));
        assert_eq!(sessions.len().await, 2);

        // Both forms idle past the TTL make room again
        let later = now + Duration::seconds(601);
        sessions.create_at(later).await.unwrap();
        assert_eq!(sessions.len().await, 1);
    }
}
