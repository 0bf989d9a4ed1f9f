//! In-memory session and contact store.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use noorah_models::{EmergencyContact, GuardianSession, SessionId, MAX_EMERGENCY_CONTACTS};
use tokio::sync::RwLock;
use validator::Validate;

use crate::error::{GuardianError, GuardianResult};

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, GuardianSession>,
    /// user_id -> their non-terminal session
    live_by_user: HashMap<String, SessionId>,
    contacts: HashMap<String, Vec<EmergencyContact>>,
}

/// Guardian sessions and emergency contacts. At most one non-terminal session
/// per user.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly started session.
    pub async fn insert(&self, session: GuardianSession) -> GuardianResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.live_by_user.get(&session.user_id) {
            return Err(GuardianError::SessionAlreadyActive(existing.to_string()));
        }
        if !session.is_terminal() {
            inner.live_by_user.insert(session.user_id.clone(), session.id.clone());
        }
        inner.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    pub async fn get(&self, id: &SessionId) -> Option<GuardianSession> {
        self.inner.read().await.sessions.get(id).cloned()
    }

    /// The user's non-terminal session, if any.
    pub async fn current_for_user(&self, user_id: &str) -> Option<GuardianSession> {
        let inner = self.inner.read().await;
        inner
            .live_by_user
            .get(user_id)
            .and_then(|id| inner.sessions.get(id))
            .cloned()
    }

    /// Apply `f` to a session under the write lock and return its result along
    /// with the updated session.
    pub async fn update<T, F>(&self, id: &SessionId, f: F) -> GuardianResult<(T, GuardianSession)>
    where
        F: FnOnce(&mut GuardianSession) -> GuardianResult<T>,
    {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or_else(|| GuardianError::not_found(id.as_str()))?;

        let out = f(session)?;
        let snapshot = session.clone();

        if snapshot.is_terminal() {
            let owned = inner.live_by_user.get(&snapshot.user_id) == Some(&snapshot.id);
            if owned {
                inner.live_by_user.remove(&snapshot.user_id);
            }
        }
        Ok((out, snapshot))
    }

    /// IDs of every non-terminal session.
    pub async fn live_session_ids(&self) -> Vec<SessionId> {
        self.inner.read().await.live_by_user.values().cloned().collect()
    }

    pub async fn live_count(&self) -> usize {
        self.inner.read().await.live_by_user.len()
    }

    /// Drop ended sessions that finished before `cutoff`. Returns how many were removed.
    pub async fn prune_ended(&self, cutoff: DateTime<Utc>) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|_, s| !(s.is_terminal() && s.ended_at.map_or(false, |at| at < cutoff)));
        before - inner.sessions.len()
    }

    pub async fn contacts(&self, user_id: &str) -> Vec<EmergencyContact> {
        self.inner
            .read()
            .await
            .contacts
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace a user's contacts after validating every entry.
    pub async fn set_contacts(
        &self,
        user_id: &str,
        mut contacts: Vec<EmergencyContact>,
    ) -> GuardianResult<Vec<EmergencyContact>> {
        if contacts.len() > MAX_EMERGENCY_CONTACTS {
            return Err(GuardianError::Validation(format!(
                "at most {} emergency contacts are allowed",
                MAX_EMERGENCY_CONTACTS
            )));
        }
        let mut seen = HashSet::with_capacity(contacts.len());
        for contact in &contacts {
            contact.validate()?;
            if !seen.insert(&contact.id) {
                return Err(GuardianError::Validation(format!(
                    "duplicate contact id {}",
                    contact.id
                )));
            }
        }
        contacts.sort_by_key(|c| c.priority);

        self.inner
            .write()
            .await
            .contacts
            .insert(user_id.to_string(), contacts.clone());
        Ok(contacts)
    }

    /// Liveness probe for readiness checks.
    pub async fn ping(&self) -> bool {
        let _guard = self.inner.read().await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardianConfig;
    use crate::state_machine::{self, StartSession};
    use chrono::Duration;

    fn start(user: &str) -> GuardianSession {
        state_machine::start(StartSession::new(user), &GuardianConfig::default(), Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_one_live_session_per_user() {
        let registry = SessionRegistry::new();
        let first = start("sitter-1");
        registry.insert(first.clone()).await.unwrap();

        let err = registry.insert(start("sitter-1")).await.unwrap_err();
        assert!(matches!(err, GuardianError::SessionAlreadyActive(_)));

        // Other users are unaffected
        registry.insert(start("sitter-2")).await.unwrap();
        assert_eq!(registry.live_count().await, 2);

        let current = registry.current_for_user("sitter-1").await.unwrap();
        assert_eq!(current.id, first.id);
    }

    #[tokio::test]
    async fn test_ending_frees_the_user_slot() {
        let registry = SessionRegistry::new();
        let session = start("sitter-1");
        let id = session.id.clone();
        registry.insert(session).await.unwrap();

        let (events, ended) = registry
            .update(&id, |s| state_machine::end(s, Utc::now()))
            .await
            .unwrap();
        assert!(events.is_empty());
        assert!(ended.is_terminal());
        assert!(registry.current_for_user("sitter-1").await.is_none());
        assert!(registry.get(&id).await.is_some());

        registry.insert(start("sitter-1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_unknown_session() {
        let registry = SessionRegistry::new();
        let result = registry
            .update(&SessionId::from_string("missing"), |_| Ok(()))
            .await;
        assert!(matches!(result, Err(GuardianError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_prune_ended() {
        let registry = SessionRegistry::new();
        let session = start("sitter-1");
        let id = session.id.clone();
        registry.insert(session).await.unwrap();
        registry
            .update(&id, |s| state_machine::end(s, Utc::now() - Duration::hours(48)))
            .await
            .unwrap();

        assert_eq!(registry.prune_ended(Utc::now() - Duration::hours(24)).await, 1);
        assert!(registry.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_set_contacts_validates_and_sorts() {
        let registry = SessionRegistry::new();
        let contacts = vec![
            EmergencyContact::with_phone("Backup", "+14155550101").priority(3),
            EmergencyContact::with_phone("Primary", "+14155550100"),
        ];
        let saved = registry.set_contacts("parent-1", contacts).await.unwrap();
        assert_eq!(saved[0].name, "Primary");
        assert_eq!(registry.contacts("parent-1").await.len(), 2);

        let bad = vec![EmergencyContact::with_phone("", "+14155550100")];
        assert!(matches!(
            registry.set_contacts("parent-1", bad).await,
            Err(GuardianError::Validation(_))
        ));

        let too_many = (0..=MAX_EMERGENCY_CONTACTS)
            .map(|i| EmergencyContact::with_phone(format!("C{i}"), "+14155550100"))
            .collect();
        assert!(registry.set_contacts("parent-1", too_many).await.is_err());
        // Failed writes leave the previous list alone
        assert_eq!(registry.contacts("parent-1").await.len(), 2);
    }

    #[tokio::test]
    async fn test_set_contacts_rejects_duplicate_ids() {
        let registry = SessionRegistry::new();
        let first = EmergencyContact::with_phone("Mum", "+14155550100");
        let mut second = EmergencyContact::with_phone("Dad", "+14155550101");
        second.id = first.id.clone();

        let err = registry
            .set_contacts("parent-1", vec![first, second])
            .await
            .unwrap_err();
        assert!(matches!(err, GuardianError::Validation(msg) if msg.contains("duplicate")));
        assert!(registry.contacts("parent-1").await.is_empty());
    }
}
