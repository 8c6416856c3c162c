//! The session registry: one `Session` per `(user_id, credential_id)` pair.
//! Insertion/removal is serialized through a single registry lock; reads
//! and in-place mutation of a given session go through that session's own
//! lock instead, so concurrent order submissions for different users never
//! contend on the registry lock.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use sfp_types::session::Session;

pub type SessionKey = (String, String);

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, Arc<RwLock<Session>>>,
    registry_lock: Mutex<()>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: &str, credential_id: &str, session: Session) {
        let _guard = self.registry_lock.lock();
        self.sessions
            .insert((user_id.to_string(), credential_id.to_string()), Arc::new(RwLock::new(session)));
    }

    pub fn remove(&self, user_id: &str, credential_id: &str) -> bool {
        let _guard = self.registry_lock.lock();
        self.sessions.remove(&(user_id.to_string(), credential_id.to_string())).is_some()
    }

    pub fn get(&self, user_id: &str, credential_id: &str) -> Option<Arc<RwLock<Session>>> {
        self.sessions
            .get(&(user_id.to_string(), credential_id.to_string()))
            .map(|e| e.value().clone())
    }

    pub fn list_for_user(&self, user_id: &str) -> Vec<Session> {
        self.sessions
            .iter()
            .filter(|e| e.key().0 == user_id)
            .map(|e| e.value().read().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfp_types::session::{EncryptedCredentials, SessionHealth};

    fn sample_session(user_id: &str, credential_id: &str) -> Session {
        Session {
            session_id: "s1".into(),
            user_id: user_id.into(),
            credential_id: credential_id.into(),
            broker_type: "paper".into(),
            credentials: EncryptedCredentials { ciphertext: vec![] },
            access_token: None,
            refresh_token: None,
            last_activity_millis: 0,
            error_count: 0,
            health: SessionHealth::Healthy,
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let reg = SessionRegistry::new();
        reg.insert("u1", "c1", sample_session("u1", "c1"));
        assert!(reg.get("u1", "c1").is_some());
        assert!(reg.get("u1", "c2").is_none());
    }

    #[test]
    fn remove_reports_whether_something_was_removed() {
        let reg = SessionRegistry::new();
        reg.insert("u1", "c1", sample_session("u1", "c1"));
        assert!(reg.remove("u1", "c1"));
        assert!(!reg.remove("u1", "c1"));
    }

    #[test]
    fn list_for_user_only_returns_that_users_sessions() {
        let reg = SessionRegistry::new();
        reg.insert("u1", "c1", sample_session("u1", "c1"));
        reg.insert("u2", "c1", sample_session("u2", "c1"));
        let sessions = reg.list_for_user("u1");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].user_id, "u1");
    }
}
