//! Process-wide session registry: opaque token -> user, with expiry.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::password::random_token;

#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// New token for `user_id`.
    pub fn issue(&self, user_id: &str) -> String {
        let token = random_token();
        let now = Utc::now();
        let session = Session {
            user_id: user_id.to_string(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(token.clone(), session);
        token
    }

    /// Live session for `token`; expired sessions are dropped on sight.
    pub fn lookup(&self, token: &str) -> Option<Session> {
        let now = Utc::now();
        let found = {
            let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            sessions.get(token).cloned()
        }?;
        if found.expires_at <= now {
            self.revoke(token);
            return None;
        }
        Some(found)
    }

    pub fn revoke(&self, token: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(token);
    }

    /// Drop every session of `user_id` (deactivation).
    pub fn revoke_user(&self, user_id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, s| s.user_id != user_id);
    }
}
