use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::domain::UserId;
use crate::session::state::Session;

/// Explicit per-process session map, keyed by user id and passed into every
/// state-machine call. Each session sits behind its own mutex: events from a
/// single user serialize, turns for different users run in parallel.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub async fn session(&self, user: &UserId) -> Arc<Mutex<Session>> {
        if let Some(existing) = self.sessions.read().await.get(&user.0) {
            return existing.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions.entry(user.0.clone()).or_default().clone()
    }

    /// Drops a session entirely. Idle-expiry policy is a deployment choice;
    /// this is the hook it would call.
    pub async fn remove(&self, user: &UserId) {
        self.sessions.write().await.remove(&user.0);
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
