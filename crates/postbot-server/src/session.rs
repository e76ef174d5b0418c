use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use postbot_kernel::SessionState;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slot = Arc<Mutex<Option<SessionState>>>;

struct SlotEntry {
    slot: Slot,
    last_seen: Instant,
}

/// One state slot per session. Holding a [`SessionGuard`] keeps other turns
/// of the same session waiting; different sessions never contend beyond the
/// brief map lookup.
pub struct SessionStore {
    idle_timeout: Duration,
    slots: Mutex<HashMap<String, SlotEntry>>,
}

pub struct SessionGuard {
    session_id: String,
    state: OwnedMutexGuard<Option<SessionState>>,
}

impl SessionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn get(&self) -> Option<SessionState> {
        *self.state
    }

    pub fn set(&mut self, state: SessionState) {
        *self.state = Some(state);
    }

    pub fn clear(&mut self) {
        *self.state = None;
    }
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn lock(&self, session_id: &str) -> SessionGuard {
        let slot = {
            let mut slots = self.slots.lock().await;
            let now = Instant::now();
            // Drop sessions nobody holds and nobody has touched for a while.
            slots.retain(|id, entry| {
                id == session_id
                    || Arc::strong_count(&entry.slot) > 1
                    || now.duration_since(entry.last_seen) < self.idle_timeout
            });
            let entry = slots
                .entry(session_id.to_string())
                .or_insert_with(|| SlotEntry {
                    slot: Arc::new(Mutex::new(None)),
                    last_seen: now,
                });
            entry.last_seen = now;
            entry.slot.clone()
        };
        SessionGuard {
            session_id: session_id.to_string(),
            state: slot.lock_owned().await,
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionState> {
        let slot = {
            let slots = self.slots.lock().await;
            slots.get(session_id).map(|entry| entry.slot.clone())
        };
        match slot {
            Some(slot) => *slot.lock().await,
            None => None,
        }
    }

    pub async fn set(&self, session_id: &str, state: SessionState) {
        self.lock(session_id).await.set(state);
    }

    pub async fn clear(&self, session_id: &str) {
        self.lock(session_id).await.clear();
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}
