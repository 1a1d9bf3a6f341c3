use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::workflow::session::Session;

/// A session shared between concurrent requests. Never hold the lock across an await.
pub type SessionHandle = Arc<Mutex<Session>>;

/// In-memory session registry. Sessions live until deleted or evicted as idle.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, owner: &str) -> SessionHandle {
        let session = Session::owned_by(owner);
        let id = session.id();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().insert(id, handle.clone());
        info!("Created session {id}");
        handle
    }

    pub fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.read().get(&id).cloned()
    }

    /// Removes a session and cancels anything it still has in flight.
    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().remove(&id);
        match removed {
            Some(handle) => {
                handle.lock().cancel_in_flight();
                info!("Closed session {id}");
                true
            }
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Removes every session untouched for at least `ttl`. Returns how many went.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let expired: Vec<Uuid> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, handle)| handle.lock().idle_for() >= ttl)
            .map(|(id, _)| *id)
            .collect();

        let evicted = expired.into_iter().filter(|id| self.remove(*id)).count();
        if evicted > 0 {
            info!("Evicted {evicted} idle sessions");
        }
        evicted
    }

    /// Runs `evict_idle` every `every` until the runtime shuts down.
    pub fn spawn_sweeper(&self, ttl: Duration, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle(ttl);
                debug!("Session sweep: {evicted} evicted, {} live", store.count());
            }
        })
    }
}
