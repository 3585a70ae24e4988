use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::TargetConfig;
use crate::transfer::session::{Connector, Session, Ssh2Connector};

/// Owns every [`Session`], keyed by target name. At most one session ever
/// exists per name; lookup-or-insert is serialized so a race cannot open a
/// second connection to the same target. The registry is an explicit owned
/// value — callers pass it by reference, there is no process-global state.
pub struct SessionRegistry {
    sessions: Mutex<BTreeMap<String, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry { sessions: Mutex::new(BTreeMap::new()) }
    }

    /// Pure lookup. `None` means no session was ever registered for `name`,
    /// which the orchestrator reads as "must initialize before uploading".
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<Session>>> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.get(name).cloned()
    }

    /// Insert-if-absent and return the (existing or new) session. Repeated
    /// calls never replace a stored target: first registration wins for the
    /// registry's lifetime.
    pub fn get_or_create(&self, name: &str, target: TargetConfig) -> Arc<Mutex<Session>> {
        self.get_or_create_with(name, target, Box::new(Ssh2Connector))
    }

    /// Same as [`get_or_create`](Self::get_or_create) with an injected
    /// connector (test seam).
    pub fn get_or_create_with(
        &self,
        name: &str,
        target: TargetConfig,
        connector: Box<dyn Connector>,
    ) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(target, connector))))
            .clone()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
