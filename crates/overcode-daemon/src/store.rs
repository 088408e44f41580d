//! Session Store — the single source of truth for agent identity,
//! hierarchy, budgets, and accumulated stats. Persisted as one
//! atomically-rewritten JSON file; readers tolerate a missing or malformed
//! file, writers serialize within a process behind a mutex.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use overcode_core::depth::{compute_depth, validate_launch_depth};
use overcode_core::interfaces::Filesystem;
use overcode_core::types::Session;
use overcode_core::CoreError;

use crate::error::DaemonError;

/// The exact on-disk shape of `sessions.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionsDocument {
    #[serde(default)]
    sessions: HashMap<String, Session>,
    #[serde(default)]
    archived: HashMap<String, Session>,
}

pub struct SessionStore {
    inner: Mutex<SessionsDocument>,
}

impl SessionStore {
    pub fn empty() -> Self {
        SessionStore { inner: Mutex::new(SessionsDocument::default()) }
    }

    /// Tolerant of a missing or malformed file — both cases log a warning
    /// and start from an empty store rather than propagating an error up
    /// into the Monitor Loop.
    pub fn load_or_default(fs: &impl Filesystem, path: &str) -> Self {
        let contents = match fs.read_to_string(path) {
            Ok(Some(contents)) => contents,
            Ok(None) => return Self::empty(),
            Err(e) => {
                tracing::warn!(%e, path, "failed to read session store, starting empty");
                return Self::empty();
            }
        };

        match serde_json::from_str::<SessionsDocument>(&contents) {
            Ok(doc) => SessionStore { inner: Mutex::new(doc) },
            Err(e) => {
                tracing::warn!(%e, path, "malformed session store, starting empty");
                Self::empty()
            }
        }
    }

    pub fn persist(&self, fs: &impl Filesystem, path: &str) -> Result<(), DaemonError> {
        let guard = self.inner.lock().expect("session store mutex poisoned");
        let bytes = serde_json::to_vec_pretty(&*guard)?;
        fs.write_atomic(path, &bytes)?;
        Ok(())
    }

    /// Re-reads `path` and swaps it in as the in-memory document, tolerant
    /// of a missing/malformed file exactly like [`Self::load_or_default`].
    /// The Monitor Loop, the web control surface, and every CLI mutation
    /// each run in their own process but share this one file — without a
    /// reload immediately before acting, a process
    /// that has been alive for more than one tick would act on a stale
    /// snapshot and silently clobber a sibling process's writes on its next
    /// `persist`.
    pub fn reload(&self, fs: &impl Filesystem, path: &str) {
        let contents = match fs.read_to_string(path) {
            Ok(Some(contents)) => contents,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(%e, path, "failed to reload session store, keeping in-memory copy");
                return;
            }
        };

        match serde_json::from_str::<SessionsDocument>(&contents) {
            Ok(doc) => {
                let mut guard = self.inner.lock().expect("session store mutex poisoned");
                *guard = doc;
            }
            Err(e) => {
                tracing::warn!(%e, path, "malformed session store on reload, keeping in-memory copy");
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        self.inner.lock().expect("session store mutex poisoned").sessions.get(id).cloned()
    }

    pub fn find_by_name(&self, name: &str, tmux_session: &str) -> Option<Session> {
        self.inner
            .lock()
            .expect("session store mutex poisoned")
            .sessions
            .values()
            .find(|s| s.name == name && s.tmux_session == tmux_session)
            .cloned()
    }

    pub fn list_for_tmux_session(&self, tmux_session: &str) -> Vec<Session> {
        self.inner
            .lock()
            .expect("session store mutex poisoned")
            .sessions
            .values()
            .filter(|s| s.tmux_session == tmux_session)
            .cloned()
            .collect()
    }

    pub fn list_all(&self) -> Vec<Session> {
        self.inner.lock().expect("session store mutex poisoned").sessions.values().cloned().collect()
    }

    pub fn list_children(&self, parent_id: &str) -> Vec<Session> {
        self.inner
            .lock()
            .expect("session store mutex poisoned")
            .sessions
            .values()
            .filter(|s| s.parent_session_id.as_deref() == Some(parent_id))
            .cloned()
            .collect()
    }

    /// Insert a brand-new session, enforcing the depth bound and rejecting
    /// a dangling `parent_session_id`.
    pub fn insert_new(&self, session: Session) -> Result<(), DaemonError> {
        let mut guard = self.inner.lock().expect("session store mutex poisoned");

        if let Some(parent_id) = &session.parent_session_id {
            if !guard.sessions.contains_key(parent_id) {
                return Err(CoreError::UnknownParent(parent_id.clone()).into());
            }
            let parent_depth = compute_depth(parent_id, |id| guard.sessions.get(id).and_then(|s| s.parent_session_id.clone()))?;
            validate_launch_depth(parent_depth)?;
        }

        guard.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    /// Read-modify-write critical section: the only way callers should
    /// mutate a session, so the last write wins without losing unrelated
    /// fields written by a concurrent in-process caller.
    pub fn with_session_mut<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, DaemonError> {
        let mut guard = self.inner.lock().expect("session store mutex poisoned");
        let session = guard.sessions.get_mut(id).ok_or_else(|| DaemonError::SessionNotFound(id.to_string()))?;
        Ok(f(session))
    }

    /// Move a session from the live set into `archived`.
    pub fn archive(&self, id: &str) -> Result<(), DaemonError> {
        let mut guard = self.inner.lock().expect("session store mutex poisoned");
        let session = guard.sessions.remove(id).ok_or_else(|| DaemonError::SessionNotFound(id.to_string()))?;
        guard.archived.insert(id.to_string(), session);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<(), DaemonError> {
        let mut guard = self.inner.lock().expect("session store mutex poisoned");
        guard.sessions.remove(id);
        guard.archived.remove(id);
        Ok(())
    }

    /// Universal cycle/depth invariants, checked over the whole store.
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        let guard = self.inner.lock().expect("session store mutex poisoned");
        for id in guard.sessions.keys() {
            let depth = compute_depth(id, |pid| guard.sessions.get(pid).and_then(|s| s.parent_session_id.clone()))?;
            if depth > overcode_core::types::MAX_SESSION_DEPTH {
                return Err(CoreError::DepthExceeded {
                    name: id.clone(),
                    depth,
                    max: overcode_core::types::MAX_SESSION_DEPTH,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use overcode_core::types::{LifecycleStatus, OversightPolicy, PermissivenessMode, SessionStats};
    use tempfile::tempdir;

    struct FakeFs;
    impl Filesystem for FakeFs {
        fn write_atomic(&self, _path: &str, _contents: &[u8]) -> Result<(), overcode_core::interfaces::FsError> {
            Ok(())
        }
        fn append_line(&self, _path: &str, _line: &str) -> Result<(), overcode_core::interfaces::FsError> {
            Ok(())
        }
        fn touch(&self, _path: &str) -> Result<(), overcode_core::interfaces::FsError> {
            Ok(())
        }
        fn read_to_string(&self, _path: &str) -> Result<Option<String>, overcode_core::interfaces::FsError> {
            Ok(None)
        }
        fn mtime_seconds(&self, _path: &str) -> Result<Option<f64>, overcode_core::interfaces::FsError> {
            Ok(None)
        }
    }

    fn new_session(id: &str, name: &str, parent: Option<&str>) -> Session {
        let now = Utc::now();
        Session {
            id: id.into(),
            name: name.into(),
            tmux_session: "main".into(),
            tmux_window: 0,
            command: vec!["claude".into()],
            start_directory: "/tmp".into(),
            start_time: now,
            repo_name: None,
            branch: None,
            status: LifecycleStatus::Running,
            parent_session_id: parent.map(|s| s.to_string()),
            is_asleep: false,
            standing_instructions: String::new(),
            standing_instructions_preset: None,
            standing_orders_complete: false,
            permissiveness_mode: PermissivenessMode::Normal,
            cost_budget_usd: 0.0,
            agent_value: 1000,
            human_annotation: String::new(),
            heartbeat_enabled: false,
            heartbeat_paused: false,
            heartbeat_frequency_seconds: 30,
            heartbeat_instruction: String::new(),
            last_heartbeat_time: None,
            time_context_enabled: true,
            hook_status_detection: false,
            oversight_policy: OversightPolicy::Wait,
            oversight_timeout_seconds: 600,
            oversight_deadline: None,
            report_status: None,
            report_reason: None,
            claude_session_ids: Default::default(),
            active_claude_session_id: None,
            stats: SessionStats::new(now),
            allowed_tools: Vec::new(),
            extra_claude_args: Vec::new(),
            is_remote: false,
            source_url: None,
            source_api_key: None,
            source_host: None,
        }
    }

    #[test]
    fn missing_file_loads_as_empty_store() {
        let store = SessionStore::load_or_default(&FakeFs, "/nonexistent");
        assert!(store.list_all().is_empty());
    }

    #[test]
    fn insert_and_get_round_trip() {
        let store = SessionStore::empty();
        store.insert_new(new_session("a", "demo", None)).unwrap();
        assert!(store.get("a").is_some());
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let store = SessionStore::empty();
        let err = store.insert_new(new_session("c", "child", Some("missing"))).unwrap_err();
        assert!(matches!(err, DaemonError::Core(CoreError::UnknownParent(_))));
    }

    #[test]
    fn depth_four_parent_is_rejected_on_insert() {
        let store = SessionStore::empty();
        store.insert_new(new_session("a", "a", None)).unwrap();
        store.insert_new(new_session("b", "b", Some("a"))).unwrap();
        store.insert_new(new_session("c", "c", Some("b"))).unwrap();
        store.insert_new(new_session("d", "d", Some("c"))).unwrap();
        // d is at depth 3; e's parent (d) is at depth 3, fine.
        store.insert_new(new_session("e", "e", Some("d"))).unwrap();
        // e is depth 4: a new child under e should fail.
        let err = store.insert_new(new_session("f", "f", Some("e"))).unwrap_err();
        assert!(matches!(err, DaemonError::Core(CoreError::DepthExceeded { .. })));
    }

    #[test]
    fn with_session_mut_persists_changes() {
        let store = SessionStore::empty();
        store.insert_new(new_session("a", "demo", None)).unwrap();
        store.with_session_mut("a", |s| s.is_asleep = true).unwrap();
        assert!(store.get("a").unwrap().is_asleep);
    }

    #[test]
    fn with_session_mut_missing_id_errors() {
        let store = SessionStore::empty();
        let err = store.with_session_mut("nope", |_| ()).unwrap_err();
        assert!(matches!(err, DaemonError::SessionNotFound(_)));
    }

    #[test]
    fn archive_moves_between_sets() {
        let store = SessionStore::empty();
        store.insert_new(new_session("a", "demo", None)).unwrap();
        store.archive("a").unwrap();
        assert!(store.get("a").is_none());
    }

    #[test]
    fn list_children_filters_by_parent() {
        let store = SessionStore::empty();
        store.insert_new(new_session("p", "parent", None)).unwrap();
        store.insert_new(new_session("c1", "child1", Some("p"))).unwrap();
        store.insert_new(new_session("c2", "child2", Some("p"))).unwrap();
        let children = store.list_children("p");
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn persist_then_load_round_trips_through_real_filesystem() {
        use crate::fs::RealFilesystem;
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let path_str = path.to_str().unwrap();

        let store = SessionStore::empty();
        store.insert_new(new_session("a", "demo", None)).unwrap();
        store.persist(&RealFilesystem, path_str).unwrap();

        let reloaded = SessionStore::load_or_default(&RealFilesystem, path_str);
        assert!(reloaded.get("a").is_some());
    }

    #[test]
    fn reload_picks_up_a_sibling_processs_write() {
        use crate::fs::RealFilesystem;
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let path_str = path.to_str().unwrap();

        let writer = SessionStore::empty();
        writer.insert_new(new_session("a", "demo", None)).unwrap();
        writer.persist(&RealFilesystem, path_str).unwrap();

        let reader = SessionStore::empty();
        assert!(reader.get("a").is_none());
        reader.reload(&RealFilesystem, path_str);
        assert!(reader.get("a").is_some());
    }

    #[test]
    fn reload_of_missing_file_keeps_in_memory_copy() {
        use crate::fs::RealFilesystem;
        let store = SessionStore::empty();
        store.insert_new(new_session("a", "demo", None)).unwrap();
        store.reload(&RealFilesystem, "/nonexistent/sessions.json");
        assert!(store.get("a").is_some());
    }

    #[test]
    fn malformed_json_file_loads_as_empty() {
        use crate::fs::RealFilesystem;
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, b"not valid json").unwrap();
        let store = SessionStore::load_or_default(&RealFilesystem, path.to_str().unwrap());
        assert!(store.list_all().is_empty());
    }
}
