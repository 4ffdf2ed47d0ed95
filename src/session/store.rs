// Session registry and workspace lifecycle
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

/// Session identifiers are 128-bit random tokens, hex encoded.
const ID_BYTES: usize = 16;
const ID_LEN: usize = ID_BYTES * 2;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session identifier")]
    InvalidSession,
    #[error("name escapes the session workspace")]
    PathEscape,
    #[error("unknown or expired session")]
    NotFound,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Snapshot of one live session handed out by the store.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub workspace: PathBuf,
}

#[derive(Debug)]
struct SessionEntry {
    created_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    workspace: PathBuf,
    has_result: bool,
}

/// Allocates, isolates, and reclaims per-upload workspaces. All artifact
/// paths go through `resolve_path`; nothing else composes paths from user
/// input.
pub struct SessionStore {
    root: PathBuf,
    ttl: Duration,
    download_grace: Duration,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration, download_grace: Duration) -> Self {
        Self {
            root: root.into(),
            ttl,
            download_grace,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a fresh session with an unguessable identifier and an
    /// isolated workspace directory under the store root.
    pub fn create_session(&self) -> Result<UploadSession, SessionError> {
        let now = Utc::now();
        let deadline = now + self.ttl;

        loop {
            let id = new_session_id();
            let workspace = self.root.join(&id);
            {
                let mut sessions = self.sessions.lock().expect("session registry poisoned");
                if sessions.contains_key(&id) {
                    // 128-bit collision; practically unreachable, retry anyway
                    continue;
                }
                sessions.insert(
                    id.clone(),
                    SessionEntry {
                        created_at: now,
                        deadline,
                        workspace: workspace.clone(),
                        has_result: false,
                    },
                );
            }
            if let Err(e) = std::fs::create_dir_all(&workspace) {
                let mut sessions = self.sessions.lock().expect("session registry poisoned");
                sessions.remove(&id);
                return Err(SessionError::Io(e));
            }
            debug!(session = %id, "created session workspace");
            return Ok(UploadSession {
                id,
                created_at: now,
                deadline,
                workspace,
            });
        }
    }

    /// Resolve a logical artifact name to a path inside the session
    /// workspace. Rejects malformed/unknown identifiers and any name that
    /// could resolve outside the workspace (`..`, separators, absolute
    /// paths). Names are restricted to plain file names so symlink tricks
    /// have nothing to latch onto.
    pub fn resolve_path(&self, id: &str, logical_name: &str) -> Result<PathBuf, SessionError> {
        // Escaping names are rejected regardless of the identifier.
        if !is_safe_name(logical_name) {
            return Err(SessionError::PathEscape);
        }
        if !is_valid_id(id) {
            return Err(SessionError::InvalidSession);
        }
        let sessions = self.sessions.lock().expect("session registry poisoned");
        let entry = sessions.get(id).ok_or(SessionError::InvalidSession)?;
        Ok(entry.workspace.join(logical_name))
    }

    pub fn write_artifact(&self, id: &str, name: &str, data: &[u8]) -> Result<(), SessionError> {
        let path = self.resolve_path(id, name)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn read_artifact(&self, id: &str, name: &str) -> Result<Vec<u8>, SessionError> {
        let path = self.resolve_path(id, name)?;
        match std::fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SessionError::NotFound),
            Err(e) => Err(SessionError::Io(e)),
        }
    }

    /// Look up a live session. Expired-but-not-yet-reaped sessions are
    /// treated as gone so a slow reaper never serves stale data.
    pub fn get(&self, id: &str) -> Result<UploadSession, SessionError> {
        if !is_valid_id(id) {
            return Err(SessionError::InvalidSession);
        }
        let sessions = self.sessions.lock().expect("session registry poisoned");
        let entry = sessions.get(id).ok_or(SessionError::NotFound)?;
        if entry.deadline <= Utc::now() {
            return Err(SessionError::NotFound);
        }
        Ok(UploadSession {
            id: id.to_string(),
            created_at: entry.created_at,
            deadline: entry.deadline,
            workspace: entry.workspace.clone(),
        })
    }

    /// Record that the session holds a successful extraction result.
    pub fn set_result(&self, id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        let entry = sessions.get_mut(id).ok_or(SessionError::NotFound)?;
        entry.has_result = true;
        Ok(())
    }

    pub fn has_result(&self, id: &str) -> bool {
        let sessions = self.sessions.lock().expect("session registry poisoned");
        sessions.get(id).map(|e| e.has_result).unwrap_or(false)
    }

    /// Delete the workspace and forget the session. Idempotent: purging an
    /// unknown or already-purged session is a no-op.
    pub fn purge(&self, id: &str) {
        let entry = {
            let mut sessions = self.sessions.lock().expect("session registry poisoned");
            sessions.remove(id)
        };
        let workspace = match entry {
            Some(e) => e.workspace,
            // Only well-formed ids may be composed into a path.
            None if is_valid_id(id) => self.root.join(id),
            None => return,
        };
        match std::fs::remove_dir_all(&workspace) {
            Ok(()) => debug!(session = %id, "purged session workspace"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(session = %id, "failed to remove workspace: {e}"),
        }
    }

    /// Purge every session past its deadline. The registry lock is held
    /// only to snapshot the expired ids; file deletion runs unlocked.
    pub fn reap_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = {
            let sessions = self.sessions.lock().expect("session registry poisoned");
            sessions
                .iter()
                .filter(|(_, e)| e.deadline <= now)
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in &expired {
            self.purge(id);
        }
        expired.len()
    }

    /// After a completed download the session becomes eligible for early
    /// reclamation: its deadline shrinks to a small grace period. Never
    /// extends a deadline.
    pub fn mark_downloaded(&self, id: &str) {
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        if let Some(entry) = sessions.get_mut(id) {
            let early = Utc::now() + self.download_grace;
            if early < entry.deadline {
                entry.deadline = early;
            }
        }
    }

    /// Tear down every live session. Called on process shutdown.
    pub fn purge_all(&self) -> usize {
        let ids: Vec<String> = {
            let sessions = self.sessions.lock().expect("session registry poisoned");
            sessions.keys().cloned().collect()
        };
        for id in &ids {
            self.purge(id);
        }
        ids.len()
    }

    pub fn live_count(&self) -> usize {
        self.sessions.lock().expect("session registry poisoned").len()
    }
}

fn new_session_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

/// Only plain file names are accepted as artifact names.
fn is_safe_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return false;
    }
    if Path::new(name).is_absolute() {
        return false;
    }
    true
}
