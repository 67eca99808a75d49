//! Durable file-backed session storage.
//!
//! One record per session under the configured directory. The filename is
//! derived from the session id (URL-safe base64), so lookup is a single
//! path probe with no index file.

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex as StdMutex},
};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sessiond_core::{BackendRole, Session, SessionBackend, SessionError, codec, now_ms};
use tokio::sync::Mutex;

const RECORD_SUFFIX: &str = ".session";

/// File-backed session store.
///
/// Records are locked individually, so operations on distinct ids never
/// contend.
pub struct LocalFileBackend {
    dir: PathBuf,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LocalFileBackend {
    /// Open (creating if needed) a session directory.
    ///
    /// # Errors
    /// Returns `PersistenceFailure` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            locks: StdMutex::new(HashMap::new()),
        })
    }

    /// Directory holding the session records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn record_path(&self, id: &str) -> PathBuf {
        let mut name = URL_SAFE_NO_PAD.encode(id);
        name.push_str(RECORD_SUFFIX);
        self.dir.join(name)
    }

    fn record_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        Arc::clone(locks.entry(id.to_string()).or_default())
    }

    /// Delete every expired record, returning how many were purged.
    ///
    /// Unreadable or undecodable records are deleted and skipped; one bad
    /// record never halts the sweep. Locks one record at a time, so
    /// foreground operations on other sessions are never blocked.
    pub async fn sweep(&self, now_ms: i64) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "session sweep could not list directory");
                return 0;
            }
        };

        let mut purged = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "session sweep could not read directory entry");
                    break;
                }
            };

            let path = entry.path();
            let Some(id) = decode_record_name(&path) else {
                continue;
            };

            let lock = self.record_lock(&id);
            let _guard = lock.lock().await;

            let expired = match tokio::fs::read(&path).await {
                Ok(bytes) => match codec::decode(&bytes) {
                    Ok(session) => session.is_expired(now_ms),
                    Err(e) => {
                        tracing::warn!(%id, error = %e, "dropping undecodable session record");
                        true
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!(%id, error = %e, "session sweep could not read record");
                    continue;
                }
            };

            if expired {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => purged += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => tracing::warn!(%id, error = %e, "session sweep could not delete record"),
                }
            }
        }

        // Drop lock table entries nobody is holding.
        self.locks
            .lock()
            .unwrap()
            .retain(|_, lock| Arc::strong_count(lock) > 1);

        purged
    }
}

fn decode_record_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let encoded = name.strip_suffix(RECORD_SUFFIX)?;
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

#[async_trait]
impl SessionBackend for LocalFileBackend {
    fn role(&self) -> BackendRole {
        BackendRole::Local
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let lock = self.record_lock(id);
        let _guard = lock.lock().await;

        let path = self.record_path(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let session = match codec::decode(&bytes) {
            Ok(session) => session,
            Err(e) => {
                // Treat an unreadable record as a miss and drop it.
                tracing::warn!(id, error = %e, "dropping undecodable session record");
                remove_quietly(&path).await;
                return Ok(None);
            }
        };

        if session.is_expired(now_ms()) {
            remove_quietly(&path).await;
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn put(&self, session: &Session) -> Result<(), SessionError> {
        let bytes = codec::encode(session)?;

        let lock = self.record_lock(&session.id);
        let _guard = lock.lock().await;

        tokio::fs::write(self.record_path(&session.id), bytes).await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), SessionError> {
        let lock = self.record_lock(id);
        let _guard = lock.lock().await;

        match tokio::fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "could not delete session record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> (tempfile::TempDir, LocalFileBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalFileBackend::open(dir.path()).unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn put_get_remove_round_trip() {
        let (_dir, backend) = backend();

        let mut session = Session::new("s1", 1800);
        session.set_attribute("user", serde_json::json!("alice"));
        backend.put(&session).await.unwrap();

        let loaded = backend.get("s1").await.unwrap().unwrap();
        assert_eq!(loaded, session);

        backend.remove("s1").await.unwrap();
        assert!(backend.get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_overwrites_existing_record() {
        let (_dir, backend) = backend();

        let mut session = Session::new("s1", 1800);
        backend.put(&session).await.unwrap();

        session.set_attribute("count", serde_json::json!(2));
        backend.put(&session).await.unwrap();

        let loaded = backend.get("s1").await.unwrap().unwrap();
        assert_eq!(loaded.get_attribute("count"), Some(&serde_json::json!(2)));
    }

    #[tokio::test]
    async fn remove_of_absent_id_is_a_no_op() {
        let (_dir, backend) = backend();
        backend.remove("missing").await.unwrap();
        backend.remove("missing").await.unwrap();
    }

    #[tokio::test]
    async fn expired_record_is_a_miss_and_eagerly_deleted() {
        let (_dir, backend) = backend();

        let mut session = Session::new("s1", 1);
        session.last_accessed_time -= 2000;
        backend.put(&session).await.unwrap();

        assert!(backend.get("s1").await.unwrap().is_none());
        assert!(!backend.record_path("s1").exists());
    }

    #[tokio::test]
    async fn corrupt_record_is_a_miss_and_dropped() {
        let (_dir, backend) = backend();

        tokio::fs::write(backend.record_path("s1"), b"not a record")
            .await
            .unwrap();

        assert!(backend.get("s1").await.unwrap().is_none());
        assert!(!backend.record_path("s1").exists());
    }

    #[tokio::test]
    async fn sweep_purges_expired_and_keeps_live() {
        let (_dir, backend) = backend();

        let mut expired = Session::new("old", 1);
        expired.last_accessed_time -= 2000;
        backend.put(&expired).await.unwrap();

        let live = Session::new("fresh", 1800);
        backend.put(&live).await.unwrap();

        let forever = Session::new("pinned", 0);
        backend.put(&forever).await.unwrap();

        assert_eq!(backend.sweep(now_ms()).await, 1);
        assert!(backend.get("old").await.unwrap().is_none());
        assert!(backend.get("fresh").await.unwrap().is_some());
        assert!(backend.get("pinned").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sweep_survives_an_undecodable_record() {
        let (_dir, backend) = backend();

        tokio::fs::write(backend.record_path("bad"), b"garbage")
            .await
            .unwrap();
        let mut expired = Session::new("old", 1);
        expired.last_accessed_time -= 2000;
        backend.put(&expired).await.unwrap();

        // Both the garbage and the expired record go; the sweep finishes.
        assert_eq!(backend.sweep(now_ms()).await, 2);
        assert!(!backend.record_path("bad").exists());
        assert!(!backend.record_path("old").exists());
    }

    #[tokio::test]
    async fn disjoint_ids_use_distinct_locks() {
        let (_dir, backend) = backend();

        let a = backend.record_lock("a");
        let b = backend.record_lock("b");
        assert!(!Arc::ptr_eq(&a, &b));

        // Holding one record's lock does not block another id.
        let _held = a.lock().await;
        backend.put(&Session::new("b", 1800)).await.unwrap();
        assert!(backend.get("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn same_id_shares_one_lock() {
        let (_dir, backend) = backend();
        let first = backend.record_lock("a");
        let second = backend.record_lock("a");
        assert!(Arc::ptr_eq(&first, &second));
    }
}
