//! Durability adapter: one JSON file per collection, each a `[[id, record], ...]` array.
//!
//! Two triggers write the files: a background timer and an eager flush after
//! high-value mutations. Failures are logged and swallowed; the in-memory store
//! stays authoritative until the next successful flush.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{Collection, Snapshot, Store};

pub const USERS_FILE: &str = "users.json";
pub const PROJECTS_FILE: &str = "projects.json";
pub const WARNINGS_FILE: &str = "warnings.json";
pub const GIFTS_FILE: &str = "gifts.json";
pub const REPORTS_FILE: &str = "reports.json";

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("io error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed json in {}: {}", .path.display(), .source)]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("flush task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Clone)]
pub struct Persistence {
    dir: PathBuf,
    store: Arc<Store>,
    // One writer at a time: the shared `.json.tmp` names and snapshot order depend on it.
    flush_lock: Arc<Mutex<()>>,
}

impl Persistence {
    pub fn new(dir: impl Into<PathBuf>, store: Arc<Store>) -> Self {
        Self {
            dir: dir.into(),
            store,
            flush_lock: Arc::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Merge every collection file that exists into the store. Missing files mean
    /// "start empty"; an unreadable file is logged and skipped.
    pub fn load(&self) {
        let mut db = self.store.write();
        self.load_into(USERS_FILE, &mut db.users);
        self.load_into(PROJECTS_FILE, &mut db.projects);
        self.load_into(WARNINGS_FILE, &mut db.warnings);
        self.load_into(GIFTS_FILE, &mut db.gifts);
        self.load_into(REPORTS_FILE, &mut db.reports);
        info!(
            dir = %self.dir.display(),
            users = db.users.len(),
            projects = db.projects.len(),
            warnings = db.warnings.len(),
            gifts = db.gifts.len(),
            reports = db.reports.len(),
            "store loaded"
        );
    }

    fn load_into<T: DeserializeOwned>(&self, file: &str, target: &mut Collection<T>) {
        let path = self.dir.join(file);
        match read_pairs::<T>(&path) {
            // Duplicate ids inside one file: the later pair wins.
            Ok(Some(pairs)) => pairs.into_iter().for_each(|(id, rec)| target.put(id, rec)),
            Ok(None) => debug!(path = %path.display(), "no snapshot file; starting empty"),
            Err(e) => error!(error = %e, "failed to load collection; continuing without it"),
        }
    }

    /// Write all five files from a fresh snapshot. Concurrent callers are
    /// serialized, and each takes its snapshot only once it holds the writer slot.
    pub fn try_flush(&self) -> Result<(), PersistError> {
        let _writer = self.flush_lock.lock();
        write_snapshot(&self.dir, &self.store.snapshot())
    }

    /// Flush on the blocking pool and swallow any failure.
    pub async fn flush(&self) {
        let this = self.clone();
        let result = tokio::task::spawn_blocking(move || this.try_flush())
            .await
            .map_err(PersistError::from)
            .and_then(|r| r);
        match result {
            Ok(()) => debug!(dir = %self.dir.display(), "store flushed"),
            Err(e) => error!(error = %e, "store flush failed"),
        }
    }

    /// Timer-driven flush. The first tick fires one full period after start.
    pub fn spawn_timer(&self, period: Duration) -> JoinHandle<()> {
        let this = self.clone();
        let first = tokio::time::Instant::now() + period;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first, period);
            loop {
                ticker.tick().await;
                this.flush().await;
            }
        })
    }
}

fn read_pairs<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<(String, T)>>, PersistError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| PersistError::Json {
            path: path.to_path_buf(),
            source,
        })
}

fn write_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<(), PersistError> {
    fs::create_dir_all(dir).map_err(|source| PersistError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    write_pairs(&dir.join(USERS_FILE), &snapshot.users)?;
    write_pairs(&dir.join(PROJECTS_FILE), &snapshot.projects)?;
    write_pairs(&dir.join(WARNINGS_FILE), &snapshot.warnings)?;
    write_pairs(&dir.join(GIFTS_FILE), &snapshot.gifts)?;
    write_pairs(&dir.join(REPORTS_FILE), &snapshot.reports)?;
    Ok(())
}

fn write_pairs<T: Serialize>(path: &Path, pairs: &[(String, T)]) -> Result<(), PersistError> {
    let body = serde_json::to_vec(pairs).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, body).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(|source| {
        warn!(path = %tmp.display(), "leaving temp snapshot behind");
        io_err(source)
    })
}
