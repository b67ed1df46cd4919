//! Single-builder guarantee for a cache artifact.
//!
//! Two layers: a process-wide table of artifacts being built (threads wait on
//! a condition variable), and a `<kind>.lock` file created exclusively in the
//! scope directory for other processes. Both are released when the
//! [`BuildLock`] is dropped.
//!
//! A lock file older than the stale limit is deleted by at most one reclaimer
//! at a time, and only after its age is checked again. Each holder writes a
//! unique token into the file and removes it on drop only while the token is
//! still its own.

use std::{
    collections::HashSet,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, Mutex,
    },
    thread,
    time::{Duration, SystemTime},
};

use hds_core::{DatasetRegion, HdsError, Result};

use crate::Contention;

const POLL_START: Duration = Duration::from_millis(50);
const POLL_MAX: Duration = Duration::from_secs(1);

static NONCE: AtomicU64 = AtomicU64::new(0);

/// Content written into a lock file, unique per acquisition.
fn owner_token() -> String {
    format!("{}-{}", std::process::id(), NONCE.fetch_add(1, Ordering::Relaxed))
}

/// Artifacts currently being built by this process, keyed by lock path.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    building: Mutex<HashSet<PathBuf>>,
    done: Condvar,
}

/// Held while an artifact is (re)built.
#[derive(Debug)]
pub(crate) struct BuildLock {
    path: PathBuf,
    inflight: Arc<InFlight>,
    token: Option<String>,
}

impl BuildLock {
    pub fn acquire(
        inflight: &Arc<InFlight>,
        path: &Path,
        region: DatasetRegion,
        contention: Contention,
        stale_after: Duration,
    ) -> Result<BuildLock> {
        let busy = || HdsError::CacheBuildInProgress {
            region,
            path: path.to_path_buf(),
        };

        {
            let mut building = inflight
                .building
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            while building.contains(path) {
                if contention == Contention::FailFast {
                    return Err(busy());
                }
                log::info!("[HDS Debug] cache: waiting for build of {}", path.display());
                building = inflight
                    .done
                    .wait(building)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
            building.insert(path.to_path_buf());
        }

        // from here on, dropping the guard releases the in-process claim
        let mut guard = BuildLock {
            path: path.to_path_buf(),
            inflight: Arc::clone(inflight),
            token: None,
        };

        let mut delay = POLL_START;
        loop {
            let token = owner_token();
            match create_lock_file(path, &token) {
                Ok(()) => {
                    guard.token = Some(token);
                    return Ok(guard);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if is_stale(path, stale_after) {
                        log::warn!("cache: reclaiming stale lock {}", path.display());
                        if reclaim_stale(path, stale_after).map_err(|e| HdsError::io(path, e))? {
                            continue;
                        }
                    }
                    if contention == Contention::FailFast {
                        return Err(busy());
                    }
                    thread::sleep(delay);
                    delay = (delay * 2).min(POLL_MAX);
                }
                Err(e) => return Err(HdsError::io(path, e)),
            }
        }
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Some(token) = &self.token {
            match fs::read_to_string(&self.path) {
                Ok(content) if content.trim() == token => {
                    if let Err(e) = fs::remove_file(&self.path) {
                        log::warn!("cache: could not remove lock {}: {}", self.path.display(), e);
                    }
                }
                Ok(_) => log::warn!(
                    "cache: lock {} was taken over by another builder",
                    self.path.display()
                ),
                Err(e) => log::warn!("cache: could not read lock {}: {}", self.path.display(), e),
            }
        }
        let mut building = self
            .inflight
            .building
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        building.remove(&self.path);
        self.inflight.done.notify_all();
    }
}

fn create_lock_file(path: &Path, token: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(file, "{}", token)
}

/// Delete a stale lock. Reclaimers take turns through an exclusive
/// `<lock>.reclaim` gate and re-check the age under it, so a lock created
/// after the first check is never deleted. Returns whether a lock was
/// removed.
fn reclaim_stale(path: &Path, stale_after: Duration) -> io::Result<bool> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".reclaim");
    let gate = path.with_file_name(name);
    if let Err(e) = OpenOptions::new().write(true).create_new(true).open(&gate) {
        if e.kind() != io::ErrorKind::AlreadyExists {
            return Err(e);
        }
        if is_stale(&gate, stale_after) {
            log::warn!("cache: removing abandoned gate {}", gate.display());
            remove_if_present(&gate)?;
        }
        return Ok(false);
    }
    let freed = if is_stale(path, stale_after) {
        remove_if_present(path)
    } else {
        Ok(false)
    };
    fs::remove_file(&gate)?;
    freed
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// A lock file older than `stale_after` belongs to a builder that died.
fn is_stale(path: &Path, stale_after: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| SystemTime::now().duration_since(t).ok())
        .is_some_and(|age| age >= stale_after)
}
