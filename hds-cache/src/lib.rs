//! Persistent cache of normalised dataset arrays.
//!
//! Reading thousands of small provider files is slow, so regions that allow
//! it keep their normalised attributes and time series as compact arrays on
//! disk. A cache *scope* is one (region, data path) pair; inside a scope each
//! artifact kind (`attributes`, `forcing`, `streamflow`) has one manifest and
//! one array file.
//!
//! # Behaviour
//!
//! - A request covered by the stored artifact is answered from disk.
//! - Otherwise the artifact is rebuilt for the union of what it held and what
//!   was asked, so coverage only grows.
//! - Only one builder per artifact runs at a time, across threads and
//!   processes. Others either wait and then reuse the result
//!   ([`Contention::Block`]) or fail with `CacheBuildInProgress`
//!   ([`Contention::FailFast`]).
//! - A changed source tree, a foreign format version or a checksum mismatch
//!   all lead to a rebuild rather than an error.
//! - Hits and fresh builds return identical values: a built artifact is
//!   passed through its own encoding before the request is cut out of it.
//!
//! # Usage
//!
//! ```no_run
//! use hds_cache::{CacheConfig, CacheManager, Coverage, Scope};
//! use hds_core::{AttributeTable, DatasetRegion};
//!
//! let cache = CacheManager::new(CacheConfig::new("/tmp/hds-cache"));
//! let scope = Scope::new(DatasetRegion::CamelsCh, "/data/camels_ch", "sig");
//! let request = Coverage::new(vec!["2009".into()], vec!["area".into()], None);
//! let table: AttributeTable = cache
//!     .get_or_build(&scope, &request, |_widened| unimplemented!())
//!     .unwrap();
//! ```

use std::{
    fs,
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use hds_core::{Capability, DatasetRegion, HdsError, Result, TimeRange};
use hds_utils::fs::{crc_hex, write_atomic};

pub mod artifact;
mod lock;
pub mod manifest;

pub use artifact::{ArrayHeader, Artifact, Coverage, ForcingArray, StreamflowArray};
pub use manifest::Manifest;

use lock::{BuildLock, InFlight};
use manifest::{array_file_name, encode_array, manifest_path, read_array, FORMAT_VERSION};

/// What to do when another caller is building the artifact you need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Contention {
    /// Wait for the other build, then use its result.
    #[default]
    Block,
    /// Return `CacheBuildInProgress` immediately.
    FailFast,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub root: PathBuf,
    pub contention: Contention,
    /// Lock files older than this are treated as left by a crashed builder.
    pub stale_lock_after: Duration,
}

impl CacheConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CacheConfig {
            root: root.into(),
            contention: Contention::Block,
            stale_lock_after: Duration::from_secs(6 * 60 * 60),
        }
    }

    pub fn with_contention(mut self, contention: Contention) -> Self {
        self.contention = contention;
        self
    }

    pub fn with_stale_lock_after(mut self, after: Duration) -> Self {
        self.stale_lock_after = after;
        self
    }

    /// `$HDS_CACHE_DIR`, else `~/.cache/hydrodataset`, else a directory
    /// under the system temp dir.
    pub fn default_root() -> PathBuf {
        if let Some(dir) = std::env::var_os("HDS_CACHE_DIR") {
            return PathBuf::from(dir);
        }
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(".cache").join("hydrodataset"),
            None => std::env::temp_dir().join("hydrodataset"),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::new(CacheConfig::default_root())
    }
}

/// Identity of a cache scope plus the fingerprint of its raw files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub region: DatasetRegion,
    pub data_path: PathBuf,
    pub source_signature: String,
}

impl Scope {
    pub fn new(
        region: DatasetRegion,
        data_path: impl Into<PathBuf>,
        source_signature: impl Into<String>,
    ) -> Self {
        Scope {
            region,
            data_path: data_path.into(),
            source_signature: source_signature.into(),
        }
    }

    /// `<region>-<crc of data path>`: one directory per dataset copy.
    pub fn dir_name(&self) -> String {
        let path = self.data_path.to_string_lossy();
        format!("{}-{}", self.region.code(), crc_hex(path.as_bytes()))
    }
}

/// Summary of one stored artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactStatus {
    pub kind: String,
    pub basins: usize,
    pub variables: Vec<String>,
    pub time_range: Option<TimeRange>,
    pub built_at: String,
    /// False when the raw files changed since the build.
    pub current: bool,
    pub bytes: u64,
}

/// Shared entry point for cached reads. Cheap to clone; clones share the
/// in-process build table.
#[derive(Debug, Clone)]
pub struct CacheManager {
    config: CacheConfig,
    inflight: Arc<InFlight>,
}

enum Lookup<A> {
    Hit(A),
    /// Current manifest that doesn't cover the request.
    Partial(Coverage),
    Miss,
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        CacheManager {
            config,
            inflight: Arc::new(InFlight::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn scope_dir(&self, scope: &Scope) -> PathBuf {
        self.config.root.join(scope.dir_name())
    }

    /// Answer `request` from the stored artifact, building it first if it
    /// is missing, stale or too narrow. `build` receives the coverage to
    /// build, which may be wider than the request.
    pub fn get_or_build<A, F>(&self, scope: &Scope, request: &Coverage, build: F) -> Result<A>
    where
        A: Artifact,
        F: FnOnce(&Coverage) -> Result<A>,
    {
        if !scope.region.capabilities().supports(Capability::Cache) {
            log::debug!("cache: {} is not cached, reading raw files", scope.region);
            return build(request);
        }

        let dir = self.scope_dir(scope);
        if let Lookup::Hit(a) = self.lookup::<A>(scope, &dir, request)? {
            return Ok(a);
        }

        fs::create_dir_all(&dir).map_err(|e| HdsError::io(&dir, e))?;
        let lock_path = dir.join(format!("{}.lock", A::KIND));
        let _lock = BuildLock::acquire(
            &self.inflight,
            &lock_path,
            scope.region,
            self.config.contention,
            self.config.stale_lock_after,
        )?;

        // someone may have built it while we waited
        let target = match self.lookup::<A>(scope, &dir, request)? {
            Lookup::Hit(a) => return Ok(a),
            Lookup::Partial(have) => have.union(request),
            Lookup::Miss => request.clone(),
        };

        log::info!(
            "[HDS Debug] cache: building {} {} for {} basins, {} variables",
            scope.region,
            A::KIND,
            target.basins.len(),
            target.variables.len()
        );
        let built = build(&target)?;
        let stored = self.store(scope, &dir, &built)?;
        stored.subset(request).ok_or_else(|| HdsError::CacheCorrupt {
            path: manifest_path(&dir, A::KIND),
            reason: "freshly built artifact does not cover the request".into(),
        })
    }

    fn lookup<A: Artifact>(&self, scope: &Scope, dir: &Path, request: &Coverage) -> Result<Lookup<A>> {
        let path = manifest_path(dir, A::KIND);
        // one retry: a concurrent rebuild may swap the array under us
        for attempt in 0..2 {
            let manifest = match Manifest::read(&path) {
                Ok(Some(m)) => m,
                Ok(None) => return Ok(Lookup::Miss),
                Err(HdsError::CacheCorrupt { reason, .. }) => {
                    log::warn!("cache: unreadable manifest {}: {}", path.display(), reason);
                    return Ok(Lookup::Miss);
                }
                Err(e) => return Err(e),
            };
            if !manifest.is_current(scope.region, &scope.source_signature) {
                log::info!("[HDS Debug] cache: {} is stale", path.display());
                return Ok(Lookup::Miss);
            }
            let have = manifest.header.coverage();
            if !have.covers(request) {
                return Ok(Lookup::Partial(have));
            }
            let array = dir.join(&manifest.array_file);
            let values = match read_array(&array, &manifest) {
                Ok(v) => v,
                Err(HdsError::Io { source, .. })
                    if source.kind() == io::ErrorKind::NotFound && attempt == 0 =>
                {
                    continue;
                }
                Err(HdsError::CacheCorrupt { reason, .. }) => {
                    log::warn!("cache: {} is corrupt, rebuilding: {}", array.display(), reason);
                    return Ok(Lookup::Miss);
                }
                Err(e) => return Err(e),
            };
            return match A::decode(manifest.header, values) {
                Ok(a) => Ok(a.subset(request).map_or(Lookup::Miss, Lookup::Hit)),
                Err(e) => {
                    log::warn!("cache: {} does not decode, rebuilding: {}", array.display(), e);
                    Ok(Lookup::Miss)
                }
            };
        }
        Ok(Lookup::Miss)
    }

    /// Persist `built` and return it as a reader would see it.
    fn store<A: Artifact>(&self, scope: &Scope, dir: &Path, built: &A) -> Result<A> {
        let (header, values) = built.encode();
        let (bytes, crc) = encode_array(&values).map_err(|e| HdsError::io(dir, e))?;
        let array_file = array_file_name(A::KIND, &crc);
        let array_path = dir.join(&array_file);
        write_atomic(&array_path, &bytes).map_err(|e| HdsError::io(&array_path, e))?;

        let path = manifest_path(dir, A::KIND);
        let previous = Manifest::read(&path).ok().flatten();
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            region: scope.region,
            data_path: scope.data_path.clone(),
            kind: A::KIND.to_string(),
            source_signature: scope.source_signature.clone(),
            built_at: chrono::Utc::now().to_rfc3339(),
            header: header.clone(),
            array_file: array_file.clone(),
            crc,
        };
        manifest.write(&path)?;

        if let Some(old) = previous.filter(|m| m.array_file != array_file) {
            let old_path = dir.join(&old.array_file);
            if let Err(e) = fs::remove_file(&old_path) {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("cache: could not remove {}: {}", old_path.display(), e);
                }
            }
        }
        log::info!(
            "[HDS Debug] cache: stored {} ({} values, {} bytes)",
            array_path.display(),
            values.len(),
            bytes.len()
        );
        A::decode(header, values)
    }

    /// Stored artifacts of a scope.
    pub fn status(&self, scope: &Scope) -> Result<Vec<ArtifactStatus>> {
        let dir = self.scope_dir(scope);
        let mut out = Vec::new();
        for kind in ["attributes", "forcing", "streamflow"] {
            let Some(m) = Manifest::read(&manifest_path(&dir, kind))? else {
                continue;
            };
            let bytes = fs::metadata(dir.join(&m.array_file)).map_or(0, |md| md.len());
            out.push(ArtifactStatus {
                kind: m.kind.clone(),
                basins: m.header.basins.len(),
                variables: m.header.variables.iter().map(|v| v.name.clone()).collect(),
                time_range: m.header.time_range,
                built_at: m.built_at.clone(),
                current: m.is_current(scope.region, &scope.source_signature),
                bytes,
            });
        }
        Ok(out)
    }

    /// Remove every artifact of a scope.
    pub fn clear(&self, scope: &Scope) -> Result<()> {
        let dir = self.scope_dir(scope);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                log::info!("[HDS Debug] cache: cleared {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HdsError::io(&dir, e)),
        }
    }
}
