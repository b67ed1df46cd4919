use std::path::Path;

use hds_core::{DatasetRegion, Result};

/// Makes a region's raw files available under a data path.
///
/// Implementations must be idempotent: files already in place are not
/// fetched again. Failures are `Download` or `Extraction` errors.
pub trait Fetcher: Send + Sync {
    fn ensure_local(&self, region: DatasetRegion, data_path: &Path) -> Result<()>;
}

/// Fetcher for data that is already on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFetcher;

impl Fetcher for NoopFetcher {
    fn ensure_local(&self, region: DatasetRegion, data_path: &Path) -> Result<()> {
        log::debug!(
            "{}: download requested, expecting files under {}",
            region,
            data_path.display()
        );
        Ok(())
    }
}
