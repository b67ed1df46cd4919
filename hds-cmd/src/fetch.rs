//! Download and unpack a region's published files.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    time::Duration,
};

use flate2::read::GzDecoder;
use log::{info, warn};
use reqwest::{Client, StatusCode};
use tokio::{io::AsyncWriteExt, runtime::RuntimeFlavor};

use hds_adapters::adapter_for;
use hds_core::{DatasetRegion, HdsError, Result};
use hds_dataset::Fetcher;
use hds_utils::fs::temp_sibling;

/// Fetches over HTTP with retries, then extracts archives next to them.
///
/// Files already downloaded and archives already extracted are skipped, so
/// an interrupted fetch can simply be run again.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_tries: u32,
}

impl HttpFetcher {
    pub fn new() -> reqwest::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(4 * 60 * 60))
            .build()?;
        Ok(HttpFetcher {
            client,
            max_tries: 3,
        })
    }

    pub async fn fetch(&self, region: DatasetRegion, data_path: &Path) -> Result<()> {
        if adapter_for(region, data_path).probe().is_ok() {
            info!("{} data already present at {}", region, data_path.display());
            return Ok(());
        }
        let urls = region.download_urls();
        if urls.is_empty() {
            return Err(HdsError::Download {
                region,
                reason: format!(
                    "no public download, place the files under {}",
                    data_path.display()
                ),
            });
        }
        fs::create_dir_all(data_path).map_err(|e| HdsError::io(data_path, e))?;

        for url in &urls {
            let name = file_name(url).ok_or_else(|| HdsError::Download {
                region,
                reason: format!("cannot derive a file name from {}", url),
            })?;
            let dest = data_path.join(name);
            if fs::metadata(&dest).map(|m| m.len() > 0).unwrap_or(false) {
                info!("Skipping {}, already downloaded", dest.display());
            } else {
                self.download(region, url, &dest).await?;
            }
            extract(&dest, data_path)?;
        }
        info!("Fetched {} files for {}", urls.len(), region);
        Ok(())
    }

    async fn download(&self, region: DatasetRegion, url: &str, dest: &Path) -> Result<()> {
        let mut sleep_millis: u64 = 1000;
        let mut last_error = String::new();

        for attempt in 1..=self.max_tries {
            info!("Downloading {} (attempt {}/{})", url, attempt, self.max_tries);
            match self.download_once(url, dest).await {
                Ok(bytes) => {
                    info!("Saved {} ({} bytes)", dest.display(), bytes);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Attempt {}/{}: {} failed: {}", attempt, self.max_tries, url, e);
                    last_error = e;
                }
            }
            if attempt < self.max_tries {
                info!("Sleeping for {} milliseconds before retry", sleep_millis);
                tokio::time::sleep(Duration::from_millis(sleep_millis)).await;
                sleep_millis *= 2;
            }
        }
        Err(HdsError::Download {
            region,
            reason: format!("{} after {} attempts: {}", url, self.max_tries, last_error),
        })
    }

    /// Stream `url` into a temporary sibling of `dest`, then rename.
    async fn download_once(&self, url: &str, dest: &Path) -> std::result::Result<u64, String> {
        let mut response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        if response.status() != StatusCode::OK {
            return Err(format!("bad response status {}", response.status()));
        }
        let tmp = temp_sibling(dest);
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| e.to_string())?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
            file.write_all(&chunk).await.map_err(|e| e.to_string())?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| e.to_string())?;
        drop(file);
        if written == 0 {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err("empty response".to_string());
        }
        tokio::fs::rename(&tmp, dest)
            .await
            .map_err(|e| e.to_string())?;
        Ok(written)
    }
}

impl HttpFetcher {
    fn fetch_on_own_runtime(&self, region: DatasetRegion, data_path: &Path) -> Result<()> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| HdsError::Download {
                region,
                reason: e.to_string(),
            })?
            .block_on(self.fetch(region, data_path))
    }
}

impl Fetcher for HttpFetcher {
    /// Blocks until the fetch is done. Inside a multi-threaded runtime the
    /// worker is handed over with `block_in_place`; inside a current-thread
    /// runtime, which cannot be blocked, the fetch runs on a fresh runtime
    /// in a scoped thread.
    fn ensure_local(&self, region: DatasetRegion, data_path: &Path) -> Result<()> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.fetch(region, data_path)))
            }
            Ok(_) => std::thread::scope(|s| {
                s.spawn(|| self.fetch_on_own_runtime(region, data_path))
                    .join()
                    .unwrap_or_else(|_| {
                        Err(HdsError::Download {
                            region,
                            reason: "fetch thread panicked".to_string(),
                        })
                    })
            }),
            Err(_) => self.fetch_on_own_runtime(region, data_path),
        }
    }
}

/// Last path segment of a URL, without query string.
pub fn file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    path.rsplit('/').next().filter(|s| !s.is_empty())
}

fn marker(archive: &Path) -> PathBuf {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    archive.with_file_name(format!(".{}.extracted", name))
}

/// Unpack `archive` into `into` once. Files that are not archives are left
/// as they are.
pub fn extract(archive: &Path, into: &Path) -> Result<()> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let is_tar = name.ends_with(".tar.gz") || name.ends_with(".tgz");
    let is_zip = name.ends_with(".zip");
    if !is_tar && !is_zip {
        return Ok(());
    }
    let done = marker(archive);
    if done.exists() {
        info!("Skipping {}, already extracted", archive.display());
        return Ok(());
    }
    let failed = |reason: String| HdsError::Extraction {
        archive: archive.to_path_buf(),
        reason,
    };

    info!("Extracting {} into {}", archive.display(), into.display());
    if is_tar {
        let file = File::open(archive).map_err(|e| HdsError::io(archive, e))?;
        tar::Archive::new(GzDecoder::new(file))
            .unpack(into)
            .map_err(|e| failed(e.to_string()))?;
    } else {
        let file = File::open(archive).map_err(|e| HdsError::io(archive, e))?;
        zip::ZipArchive::new(file)
            .and_then(|mut zip| zip.extract(into))
            .map_err(|e| failed(e.to_string()))?;
    }
    fs::write(&done, b"").map_err(|e| HdsError::io(&done, e))
}
