//! On-disk layout of one cached artifact.
//!
//! ```text
//! <scope>/<kind>.manifest.json     labels, provenance, checksum
//! <scope>/<kind>-<crc>.f64.gz      gzip of little-endian f64, NaN = missing
//! ```
//!
//! The array file name carries its checksum, so a rebuilt array never
//! overwrites one a concurrent reader may still be opening.

use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};

use hds_core::{DatasetRegion, HdsError, Result};
use hds_utils::fs::{crc_hex, write_atomic};

use crate::artifact::ArrayHeader;

/// Bumped whenever the manifest or array encoding changes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub region: DatasetRegion,
    pub data_path: PathBuf,
    pub kind: String,
    /// Fingerprint of the raw files the artifact was built from.
    pub source_signature: String,
    pub built_at: String,
    #[serde(flatten)]
    pub header: ArrayHeader,
    pub array_file: String,
    pub crc: String,
}

pub fn manifest_path(scope: &Path, kind: &str) -> PathBuf {
    scope.join(format!("{}.manifest.json", kind))
}

pub fn array_file_name(kind: &str, crc: &str) -> String {
    format!("{}-{}.f64.gz", kind, crc)
}

impl Manifest {
    /// Read a manifest; `Ok(None)` when none exists yet.
    pub fn read(path: &Path) -> Result<Option<Manifest>> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(HdsError::io(path, e)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| HdsError::CacheCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| HdsError::CacheCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        write_atomic(path, json.as_bytes()).map_err(|e| HdsError::io(path, e))
    }

    /// Whether this manifest can serve reads for the given source state.
    pub fn is_current(&self, region: DatasetRegion, signature: &str) -> bool {
        self.format_version == FORMAT_VERSION
            && self.region == region
            && self.source_signature == signature
    }
}

/// Compress `values` and return the file bytes with their checksum.
pub fn encode_array(values: &[f64]) -> io::Result<(Vec<u8>, String)> {
    let mut raw = Vec::with_capacity(values.len() * 8);
    for v in values {
        raw.extend_from_slice(&v.to_le_bytes());
    }
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(&raw)?;
    let bytes = gz.finish()?;
    let crc = crc_hex(&bytes);
    Ok((bytes, crc))
}

/// Read and verify an array file against its manifest.
///
/// `NotFound` is passed through untouched: it usually means a concurrent
/// rebuild replaced the manifest after it was read.
pub fn read_array(path: &Path, manifest: &Manifest) -> Result<Vec<f64>> {
    let corrupt = |reason: String| HdsError::CacheCorrupt {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = fs::read(path).map_err(|e| HdsError::io(path, e))?;
    let crc = crc_hex(&bytes);
    if crc != manifest.crc {
        return Err(corrupt(format!(
            "checksum {} does not match manifest {}",
            crc, manifest.crc
        )));
    }
    let mut raw = Vec::new();
    GzDecoder::new(bytes.as_slice())
        .read_to_end(&mut raw)
        .map_err(|e| corrupt(e.to_string()))?;
    if raw.len() % 8 != 0 {
        return Err(corrupt(format!("{} bytes is not a whole number of f64", raw.len())));
    }
    let values: Vec<f64> = raw
        .chunks_exact(8)
        .map(|c| {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            f64::from_le_bytes(b)
        })
        .collect();
    if values.len() != manifest.header.len() {
        return Err(corrupt(format!(
            "{} values stored, shape {:?} needs {}",
            values.len(),
            manifest.header.shape,
            manifest.header.len()
        )));
    }
    Ok(values)
}
