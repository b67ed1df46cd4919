/// Error types shared by every hydrodataset crate
use std::{fmt, io, path::PathBuf};

use chrono::NaiveDate;
use thiserror::Error;

use crate::region::DatasetRegion;

/// An operation a region may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Attributes,
    Forcing,
    Streamflow,
    Cache,
    Nestedness,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Attributes => "attributes",
            Capability::Forcing => "forcing",
            Capability::Streamflow => "streamflow",
            Capability::Cache => "cache",
            Capability::Nestedness => "nestedness",
        };
        f.write_str(name)
    }
}

/// Main error type for dataset access
#[derive(Error, Debug)]
pub enum HdsError {
    /// Basin id is not part of the region's basin index
    #[error("basin '{basin}' not found in {region} ({} valid basins: {})", valid.len(), valid.join(", "))]
    BasinNotFound {
        region: DatasetRegion,
        basin: String,
        valid: Vec<String>,
    },

    /// Variable is not a canonical variable of the region
    #[error("variable '{variable}' not available in {region} (valid: {})", valid.join(", "))]
    VariableNotFound {
        region: DatasetRegion,
        variable: String,
        valid: Vec<String>,
    },

    /// Region does not offer the requested kind of data
    #[error("{region} does not support {capability} reads")]
    UnsupportedOperation {
        region: DatasetRegion,
        capability: Capability,
    },

    /// No conversion exists between the two units
    #[error("cannot convert from '{from}' to '{to}'")]
    UnitConversion { from: String, to: String },

    /// Unit string is not recognised
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    /// Fetching raw data failed
    #[error("download failed for {region}: {reason}")]
    Download {
        region: DatasetRegion,
        reason: String,
    },

    /// Unpacking a downloaded archive failed
    #[error("extraction of {archive} failed: {reason}")]
    Extraction { archive: PathBuf, reason: String },

    /// Another caller is building the same cache scope
    #[error("cache for {region} at {} is being built by another caller", path.display())]
    CacheBuildInProgress { region: DatasetRegion, path: PathBuf },

    /// Persisted artifact failed validation
    #[error("cache artifact {} is corrupt: {reason}", path.display())]
    CacheCorrupt { path: PathBuf, reason: String },

    /// Raw data directory or its metadata file is missing
    #[error("no {region} data found at {}", path.display())]
    DataNotFound { region: DatasetRegion, path: PathBuf },

    /// Time range is empty or inverted
    #[error("invalid time range: start {start} must be before end {end}")]
    InvalidTimeRange { start: NaiveDate, end: NaiveDate },

    /// Date string could not be parsed
    #[error("invalid date '{0}'")]
    InvalidDate(String),

    /// Variable catalog could not be parsed
    #[error("catalog line {line}: {reason}")]
    Catalog { line: usize, reason: String },

    /// Raw provider file did not match its expected layout
    #[error("unexpected format in {}: {reason}", path.display())]
    RawFormat { path: PathBuf, reason: String },

    /// Delimited file could not be parsed
    #[error("failed to parse {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Filesystem error
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HdsError {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HdsError::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a [`HdsError::RawFormat`] for `path`.
    pub fn raw_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        HdsError::RawFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised by request validation rather than I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            HdsError::BasinNotFound { .. }
                | HdsError::VariableNotFound { .. }
                | HdsError::UnsupportedOperation { .. }
                | HdsError::InvalidTimeRange { .. }
                | HdsError::InvalidDate(_)
        )
    }
}

/// Type alias for Results using HdsError
pub type Result<T> = std::result::Result<T, HdsError>;
