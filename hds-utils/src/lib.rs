//! Shared utility functions for hydrodataset crates.

/// Date utility functions
pub mod dates {
    use crate::error::DateError;
    use chrono::{NaiveDate, NaiveDateTime};

    /// Format a NaiveDate as "YYYY-MM-DD"
    pub fn format_date(date: &NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    /// Parse a date string in "YYYY-MM-DD" format
    pub fn parse_date(s: &str) -> Result<NaiveDate, DateError> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| DateError(format!("{}: {}", s, e)))
    }

    /// Parse a date string in "YYYYMMDD" format
    pub fn parse_date_compact(s: &str) -> Result<NaiveDate, DateError> {
        NaiveDate::parse_from_str(s.trim(), "%Y%m%d").map_err(|e| DateError(format!("{}: {}", s, e)))
    }

    /// Parse the date formats found in provider files: ISO dates, ISO
    /// timestamps (time part dropped), compact `YYYYMMDD`, slashes, and
    /// `DD.MM.YYYY`.
    pub fn parse_date_flexible(s: &str) -> Result<NaiveDate, DateError> {
        let s = s.trim().trim_matches('"');
        for fmt in ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d", "%d.%m.%Y", "%d/%m/%Y"] {
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                return Ok(d);
            }
        }
        for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(dt.date());
            }
        }
        Err(DateError(format!("unrecognised date '{}'", s)))
    }

    /// Build a date from separate year, month and day fields, tolerating
    /// float-formatted numbers such as "1990.0".
    pub fn from_ymd_fields(year: &str, month: &str, day: &str) -> Result<NaiveDate, DateError> {
        let field = |s: &str| -> Result<i64, DateError> {
            let t = s.trim();
            t.parse::<i64>()
                .or_else(|_| t.parse::<f64>().map(|f| f as i64))
                .map_err(|_| DateError(format!("bad date field '{}'", s)))
        };
        let (y, m, d) = (field(year)?, field(month)?, field(day)?);
        NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32)
            .ok_or_else(|| DateError(format!("invalid date {}-{}-{}", y, m, d)))
    }

}

/// Filesystem helpers
pub mod fs {
    use encoding_rs::{UTF_8, WINDOWS_1252};
    use flate2::Crc;
    use std::{
        fs,
        io::{self, Write},
        path::{Path, PathBuf},
        sync::atomic::{AtomicU64, Ordering},
        time::UNIX_EPOCH,
    };

    static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

    /// Read a text file whatever its encoding: UTF-8 (with or without BOM)
    /// is decoded as such, anything else as Windows-1252.
    pub fn read_text(path: &Path) -> io::Result<String> {
        let bytes = fs::read(path)?;
        Ok(decode_text(&bytes))
    }

    pub fn decode_text(bytes: &[u8]) -> String {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
            Some(text) => text.into_owned(),
            None => {
                log::debug!("decoding non UTF-8 text as {}", WINDOWS_1252.name());
                WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned()
            }
        }
    }

    /// Write `bytes` to `path` through a sibling temporary file and a rename,
    /// so readers see either the old or the new content.
    pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
        let tmp = temp_sibling(path);
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path).inspect_err(|_| {
            let _ = fs::remove_file(&tmp);
        })
    }

    /// `<path>.tmp-<pid>-<n>` next to `path`, unique per call within the
    /// process.
    pub fn temp_sibling(path: &Path) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".tmp-{}-{}", std::process::id(), n));
        path.with_file_name(name)
    }

    /// CRC32 of a byte slice as 8 hex digits.
    pub fn crc_hex(bytes: &[u8]) -> String {
        let mut crc = Crc::new();
        crc.update(bytes);
        format!("{:08x}", crc.sum())
    }

    /// Fingerprint of a directory tree from relative paths, sizes and
    /// modification times. Paths under `skip` are ignored.
    pub fn tree_signature(root: &Path, skip: &[&Path]) -> io::Result<String> {
        let mut entries = Vec::new();
        collect_files(root, root, skip, &mut entries)?;
        entries.sort();
        let mut crc = Crc::new();
        for entry in &entries {
            crc.update(entry.as_bytes());
            crc.update(b"\n");
        }
        Ok(format!("{:08x}-{}", crc.sum(), entries.len()))
    }

    fn collect_files(
        root: &Path,
        dir: &Path,
        skip: &[&Path],
        out: &mut Vec<String>,
    ) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if skip.iter().any(|s| path.starts_with(s)) {
                continue;
            }
            let meta = entry.metadata()?;
            if meta.is_dir() {
                collect_files(root, &path, skip, out)?;
            } else {
                let rel = path.strip_prefix(root).unwrap_or(&path);
                let mtime = meta
                    .modified()
                    .ok()
                    .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
                    .map_or(0, |d| d.as_nanos());
                out.push(format!("{}|{}|{}", rel.display(), meta.len(), mtime));
            }
        }
        Ok(())
    }

}

/// Error types
pub mod error {
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("Date error: {0}")]
    pub struct DateError(pub String);
}
