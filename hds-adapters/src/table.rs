//! Delimited text tables as providers publish them.
//!
//! Each [`Table`] is read whole into memory as strings; typed interpretation
//! (dates, readings, attributes) happens in the adapters. Files may be comma,
//! semicolon or whitespace separated, may carry comment lines above the
//! header, and may be in any byte encoding (see [`hds_utils::fs::read_text`]).

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use hds_core::{HdsError, Result};
use hds_utils::{dates, fs::read_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Byte(u8),
    Whitespace,
}

/// How to read a provider file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFormat {
    pub delimiter: Delimiter,
    /// Lines above the header row.
    pub skip_lines: usize,
    /// Whether the first (non-skipped) line is a header.
    pub has_headers: bool,
}

impl TableFormat {
    pub const CSV: TableFormat = TableFormat {
        delimiter: Delimiter::Byte(b','),
        skip_lines: 0,
        has_headers: true,
    };
    pub const SEMICOLON: TableFormat = TableFormat {
        delimiter: Delimiter::Byte(b';'),
        skip_lines: 0,
        has_headers: true,
    };
    pub const WHITESPACE: TableFormat = TableFormat {
        delimiter: Delimiter::Whitespace,
        skip_lines: 0,
        has_headers: true,
    };

    pub const fn skip(self, lines: usize) -> Self {
        TableFormat {
            skip_lines: lines,
            ..self
        }
    }

    pub const fn headerless(self) -> Self {
        TableFormat {
            has_headers: false,
            ..self
        }
    }
}

/// Where a table keeps its dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSpec {
    /// One column holding a full date (ISO, compact or timestamp).
    Column(&'static str),
    /// Separate year, month and day columns, matched case-insensitively.
    Ymd,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Split a `name(unit)` header into its parts.
pub fn split_unit(header: &str) -> (&str, Option<&str>) {
    let h = header.trim();
    match (h.find('('), h.ends_with(')')) {
        (Some(open), true) if open > 0 => {
            (h[..open].trim(), Some(h[open + 1..h.len() - 1].trim()))
        }
        _ => (h, None),
    }
}

impl Table {
    pub fn read(path: &Path, format: TableFormat) -> Result<Table> {
        let text = read_text(path).map_err(|e| HdsError::io(path, e))?;
        Table::parse(path, &text, format)
    }

    pub fn parse(path: &Path, text: &str, format: TableFormat) -> Result<Table> {
        let body: String = text
            .lines()
            .skip(format.skip_lines)
            .collect::<Vec<_>>()
            .join("\n");

        let mut records: Vec<Vec<String>> = match format.delimiter {
            Delimiter::Whitespace => body
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.split_whitespace().map(str::to_string).collect())
                .collect(),
            Delimiter::Byte(b) => {
                let mut rdr = csv::ReaderBuilder::new()
                    .has_headers(false)
                    .flexible(true)
                    .delimiter(b)
                    .from_reader(body.as_bytes());
                let mut out = Vec::new();
                for result in rdr.records() {
                    let r = result.map_err(|source| HdsError::Csv {
                        path: path.to_path_buf(),
                        source,
                    })?;
                    if r.iter().all(|f| f.trim().is_empty()) {
                        continue;
                    }
                    out.push(r.iter().map(|f| f.trim().to_string()).collect());
                }
                out
            }
        };

        let headers = if format.has_headers {
            if records.is_empty() {
                return Err(HdsError::raw_format(path, "file has no header row"));
            }
            records.remove(0)
        } else {
            Vec::new()
        };
        log::debug!(
            "table: read {} rows from {}",
            records.len(),
            path.display()
        );
        Ok(Table {
            path: path.to_path_buf(),
            headers,
            rows: records,
        })
    }

    /// Index of the column called `name`, ignoring any `(unit)` suffix.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .or_else(|| self.headers.iter().position(|h| split_unit(h).0 == name))
    }

    fn column_ci(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    pub fn require(&self, name: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| HdsError::raw_format(&self.path, format!("missing column '{}'", name)))
    }

    /// Unit stated in a `name(unit)` header, if any.
    pub fn column_unit(&self, idx: usize) -> Option<String> {
        self.headers
            .get(idx)
            .and_then(|h| split_unit(h).1)
            .map(str::to_string)
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map_or("", String::as_str)
    }

    /// Date of every row. Rows whose date can't be parsed yield `None` and
    /// are skipped by callers.
    pub fn dates(&self, spec: DateSpec) -> Result<Vec<Option<NaiveDate>>> {
        match spec {
            DateSpec::Column(name) => {
                let c = self.require(name)?;
                Ok((0..self.rows.len())
                    .map(|r| dates::parse_date_flexible(self.cell(r, c)).ok())
                    .collect())
            }
            DateSpec::Ymd => {
                let find = |n: &str| {
                    self.column_ci(n).ok_or_else(|| {
                        HdsError::raw_format(&self.path, format!("missing column '{}'", n))
                    })
                };
                let (y, m, d) = (find("year")?, find("month")?, find("day")?);
                Ok((0..self.rows.len())
                    .map(|r| {
                        dates::from_ymd_fields(self.cell(r, y), self.cell(r, m), self.cell(r, d))
                            .ok()
                    })
                    .collect())
            }
        }
    }
}
