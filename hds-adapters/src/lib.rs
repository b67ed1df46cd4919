//! Readers for the raw on-disk layouts of published hydrological datasets.
//!
//! Every provider ships its own directory tree, delimiters, date columns and
//! gap markers. A [`RawAdapter`] hides those differences and hands back
//! values still in the provider's own names and units; renaming and unit
//! conversion happen one layer up, in `hds-data`.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use hds_core::{
    AttributeValue, BasinId, Capabilities, Capability, DatasetRegion, HdsError, Nestedness,
    Reading, Result, SeriesKind, TimeRange,
};

pub mod regions;
pub mod table;

use table::{split_unit, DateSpec, Table, TableFormat};

/// One attribute cell with the unit its file header stated, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub value: AttributeValue,
    pub unit: Option<String>,
}

pub type RawAttributes = BTreeMap<String, RawAttribute>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumn {
    pub name: String,
    pub unit: Option<String>,
}

/// Raw time series of one basin: one column per requested raw variable, rows
/// sorted by date and restricted to the requested range.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<(NaiveDate, Vec<Reading>)>,
}

impl RawSeries {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Format-specific access to one region's raw files.
pub trait RawAdapter: Send + Sync {
    fn region(&self) -> DatasetRegion;

    fn data_path(&self) -> &Path;

    /// File whose presence marks a usable download and which lists the
    /// region's basins.
    fn gauge_file(&self) -> PathBuf;

    fn capabilities(&self) -> Capabilities {
        self.region().capabilities()
    }

    fn probe(&self) -> Result<()> {
        let gauge = self.gauge_file();
        if gauge.is_file() {
            Ok(())
        } else {
            Err(HdsError::DataNotFound {
                region: self.region(),
                path: gauge,
            })
        }
    }

    /// All basin ids the raw files describe.
    fn scan_basins(&self) -> Result<BTreeSet<BasinId>>;

    /// Every attribute of the requested basins, raw names and units.
    fn load_attributes(&self, basins: &[BasinId]) -> Result<BTreeMap<BasinId, RawAttributes>>;

    /// Raw columns `raw_vars` of the requested basins over `range`.
    fn load_timeseries(
        &self,
        basins: &[BasinId],
        kind: SeriesKind,
        raw_vars: &[String],
        range: &TimeRange,
    ) -> Result<BTreeMap<BasinId, RawSeries>>;

    /// Gauge network relations of the requested basins. Only regions that
    /// publish them override this.
    fn load_nestedness(&self, _basins: &[BasinId]) -> Result<Vec<Nestedness>> {
        Err(HdsError::UnsupportedOperation {
            region: self.region(),
            capability: Capability::Nestedness,
        })
    }

    fn read_attributes(&self, basins: &[BasinId]) -> Result<BTreeMap<BasinId, RawAttributes>> {
        self.probe()?;
        check_basins(self.region(), basins, &self.scan_basins()?)?;
        self.load_attributes(basins)
    }

    fn read_timeseries(
        &self,
        basins: &[BasinId],
        kind: SeriesKind,
        raw_vars: &[String],
        range: &TimeRange,
    ) -> Result<BTreeMap<BasinId, RawSeries>> {
        if kind == SeriesKind::Forcing && !self.capabilities().supports(Capability::Forcing) {
            return Err(HdsError::UnsupportedOperation {
                region: self.region(),
                capability: Capability::Forcing,
            });
        }
        self.probe()?;
        check_basins(self.region(), basins, &self.scan_basins()?)?;
        log::info!(
            "[HDS Debug] {}: reading {} {} series for {} basins",
            self.region(),
            raw_vars.len(),
            kind,
            basins.len()
        );
        self.load_timeseries(basins, kind, raw_vars, range)
    }

    fn read_nestedness(&self, basins: &[BasinId]) -> Result<Vec<Nestedness>> {
        if !self.capabilities().supports(Capability::Nestedness) {
            return Err(HdsError::UnsupportedOperation {
                region: self.region(),
                capability: Capability::Nestedness,
            });
        }
        self.probe()?;
        check_basins(self.region(), basins, &self.scan_basins()?)?;
        self.load_nestedness(basins)
    }
}

/// The adapter that reads `region`'s files under `data_path`.
pub fn adapter_for(region: DatasetRegion, data_path: &Path) -> Box<dyn RawAdapter> {
    use regions::*;
    let path = data_path.to_path_buf();
    match region {
        DatasetRegion::CamelsAus | DatasetRegion::CamelsAusV2 => {
            Box::new(AusAdapter::new(region, path))
        }
        DatasetRegion::CamelsBr => Box::new(BrAdapter::new(path)),
        DatasetRegion::CamelsCh => Box::new(ChAdapter::new(path)),
        DatasetRegion::CamelsDe => Box::new(DeAdapter::new(path)),
        DatasetRegion::CamelsDk => Box::new(DkAdapter::new(path)),
        DatasetRegion::CamelsFr => Box::new(FrAdapter::new(path)),
        DatasetRegion::CamelsInd => Box::new(IndAdapter::new(path)),
        DatasetRegion::CamelsSe => Box::new(SeAdapter::new(path)),
        DatasetRegion::Robin => Box::new(RobinAdapter::new(path)),
    }
}

/// Fail with the full list of valid ids if any requested basin is unknown.
pub fn check_basins(
    region: DatasetRegion,
    basins: &[BasinId],
    known: &BTreeSet<BasinId>,
) -> Result<()> {
    match basins.iter().find(|b| !known.contains(*b)) {
        None => Ok(()),
        Some(basin) => Err(HdsError::BasinNotFound {
            region,
            basin: basin.to_string(),
            valid: known.iter().map(|b| b.to_string()).collect(),
        }),
    }
}

/// A basin id taken verbatim from a file. Usable wherever an
/// `Fn(&str) -> BasinId` is expected, for any borrow of the text.
pub(crate) fn plain_id(id: &str) -> BasinId {
    BasinId::new(id)
}

/// Ids listed in the `id_col` column of a table.
pub(crate) fn basins_from_table(
    table: &Table,
    id_col: &str,
    id: impl Fn(&str) -> BasinId,
) -> Result<BTreeSet<BasinId>> {
    let c = table.require(id_col)?;
    Ok((0..table.rows.len())
        .map(|r| table.cell(r, c))
        .filter(|s| !s.is_empty())
        .map(id)
        .collect())
}

/// Merge every column of an attribute table into `out` for the wanted
/// basins. Missing files are skipped with a warning; providers leave some
/// attribute groups out of partial downloads.
pub(crate) fn merge_attribute_file(
    path: &Path,
    format: TableFormat,
    id_col: &str,
    id: impl Fn(&str) -> BasinId,
    wanted: &BTreeSet<&BasinId>,
    out: &mut BTreeMap<BasinId, RawAttributes>,
) -> Result<()> {
    if !path.is_file() {
        log::warn!("attribute file {} not found, skipping", path.display());
        return Ok(());
    }
    let table = Table::read(path, format)?;
    let c = table.require(id_col)?;
    for r in 0..table.rows.len() {
        let basin = id(table.cell(r, c));
        if !wanted.contains(&basin) {
            continue;
        }
        let attrs = out.entry(basin).or_default();
        for (i, header) in table.headers.iter().enumerate() {
            if i == c {
                continue;
            }
            let (name, unit) = split_unit(header);
            attrs.insert(
                name.to_string(),
                RawAttribute {
                    value: AttributeValue::parse(table.cell(r, i)),
                    unit: unit.map(str::to_string),
                },
            );
        }
    }
    Ok(())
}

/// Accumulates dated readings for one basin.
///
/// Later rows for a date already seen replace the earlier ones; only dates
/// inside the range are kept. Streamflow readings below zero become gaps.
pub(crate) struct SeriesBuilder {
    columns: Vec<RawColumn>,
    range: TimeRange,
    kind: SeriesKind,
    rows: BTreeMap<NaiveDate, Vec<Reading>>,
}

impl SeriesBuilder {
    pub fn new(raw_vars: &[String], kind: SeriesKind, range: &TimeRange) -> Self {
        SeriesBuilder {
            columns: raw_vars
                .iter()
                .map(|v| RawColumn {
                    name: v.clone(),
                    unit: None,
                })
                .collect(),
            range: *range,
            kind,
            rows: BTreeMap::new(),
        }
    }

    pub fn set_unit(&mut self, col: usize, unit: Option<String>) {
        if let (Some(c), Some(u)) = (self.columns.get_mut(col), unit) {
            c.unit = Some(u);
        }
    }

    /// Store one cell. `col` indexes the requested raw variables.
    pub fn push(&mut self, date: NaiveDate, col: usize, reading: Reading) {
        if !self.range.contains(date) || col >= self.columns.len() {
            return;
        }
        let reading = match self.kind {
            SeriesKind::Streamflow => reading.non_negative(),
            SeriesKind::Forcing => reading,
        };
        let width = self.columns.len();
        self.rows
            .entry(date)
            .or_insert_with(|| vec![Reading::Missing; width])[col] = reading;
    }

    /// Record that `date` exists in the source, as a row of gaps until
    /// readings arrive.
    pub fn touch(&mut self, date: NaiveDate) {
        if !self.range.contains(date) {
            return;
        }
        let width = self.columns.len();
        self.rows
            .entry(date)
            .or_insert_with(|| vec![Reading::Missing; width]);
    }

    /// Copy the requested columns out of a per-basin table. Columns the
    /// table lacks read as gaps on every dated row.
    pub fn push_table(&mut self, table: &Table, dates: DateSpec) -> Result<()> {
        let dates = table.dates(dates)?;
        let cols: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| table.column(&c.name))
            .collect();
        for (i, c) in cols.iter().enumerate() {
            match c {
                Some(c) => self.set_unit(i, table.column_unit(*c)),
                None => log::warn!(
                    "column '{}' not in {}, filling with gaps",
                    self.columns[i].name,
                    table.path.display()
                ),
            }
        }
        for (r, date) in dates.iter().enumerate() {
            let Some(date) = date else { continue };
            self.touch(*date);
            for (i, c) in cols.iter().enumerate() {
                if let Some(c) = c {
                    self.push(*date, i, Reading::parse(table.cell(r, *c)));
                }
            }
        }
        Ok(())
    }

    pub fn finish(self) -> RawSeries {
        RawSeries {
            columns: self.columns,
            rows: self.rows.into_iter().collect(),
        }
    }
}

/// Split a wide table (one column per station) into per-basin series of a
/// single raw variable. `header_id` maps a column header to its basin id.
pub(crate) fn wide_series(
    table: &Table,
    dates: DateSpec,
    raw_var: &str,
    kind: SeriesKind,
    range: &TimeRange,
    basins: &[BasinId],
    header_id: impl Fn(&str) -> BasinId,
) -> Result<BTreeMap<BasinId, SeriesBuilder>> {
    let dates = table.dates(dates)?;
    let vars = [raw_var.to_string()];
    let mut out = BTreeMap::new();
    for basin in basins {
        let col = table.headers.iter().position(|h| header_id(h) == *basin);
        let mut builder = SeriesBuilder::new(&vars, kind, range);
        match col {
            Some(c) => {
                for (r, date) in dates.iter().enumerate() {
                    if let Some(date) = date {
                        builder.push(*date, 0, Reading::parse(table.cell(r, c)));
                    }
                }
            }
            None => log::warn!(
                "station {} has no column in {}",
                basin,
                table.path.display()
            ),
        }
        out.insert(basin.clone(), builder);
    }
    Ok(out)
}
