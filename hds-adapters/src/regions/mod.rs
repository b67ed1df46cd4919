//! One adapter per published dataset layout.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
};

use chrono::NaiveDate;
use hds_core::{BasinId, DatasetRegion, HdsError, Reading, Result, SeriesKind, TimeRange};

use crate::{
    table::{DateSpec, Table, TableFormat},
    RawColumn, RawSeries, SeriesBuilder,
};

mod aus;
mod br;
mod ch;
mod de;
mod dk;
mod fr;
mod ind;
mod robin;
mod se;

pub use aus::AusAdapter;
pub use br::BrAdapter;
pub use ch::ChAdapter;
pub use de::DeAdapter;
pub use dk::DkAdapter;
pub use fr::FrAdapter;
pub use ind::IndAdapter;
pub use robin::RobinAdapter;
pub use se::SeAdapter;

/// How one basin's time series file is located and laid out.
pub(crate) struct BasinFile {
    pub format: TableFormat,
    pub dates: DateSpec,
}

/// Read one file per basin, each holding every variable as a column.
pub(crate) fn per_basin_series(
    region: DatasetRegion,
    basins: &[BasinId],
    kind: SeriesKind,
    raw_vars: &[String],
    range: &TimeRange,
    layout: BasinFile,
    path_of: impl Fn(&BasinId) -> Option<PathBuf>,
) -> Result<BTreeMap<BasinId, RawSeries>> {
    let mut out = BTreeMap::new();
    for basin in basins {
        let path = path_of(basin).ok_or_else(|| HdsError::DataNotFound {
            region,
            path: PathBuf::from(basin.as_str()),
        })?;
        if !path.is_file() {
            return Err(HdsError::DataNotFound { region, path });
        }
        let table = Table::read(&path, layout.format)?;
        let mut builder = SeriesBuilder::new(raw_vars, kind, range);
        builder.push_table(&table, layout.dates)?;
        out.insert(basin.clone(), builder.finish());
    }
    Ok(out)
}

/// Zip single-column series (one per raw variable) into one series.
pub(crate) fn join_columns(raw_vars: &[String], parts: Vec<(usize, RawSeries)>) -> RawSeries {
    let mut columns: Vec<RawColumn> = raw_vars
        .iter()
        .map(|v| RawColumn {
            name: v.clone(),
            unit: None,
        })
        .collect();
    let mut rows: BTreeMap<NaiveDate, Vec<Reading>> = BTreeMap::new();
    for (i, part) in parts {
        if let Some(c) = part.columns.into_iter().next() {
            columns[i].unit = c.unit;
        }
        for (date, readings) in part.rows {
            let row = rows
                .entry(date)
                .or_insert_with(|| vec![Reading::Missing; raw_vars.len()]);
            if let Some(r) = readings.first() {
                row[i] = *r;
            }
        }
    }
    RawSeries {
        columns,
        rows: rows.into_iter().collect(),
    }
}

/// Requested basins as a lookup set.
pub(crate) fn wanted(basins: &[BasinId]) -> BTreeSet<&BasinId> {
    basins.iter().collect()
}
