use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use hds_core::{BasinId, DatasetRegion, HdsError, Reading, Result, SeriesKind, TimeRange};
use hds_utils::dates::parse_date_flexible;

use super::wanted;
use crate::{
    basins_from_table, merge_attribute_file, plain_id,
    table::{Table, TableFormat},
    RawAdapter, RawAttributes, RawSeries, SeriesBuilder,
};

const METADATA_FILE: &str = "ROBIN_metadata.csv";
const FLOW_FILE: &str = "ROBIN_daily_flow.csv";
const FLOW_VARIABLE: &str = "flow";

/// ROBIN reference stations: discharge only, no forcing. Daily flows come
/// as one long `id,date,flow` table without a header.
pub struct RobinAdapter {
    data_path: PathBuf,
}

impl RobinAdapter {
    pub fn new(data_path: PathBuf) -> Self {
        RobinAdapter { data_path }
    }
}

impl RawAdapter for RobinAdapter {
    fn region(&self) -> DatasetRegion {
        DatasetRegion::Robin
    }

    fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn gauge_file(&self) -> PathBuf {
        self.data_path.join(METADATA_FILE)
    }

    fn scan_basins(&self) -> Result<BTreeSet<BasinId>> {
        let table = Table::read(&self.gauge_file(), TableFormat::CSV)?;
        basins_from_table(&table, "ROBIN_ID", plain_id)
    }

    fn load_attributes(&self, basins: &[BasinId]) -> Result<BTreeMap<BasinId, RawAttributes>> {
        let mut out = BTreeMap::new();
        merge_attribute_file(
            &self.gauge_file(),
            TableFormat::CSV,
            "ROBIN_ID",
            plain_id,
            &wanted(basins),
            &mut out,
        )?;
        Ok(out)
    }

    fn load_timeseries(
        &self,
        basins: &[BasinId],
        kind: SeriesKind,
        raw_vars: &[String],
        range: &TimeRange,
    ) -> Result<BTreeMap<BasinId, RawSeries>> {
        let path = self.data_path.join(FLOW_FILE);
        if !path.is_file() {
            return Err(HdsError::DataNotFound {
                region: self.region(),
                path,
            });
        }
        let col = raw_vars.iter().position(|v| v == FLOW_VARIABLE);
        let mut builders: BTreeMap<BasinId, SeriesBuilder> = basins
            .iter()
            .map(|b| (b.clone(), SeriesBuilder::new(raw_vars, kind, range)))
            .collect();
        if let Some(col) = col {
            let table = Table::read(&path, TableFormat::CSV.headerless())?;
            for row in &table.rows {
                let (Some(id), Some(date), Some(value)) = (row.first(), row.get(1), row.get(2))
                else {
                    continue;
                };
                let Some(builder) = builders.get_mut(id.as_str()) else {
                    continue;
                };
                match parse_date_flexible(date) {
                    Ok(date) => builder.push(date, col, Reading::parse(value)),
                    Err(e) => log::warn!("{}: skipping row of {}: {}", path.display(), id, e),
                }
            }
        }
        Ok(builders
            .into_iter()
            .map(|(b, builder)| (b, builder.finish()))
            .collect())
    }
}
