use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use hds_core::{BasinId, DatasetRegion, HdsError, Result, SeriesKind, TimeRange};

use super::{join_columns, wanted};
use crate::{
    basins_from_table, merge_attribute_file, plain_id,
    table::{DateSpec, Table, TableFormat},
    wide_series, RawAdapter, RawAttributes, RawSeries,
};

/// CAMELS-AUS, both releases. Every time series file is a wide table with
/// one column per station; attributes live in a single master table.
pub struct AusAdapter {
    region: DatasetRegion,
    data_path: PathBuf,
}

impl AusAdapter {
    pub fn new(region: DatasetRegion, data_path: PathBuf) -> Self {
        AusAdapter { region, data_path }
    }

    /// Forcing files are grouped by product; the variable name says which.
    fn forcing_file(&self, var: &str) -> Result<PathBuf> {
        let dir = self
            .data_path
            .join("05_hydrometeorology")
            .join("05_hydrometeorology");
        let sub: &[&str] = if var.contains("precipitation_") {
            &["01_precipitation_timeseries"]
        } else if var.contains("et_") || var.contains("evap_") {
            &["02_EvaporativeDemand_timeseries"]
        } else if var.contains("_AWAP") {
            &["03_Other", "AWAP"]
        } else if var.contains("_SILO") {
            &["03_Other", "SILO"]
        } else {
            return Err(HdsError::raw_format(
                dir,
                format!("no forcing folder holds '{}'", var),
            ));
        };
        Ok(sub
            .iter()
            .fold(dir, |p, s| p.join(s))
            .join(format!("{}.csv", var)))
    }

    fn streamflow_file(&self, var: &str) -> PathBuf {
        self.data_path
            .join("03_streamflow")
            .join("03_streamflow")
            .join(format!("{}.csv", var))
    }
}

impl RawAdapter for AusAdapter {
    fn region(&self) -> DatasetRegion {
        self.region
    }

    fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn gauge_file(&self) -> PathBuf {
        self.data_path
            .join("01_id_name_metadata")
            .join("01_id_name_metadata")
            .join("id_name_metadata.csv")
    }

    fn scan_basins(&self) -> Result<BTreeSet<BasinId>> {
        let table = Table::read(&self.gauge_file(), TableFormat::CSV)?;
        basins_from_table(&table, "station_id", plain_id)
    }

    fn load_attributes(&self, basins: &[BasinId]) -> Result<BTreeMap<BasinId, RawAttributes>> {
        let mut out = BTreeMap::new();
        merge_attribute_file(
            &self
                .data_path
                .join("CAMELS_AUS_Attributes-Indices_MasterTable.csv"),
            TableFormat::CSV,
            "station_id",
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
        let mut merged: BTreeMap<BasinId, Vec<(usize, RawSeries)>> = BTreeMap::new();
        for (i, var) in raw_vars.iter().enumerate() {
            let path = match kind {
                SeriesKind::Streamflow => self.streamflow_file(var),
                SeriesKind::Forcing => self.forcing_file(var)?,
            };
            if !path.is_file() {
                return Err(HdsError::DataNotFound {
                    region: self.region,
                    path,
                });
            }
            let table = Table::read(&path, TableFormat::CSV)?;
            for (basin, builder) in
                wide_series(&table, DateSpec::Ymd, var, kind, range, basins, plain_id)?
            {
                merged.entry(basin).or_default().push((i, builder.finish()));
            }
        }
        Ok(basins
            .iter()
            .map(|b| {
                let parts = merged.remove(b).unwrap_or_default();
                (b.clone(), join_columns(raw_vars, parts))
            })
            .collect())
    }
}
