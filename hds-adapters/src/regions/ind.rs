use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use hds_core::{BasinId, DatasetRegion, Result, SeriesKind, TimeRange};

use super::{join_columns, per_basin_series, wanted, BasinFile};
use crate::{
    basins_from_table, merge_attribute_file,
    table::{DateSpec, Table, TableFormat},
    wide_series, RawAdapter, RawAttributes, RawSeries,
};

const ATTRIBUTE_GROUPS: [&str; 8] = [
    "anth", "clim", "geol", "hydro", "land", "name", "soil", "topo",
];

/// Gauge ids are five digits; some files drop the leading zeros.
const ID_WIDTH: usize = 5;

fn gauge_id(raw: &str) -> BasinId {
    BasinId::new(raw).zero_padded(ID_WIDTH)
}

/// CAMELS-IND: forcing per basin, observed streamflow as one wide table.
pub struct IndAdapter {
    data_path: PathBuf,
}

impl IndAdapter {
    pub fn new(data_path: PathBuf) -> Self {
        IndAdapter { data_path }
    }

    fn root(&self) -> PathBuf {
        self.data_path.join("CAMELS_IND_All_Catchments")
    }

    fn attribute_file(&self, group: &str) -> PathBuf {
        self.root()
            .join("attributes_csv")
            .join(format!("camels_ind_{}.csv", group))
    }
}

impl RawAdapter for IndAdapter {
    fn region(&self) -> DatasetRegion {
        DatasetRegion::CamelsInd
    }

    fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn gauge_file(&self) -> PathBuf {
        self.attribute_file("clim")
    }

    fn scan_basins(&self) -> Result<BTreeSet<BasinId>> {
        let table = Table::read(&self.gauge_file(), TableFormat::CSV)?;
        basins_from_table(&table, "gauge_id", gauge_id)
    }

    fn load_attributes(&self, basins: &[BasinId]) -> Result<BTreeMap<BasinId, RawAttributes>> {
        let wanted = wanted(basins);
        let mut out = BTreeMap::new();
        for group in ATTRIBUTE_GROUPS {
            merge_attribute_file(
                &self.attribute_file(group),
                TableFormat::CSV,
                "gauge_id",
                gauge_id,
                &wanted,
                &mut out,
            )?;
        }
        Ok(out)
    }

    fn load_timeseries(
        &self,
        basins: &[BasinId],
        kind: SeriesKind,
        raw_vars: &[String],
        range: &TimeRange,
    ) -> Result<BTreeMap<BasinId, RawSeries>> {
        match kind {
            SeriesKind::Forcing => {
                let dir = self.root().join("catchment_mean_forcings");
                per_basin_series(
                    self.region(),
                    basins,
                    kind,
                    raw_vars,
                    range,
                    BasinFile {
                        format: TableFormat::CSV,
                        dates: DateSpec::Ymd,
                    },
                    |b| Some(dir.join(format!("{}.csv", b))),
                )
            }
            SeriesKind::Streamflow => {
                let dir = self.root().join("streamflow_timeseries");
                let mut merged: BTreeMap<BasinId, Vec<(usize, RawSeries)>> = BTreeMap::new();
                for (i, var) in raw_vars.iter().enumerate() {
                    let table = Table::read(&dir.join(format!("{}.csv", var)), TableFormat::CSV)?;
                    let per_basin =
                        wide_series(&table, DateSpec::Ymd, var, kind, range, basins, gauge_id)?;
                    for (basin, builder) in per_basin {
                        merged.entry(basin).or_default().push((i, builder.finish()));
                    }
                }
                Ok(merged
                    .into_iter()
                    .map(|(basin, parts)| (basin, join_columns(raw_vars, parts)))
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::fixture::write;
    use hds_core::{AttributeValue, Reading};

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "CAMELS_IND_All_Catchments/attributes_csv/camels_ind_clim.csv",
            "gauge_id,p_mean,aridity\n3001,4.1,0.9\n3002,3.5,1.1\n",
        );
        write(
            root,
            "CAMELS_IND_All_Catchments/attributes_csv/camels_ind_name.csv",
            "gauge_id,cwc_site_name\n03001,Ayilam\n",
        );
        write(
            root,
            "CAMELS_IND_All_Catchments/catchment_mean_forcings/03001.csv",
            "year,month,day,prcp(mm/day),tmax(°C)\n1980,1,1,0.5,30.1\n1980,1,2,1.5,29.4\n",
        );
        write(
            root,
            "CAMELS_IND_All_Catchments/streamflow_timeseries/streamflow_observed.csv",
            "year,month,day,3001,3002\n1980,1,1,12.5,-1\n1980,1,2,,7\n",
        );
        dir
    }

    #[test]
    fn pads_gauge_ids() {
        let dir = tree();
        let adapter = IndAdapter::new(dir.path().to_path_buf());
        let basins: Vec<String> = adapter
            .scan_basins()
            .unwrap()
            .iter()
            .map(|b| b.to_string())
            .collect();
        assert_eq!(basins, vec!["03001", "03002"]);
        let attrs = adapter.read_attributes(&["03001".into()]).unwrap();
        let a = &attrs[&BasinId::new("03001")];
        assert_eq!(a["p_mean"].value, AttributeValue::Number(4.1));
        assert_eq!(a["cwc_site_name"].value, AttributeValue::Text("Ayilam".into()));
    }

    #[test]
    fn reads_forcing_with_units_in_headers() {
        let dir = tree();
        let adapter = IndAdapter::new(dir.path().to_path_buf());
        let range = TimeRange::parse("1980-01-01", "1980-01-03").unwrap();
        let s = adapter
            .read_timeseries(
                &["03001".into()],
                SeriesKind::Forcing,
                &["tmax".into(), "prcp".into()],
                &range,
            )
            .unwrap();
        let s = &s[&BasinId::new("03001")];
        assert_eq!(s.columns[0].unit.as_deref(), Some("°C"));
        assert_eq!(s.columns[1].unit.as_deref(), Some("mm/day"));
        assert_eq!(s.rows[1].1, vec![Reading::Value(29.4), Reading::Value(1.5)]);
    }

    #[test]
    fn splits_wide_streamflow() {
        let dir = tree();
        let adapter = IndAdapter::new(dir.path().to_path_buf());
        let range = TimeRange::parse("1980-01-01", "1980-01-03").unwrap();
        let s = adapter
            .read_timeseries(
                &["03002".into(), "03001".into()],
                SeriesKind::Streamflow,
                &["streamflow_observed".into()],
                &range,
            )
            .unwrap();
        let a = &s[&BasinId::new("03001")];
        assert_eq!(a.rows[0].1[0], Reading::Value(12.5));
        assert_eq!(a.rows[1].1[0], Reading::Missing);
        let b = &s[&BasinId::new("03002")];
        assert_eq!(b.rows[0].1[0], Reading::Missing);
        assert_eq!(b.rows[1].1[0], Reading::Value(7.0));
    }
}
