use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use hds_core::{BasinId, DatasetRegion, Result, SeriesKind, TimeRange};

use super::{per_basin_series, wanted, BasinFile};
use crate::{
    basins_from_table, merge_attribute_file, plain_id,
    table::{DateSpec, Table, TableFormat},
    RawAdapter, RawAttributes, RawSeries,
};

const ATTRIBUTE_GROUPS: [&str; 9] = [
    "climate",
    "geology",
    "glacier",
    "humaninfluence",
    "hydrogeology",
    "hydrology",
    "landcover",
    "soil",
    "topographic",
];

/// Attribute files carry a description line above the header.
const ATTRIBUTE_FORMAT: TableFormat = TableFormat::CSV.skip(1);

/// CAMELS-CH: one observation file per basin, static attributes split by
/// theme.
pub struct ChAdapter {
    data_path: PathBuf,
}

impl ChAdapter {
    pub fn new(data_path: PathBuf) -> Self {
        ChAdapter { data_path }
    }

    fn attribute_file(&self, group: &str) -> PathBuf {
        // observation-derived groups have a simulation-based twin
        let suffix = match group {
            "climate" | "hydrology" => "_attributes_obs.csv",
            _ => "_attributes.csv",
        };
        self.data_path
            .join("static_attributes")
            .join(format!("CAMELS_CH_{}{}", group, suffix))
    }
}

impl RawAdapter for ChAdapter {
    fn region(&self) -> DatasetRegion {
        DatasetRegion::CamelsCh
    }

    fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn gauge_file(&self) -> PathBuf {
        self.attribute_file("hydrology")
    }

    fn scan_basins(&self) -> Result<BTreeSet<BasinId>> {
        let table = Table::read(&self.gauge_file(), ATTRIBUTE_FORMAT)?;
        basins_from_table(&table, "gauge_id", plain_id)
    }

    fn load_attributes(&self, basins: &[BasinId]) -> Result<BTreeMap<BasinId, RawAttributes>> {
        let wanted = wanted(basins);
        let mut out = BTreeMap::new();
        for group in ATTRIBUTE_GROUPS {
            merge_attribute_file(
                &self.attribute_file(group),
                ATTRIBUTE_FORMAT,
                "gauge_id",
                plain_id,
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
        let dir = self.data_path.join("timeseries").join("observation_based");
        per_basin_series(
            self.region(),
            basins,
            kind,
            raw_vars,
            range,
            BasinFile {
                format: TableFormat::CSV,
                dates: DateSpec::Column("date"),
            },
            |b| Some(dir.join(format!("CAMELS_CH_obs_based_{}.csv", b))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::fixture::write;
    use hds_core::{AttributeValue, HdsError, Reading};

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "static_attributes/CAMELS_CH_hydrology_attributes_obs.csv",
            "hydrological signatures\ngauge_id,q_mean\n2009,2.5\n2011,NaN\n",
        );
        std::fs::write(
            root.join("static_attributes/CAMELS_CH_topographic_attributes.csv"),
            b"topography\ngauge_id,gauge_name,area\n2009,Z\xfcrich,120.5\n2011,Bern,88\n",
        )
        .unwrap();
        write(
            root,
            "timeseries/observation_based/CAMELS_CH_obs_based_2009.csv",
            "date,discharge_vol(m3/s),precipitation(mm/d)\n\
             1981-01-01,3.2,0.0\n1981-01-02,-1,1.5\n1981-01-03,NaN,2.0\n",
        );
        dir
    }

    #[test]
    fn scans_basins_from_hydrology_file() {
        let dir = tree();
        let adapter = ChAdapter::new(dir.path().to_path_buf());
        adapter.probe().unwrap();
        let basins: Vec<String> = adapter
            .scan_basins()
            .unwrap()
            .into_iter()
            .map(|b| b.to_string())
            .collect();
        assert_eq!(basins, vec!["2009", "2011"]);
    }

    #[test]
    fn merges_attribute_groups() {
        let dir = tree();
        let adapter = ChAdapter::new(dir.path().to_path_buf());
        let attrs = adapter.read_attributes(&["2009".into()]).unwrap();
        let a = &attrs[&BasinId::new("2009")];
        assert_eq!(a["q_mean"].value, AttributeValue::Number(2.5));
        assert_eq!(a["area"].value, AttributeValue::Number(120.5));
        assert_eq!(a["gauge_name"].value, AttributeValue::Text("Zürich".into()));
        assert!(!attrs.contains_key(&BasinId::new("2011")));
    }

    #[test]
    fn reads_series_with_header_units() {
        let dir = tree();
        let adapter = ChAdapter::new(dir.path().to_path_buf());
        let range = TimeRange::parse("1981-01-01", "1981-01-03").unwrap();
        let series = adapter
            .read_timeseries(
                &["2009".into()],
                SeriesKind::Streamflow,
                &["discharge_vol".into()],
                &range,
            )
            .unwrap();
        let s = &series[&BasinId::new("2009")];
        assert_eq!(s.columns[0].unit.as_deref(), Some("m3/s"));
        assert_eq!(s.rows.len(), 2);
        assert_eq!(s.rows[0].1[0], Reading::Value(3.2));
        assert_eq!(s.rows[1].1[0], Reading::Missing);
    }

    #[test]
    fn missing_basin_file_is_data_not_found() {
        let dir = tree();
        let adapter = ChAdapter::new(dir.path().to_path_buf());
        let range = TimeRange::parse("1981-01-01", "1981-01-03").unwrap();
        let err = adapter
            .read_timeseries(&["2011".into()], SeriesKind::Forcing, &["precipitation".into()], &range)
            .unwrap_err();
        assert!(matches!(err, HdsError::DataNotFound { .. }));
    }

    #[test]
    fn empty_directory_fails_probe() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = ChAdapter::new(dir.path().to_path_buf());
        assert!(matches!(adapter.probe(), Err(HdsError::DataNotFound { .. })));
    }
}
