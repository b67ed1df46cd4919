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

const ATTRIBUTE_GROUPS: [&str; 6] = [
    "climate",
    "geology",
    "landuse",
    "signature_obs_based",
    "soil",
    "topography",
];

/// CAMELS-DK. Gauged catchments have observation-based series; ungauged
/// ones only a simulation-based file, which is used as a fallback.
pub struct DkAdapter {
    data_path: PathBuf,
}

impl DkAdapter {
    pub fn new(data_path: PathBuf) -> Self {
        DkAdapter { data_path }
    }

    fn attribute_file(&self, group: &str) -> PathBuf {
        self.data_path
            .join("Attributes")
            .join(format!("CAMELS_DK_{}.csv", group))
    }

    fn series_file(&self, basin: &BasinId) -> PathBuf {
        let dynamics = self.data_path.join("Dynamics");
        let gauged = dynamics
            .join("Gauged_catchments")
            .join(format!("CAMELS_DK_obs_based_{}.csv", basin));
        if gauged.is_file() {
            return gauged;
        }
        dynamics
            .join("Ungauged_catchments")
            .join(format!("CAMELS_DK_sim_based_{}.csv", basin))
    }
}

impl RawAdapter for DkAdapter {
    fn region(&self) -> DatasetRegion {
        DatasetRegion::CamelsDk
    }

    fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn gauge_file(&self) -> PathBuf {
        self.attribute_file("climate")
    }

    fn scan_basins(&self) -> Result<BTreeSet<BasinId>> {
        let table = Table::read(&self.gauge_file(), TableFormat::CSV)?;
        basins_from_table(&table, "catch_id", plain_id)
    }

    fn load_attributes(&self, basins: &[BasinId]) -> Result<BTreeMap<BasinId, RawAttributes>> {
        let wanted = wanted(basins);
        let mut out = BTreeMap::new();
        for group in ATTRIBUTE_GROUPS {
            merge_attribute_file(
                &self.attribute_file(group),
                TableFormat::CSV,
                "catch_id",
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
        per_basin_series(
            self.region(),
            basins,
            kind,
            raw_vars,
            range,
            BasinFile {
                format: TableFormat::CSV,
                dates: DateSpec::Column("time"),
            },
            |b| Some(self.series_file(b)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::fixture::write;
    use hds_core::Reading;

    #[test]
    fn falls_back_to_simulated_series() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "Attributes/CAMELS_DK_climate.csv",
            "catch_id,p_mean\n12430091,2.3\n55000001,2.0\n",
        );
        write(
            root,
            "Dynamics/Gauged_catchments/CAMELS_DK_obs_based_12430091.csv",
            "time,Qobs,precipitation\n1989-01-02,1.25,0.5\n",
        );
        write(
            root,
            "Dynamics/Ungauged_catchments/CAMELS_DK_sim_based_55000001.csv",
            "time,Qsim,precipitation\n1989-01-02 00:00:00,0.7,3.5\n",
        );
        let adapter = DkAdapter::new(root.to_path_buf());
        let range = adapter.region().default_time_range();
        let s = adapter
            .read_timeseries(
                &["12430091".into(), "55000001".into()],
                SeriesKind::Forcing,
                &["precipitation".into()],
                &range,
            )
            .unwrap();
        assert_eq!(s[&BasinId::new("12430091")].rows[0].1[0], Reading::Value(0.5));
        assert_eq!(s[&BasinId::new("55000001")].rows[0].1[0], Reading::Value(3.5));

        let q = adapter
            .read_timeseries(&["55000001".into()], SeriesKind::Streamflow, &["Qobs".into()], &range)
            .unwrap();
        assert_eq!(q[&BasinId::new("55000001")].rows[0].1[0], Reading::Missing);
    }
}
