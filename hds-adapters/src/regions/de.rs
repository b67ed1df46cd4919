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

const ATTRIBUTE_GROUPS: [&str; 7] = [
    "climatic",
    "humaninfluence",
    "hydrogeology",
    "hydrologic",
    "landcover",
    "soil",
    "topographic",
];

/// CAMELS-DE: hydro-meteorological series per basin, attribute tables at
/// the dataset root.
pub struct DeAdapter {
    data_path: PathBuf,
}

impl DeAdapter {
    pub fn new(data_path: PathBuf) -> Self {
        DeAdapter { data_path }
    }

    fn attribute_file(&self, group: &str) -> PathBuf {
        self.data_path
            .join(format!("CAMELS_DE_{}_attributes.csv", group))
    }
}

impl RawAdapter for DeAdapter {
    fn region(&self) -> DatasetRegion {
        DatasetRegion::CamelsDe
    }

    fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn gauge_file(&self) -> PathBuf {
        self.attribute_file("hydrologic")
    }

    fn scan_basins(&self) -> Result<BTreeSet<BasinId>> {
        let table = Table::read(&self.gauge_file(), TableFormat::CSV)?;
        basins_from_table(&table, "gauge_id", plain_id)
    }

    fn load_attributes(&self, basins: &[BasinId]) -> Result<BTreeMap<BasinId, RawAttributes>> {
        let wanted = wanted(basins);
        let mut out = BTreeMap::new();
        for group in ATTRIBUTE_GROUPS {
            merge_attribute_file(
                &self.attribute_file(group),
                TableFormat::CSV,
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
        let dir = self.data_path.join("timeseries");
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
            |b| Some(dir.join(format!("CAMELS_DE_hydromet_timeseries_{}.csv", b))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::fixture::write;
    use hds_core::{AttributeValue, Reading};

    #[test]
    fn reads_german_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "CAMELS_DE_hydrologic_attributes.csv",
            "gauge_id,q_mean\nDE110000,1.2\nDE110010,0.8\n",
        );
        write(
            root,
            "CAMELS_DE_topographic_attributes.csv",
            "gauge_id,gauge_name,area,elev_mean\nDE110000,Hofen,250.1,410\n",
        );
        write(
            root,
            "timeseries/CAMELS_DE_hydromet_timeseries_DE110000.csv",
            "date,discharge_vol,precipitation_mean,temperature_mean\n\
             1951-01-01,,2.1,-0.5\n1951-01-02,4.4,0.0,-1.0\n",
        );
        let adapter = DeAdapter::new(root.to_path_buf());
        assert_eq!(adapter.scan_basins().unwrap().len(), 2);

        let attrs = adapter.read_attributes(&["DE110000".into()]).unwrap();
        let a = &attrs[&BasinId::new("DE110000")];
        assert_eq!(a["gauge_name"].value, AttributeValue::Text("Hofen".into()));
        assert_eq!(a["q_mean"].value, AttributeValue::Number(1.2));

        let range = TimeRange::parse("1951-01-01", "1951-02-01").unwrap();
        let s = adapter
            .read_timeseries(
                &["DE110000".into()],
                SeriesKind::Forcing,
                &["temperature_mean".into(), "precipitation_mean".into()],
                &range,
            )
            .unwrap();
        let s = &s[&BasinId::new("DE110000")];
        assert_eq!(s.rows[0].1, vec![Reading::Value(-0.5), Reading::Value(2.1)]);
        assert_eq!(s.columns[0].unit, None);
    }
}
