use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use hds_core::{BasinId, DatasetRegion, HdsError, Result, SeriesKind, TimeRange};

use super::{per_basin_series, wanted, BasinFile};
use crate::{
    basins_from_table, merge_attribute_file, plain_id,
    table::{DateSpec, Table, TableFormat},
    RawAdapter, RawAttributes, RawSeries,
};

const ATTRIBUTE_GROUPS: [&str; 4] = [
    "hydrological_signatures_1961_2020",
    "landcover",
    "physical_properties",
    "soil_classes",
];

/// CAMELS-SE: streamflow and forcing share one file per catchment, whose
/// name carries the catchment's id and its station name.
pub struct SeAdapter {
    data_path: PathBuf,
}

impl SeAdapter {
    pub fn new(data_path: PathBuf) -> Self {
        SeAdapter { data_path }
    }

    fn attribute_file(&self, group: &str) -> PathBuf {
        self.data_path
            .join("catchment properties")
            .join("catchment properties")
            .join(format!("catchments_{}.csv", group))
    }

    fn series_dir(&self) -> PathBuf {
        self.data_path
            .join("catchment time series")
            .join("catchment time series")
    }
}

impl RawAdapter for SeAdapter {
    fn region(&self) -> DatasetRegion {
        DatasetRegion::CamelsSe
    }

    fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn gauge_file(&self) -> PathBuf {
        self.attribute_file("physical_properties")
    }

    fn scan_basins(&self) -> Result<BTreeSet<BasinId>> {
        let table = Table::read(&self.gauge_file(), TableFormat::CSV)?;
        basins_from_table(&table, "ID", plain_id)
    }

    fn load_attributes(&self, basins: &[BasinId]) -> Result<BTreeMap<BasinId, RawAttributes>> {
        let wanted = wanted(basins);
        let mut out = BTreeMap::new();
        for group in ATTRIBUTE_GROUPS {
            merge_attribute_file(
                &self.attribute_file(group),
                TableFormat::CSV,
                "ID",
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
        let dir = self.series_dir();
        let names: Vec<String> = fs::read_dir(&dir)
            .map_err(|e| HdsError::io(&dir, e))?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
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
            |b| {
                let prefix = format!("catchment_id_{}_", b);
                names
                    .iter()
                    .find(|n| n.starts_with(&prefix) && n.ends_with(".csv"))
                    .map(|n| dir.join(n))
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::fixture::write;
    use hds_core::{AttributeValue, Reading};

    #[test]
    fn matches_series_file_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "catchment properties/catchment properties/catchments_physical_properties.csv",
            "ID,Name,Area_km2\n5,Torneälven,40131\n20,Kalixälven,18130\n",
        );
        write(
            root,
            "catchment time series/catchment time series/catchment_id_5_TORNEALVEN.csv",
            "Year,Month,Day,Qobs_m3s,Qobs_mm,Pobs_mm,Tobs_C\n\
             1961,1,1,120.5,0.26,0.4,-12.1\n1961,1,2,-999,0,0,-15\n",
        );
        write(
            root,
            "catchment time series/catchment time series/catchment_id_50_OTHER.csv",
            "Year,Month,Day,Qobs_m3s\n1961,1,1,1\n",
        );
        let adapter = SeAdapter::new(root.to_path_buf());
        let attrs = adapter.read_attributes(&["5".into()]).unwrap();
        assert_eq!(
            attrs[&BasinId::new("5")]["Area_km2"].value,
            AttributeValue::Number(40131.0)
        );

        let range = adapter.region().default_time_range();
        let s = adapter
            .read_timeseries(&["5".into()], SeriesKind::Streamflow, &["Qobs_m3s".into()], &range)
            .unwrap();
        let s = &s[&BasinId::new("5")];
        assert_eq!(s.rows[0].1[0], Reading::Value(120.5));
        assert_eq!(s.rows[1].1[0], Reading::Missing);

        let err = adapter
            .read_timeseries(&["20".into()], SeriesKind::Forcing, &["Tobs_C".into()], &range)
            .unwrap_err();
        assert!(matches!(err, HdsError::DataNotFound { .. }));
    }
}
