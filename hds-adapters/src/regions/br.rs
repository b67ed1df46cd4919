use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use hds_core::{BasinId, DatasetRegion, HdsError, Reading, Result, SeriesKind, TimeRange};

use super::wanted;
use crate::{
    basins_from_table, merge_attribute_file, plain_id,
    table::{DateSpec, Table, TableFormat},
    RawAdapter, RawAttributes, RawSeries, SeriesBuilder,
};

const ATTRIBUTE_GROUPS: [&str; 8] = [
    "climate",
    "geology",
    "human_intervention",
    "hydrology",
    "land_cover",
    "quality_check",
    "soil",
    "topography",
];

/// Numbered product folders, keyed by raw variable name.
const PRODUCTS: [(&str, &str); 10] = [
    ("streamflow_mm_selected_catchments", "03"),
    ("precipitation_chirps", "05"),
    ("precipitation_mswep", "06"),
    ("precipitation_cpc", "07"),
    ("evapotransp_gleam", "08"),
    ("evapotransp_mgb", "09"),
    ("potential_evapotransp_gleam", "10"),
    ("temperature_min_cpc", "11"),
    ("temperature_mean_cpc", "12"),
    ("temperature_max_cpc", "13"),
];

/// The measurement follows the year, month and day columns.
const VALUE_COLUMN: usize = 3;

/// CAMELS-BR: whitespace separated text files, one per basin and product.
pub struct BrAdapter {
    data_path: PathBuf,
}

impl BrAdapter {
    pub fn new(data_path: PathBuf) -> Self {
        BrAdapter { data_path }
    }

    fn attribute_file(&self, group: &str) -> PathBuf {
        self.data_path
            .join("01_CAMELS_BR_attributes")
            .join("01_CAMELS_BR_attributes")
            .join(format!("camels_br_{}.txt", group))
    }

    fn product_file(&self, var: &str, basin: &BasinId) -> Result<PathBuf> {
        let (_, number) = PRODUCTS.iter().find(|(v, _)| *v == var).ok_or_else(|| {
            HdsError::raw_format(&self.data_path, format!("no product folder holds '{}'", var))
        })?;
        let folder = format!("{}_CAMELS_BR_{}", number, var);
        // file names drop the source suffix for temperature and the
        // selection suffix for streamflow
        let stem = match var {
            "streamflow_mm_selected_catchments" => "streamflow_mm",
            v if v.starts_with("temperature_") => v.trim_end_matches("_cpc"),
            v => v,
        };
        Ok(self
            .data_path
            .join(&folder)
            .join(&folder)
            .join(format!("{}_{}.txt", basin, stem)))
    }
}

impl RawAdapter for BrAdapter {
    fn region(&self) -> DatasetRegion {
        DatasetRegion::CamelsBr
    }

    fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn gauge_file(&self) -> PathBuf {
        self.attribute_file("topography")
    }

    fn scan_basins(&self) -> Result<BTreeSet<BasinId>> {
        let table = Table::read(&self.gauge_file(), TableFormat::WHITESPACE)?;
        basins_from_table(&table, "gauge_id", plain_id)
    }

    fn load_attributes(&self, basins: &[BasinId]) -> Result<BTreeMap<BasinId, RawAttributes>> {
        let wanted = wanted(basins);
        let mut out = BTreeMap::new();
        for group in ATTRIBUTE_GROUPS {
            merge_attribute_file(
                &self.attribute_file(group),
                TableFormat::WHITESPACE,
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
        let mut out = BTreeMap::new();
        for basin in basins {
            let mut builder = SeriesBuilder::new(raw_vars, kind, range);
            for (i, var) in raw_vars.iter().enumerate() {
                let path = self.product_file(var, basin)?;
                if !path.is_file() {
                    return Err(HdsError::DataNotFound {
                        region: self.region(),
                        path,
                    });
                }
                let table = Table::read(&path, TableFormat::WHITESPACE)?;
                for (r, date) in table.dates(DateSpec::Ymd)?.into_iter().enumerate() {
                    if let Some(date) = date {
                        builder.push(date, i, Reading::parse(table.cell(r, VALUE_COLUMN)));
                    }
                }
            }
            out.insert(basin.clone(), builder.finish());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::fixture::write;
    use hds_core::AttributeValue;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "01_CAMELS_BR_attributes/01_CAMELS_BR_attributes/camels_br_topography.txt",
            "gauge_id elev_mean area\n10500000 612.3 1450.5\n10100000 300 77\n",
        );
        write(
            root,
            "03_CAMELS_BR_streamflow_mm_selected_catchments/03_CAMELS_BR_streamflow_mm_selected_catchments/10500000_streamflow_mm.txt",
            "year month day streamflow_mm qual_control_by_ana qual_flag\n\
             1995 01 01 1.2 1 100\n1995 01 02 -99 1 0\n",
        );
        write(
            root,
            "12_CAMELS_BR_temperature_mean_cpc/12_CAMELS_BR_temperature_mean_cpc/10500000_temperature_mean.txt",
            "year month day temperature_mean\n1995 01 01 24.1\n",
        );
        dir
    }

    #[test]
    fn reads_whitespace_attributes() {
        let dir = tree();
        let adapter = BrAdapter::new(dir.path().to_path_buf());
        assert_eq!(adapter.scan_basins().unwrap().len(), 2);
        let attrs = adapter.read_attributes(&["10500000".into()]).unwrap();
        assert_eq!(
            attrs[&BasinId::new("10500000")]["area"].value,
            AttributeValue::Number(1450.5)
        );
    }

    #[test]
    fn resolves_product_file_names() {
        let dir = tree();
        let adapter = BrAdapter::new(dir.path().to_path_buf());
        let range = TimeRange::parse("1995-01-01", "1995-01-03").unwrap();
        let q = adapter
            .read_timeseries(
                &["10500000".into()],
                SeriesKind::Streamflow,
                &["streamflow_mm_selected_catchments".into()],
                &range,
            )
            .unwrap();
        let q = &q[&BasinId::new("10500000")];
        assert_eq!(q.rows[0].1[0], Reading::Value(1.2));
        assert_eq!(q.rows[1].1[0], Reading::Missing);

        let t = adapter
            .read_timeseries(
                &["10500000".into()],
                SeriesKind::Forcing,
                &["temperature_mean_cpc".into()],
                &range,
            )
            .unwrap();
        assert_eq!(t[&BasinId::new("10500000")].rows[0].1[0], Reading::Value(24.1));
    }
}
