use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use hds_core::{
    nestedness::{parse_flag, parse_id_list},
    BasinId, DatasetRegion, Nestedness, Result, SeriesKind, TimeRange,
};

use super::{per_basin_series, wanted, BasinFile};
use crate::{
    basins_from_table, merge_attribute_file, plain_id,
    table::{DateSpec, Table, TableFormat},
    RawAdapter, RawAttributes, RawSeries,
};

const STATIC_GROUPS: [&str; 6] = [
    "geology",
    "human_influences_dams",
    "hydrogeology",
    "land_cover",
    "station_general",
    "topography_general",
];

const STATISTICS_GROUPS: [&str; 4] = [
    "climatic_statistics",
    "hydroclimatic_statistics_joint_availability_yearly",
    "hydrological_signatures",
    "hydrometry_statistics",
];

/// Daily files open with a block of provenance comments.
const SERIES_FORMAT: TableFormat = TableFormat::SEMICOLON.skip(7);

const ID_COLUMN: &str = "sta_code_h3";

/// CAMELS-FR: semicolon separated files, compact `YYYYMMDD` dates.
pub struct FrAdapter {
    data_path: PathBuf,
}

impl FrAdapter {
    pub fn new(data_path: PathBuf) -> Self {
        FrAdapter { data_path }
    }

    fn attribute_dir(&self) -> PathBuf {
        self.data_path.join("CAMELS_FR_attributes")
    }

    pub fn nestedness_file(&self) -> PathBuf {
        self.data_path
            .join("CAMELS_FR_geography")
            .join("CAMELS_FR_catchment_nestedness_information.csv")
    }

    fn attribute_files(&self) -> Vec<PathBuf> {
        let dir = self.attribute_dir();
        let statics = STATIC_GROUPS.iter().map(|g| {
            dir.join("static_attributes")
                .join(format!("CAMELS_FR_{}_attributes.csv", g))
        });
        let stats = STATISTICS_GROUPS.iter().map(|g| {
            dir.join("time_series_statistics")
                .join(format!("CAMELS_FR_{}.csv", g))
        });
        statics.chain(stats).collect()
    }
}

impl RawAdapter for FrAdapter {
    fn region(&self) -> DatasetRegion {
        DatasetRegion::CamelsFr
    }

    fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn gauge_file(&self) -> PathBuf {
        self.attribute_dir()
            .join("static_attributes")
            .join("CAMELS_FR_geology_attributes.csv")
    }

    fn scan_basins(&self) -> Result<BTreeSet<BasinId>> {
        let table = Table::read(&self.gauge_file(), TableFormat::SEMICOLON)?;
        basins_from_table(&table, ID_COLUMN, plain_id)
    }

    fn load_attributes(&self, basins: &[BasinId]) -> Result<BTreeMap<BasinId, RawAttributes>> {
        let wanted = wanted(basins);
        let mut out = BTreeMap::new();
        for file in self.attribute_files() {
            merge_attribute_file(
                &file,
                TableFormat::SEMICOLON,
                ID_COLUMN,
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
        let dir = self.data_path.join("CAMELS_FR_time_series").join("daily");
        per_basin_series(
            self.region(),
            basins,
            kind,
            raw_vars,
            range,
            BasinFile {
                format: SERIES_FORMAT,
                dates: DateSpec::Column("tsd_date"),
            },
            |b| Some(dir.join(format!("CAMELS_FR_tsd_{}.csv", b))),
        )
    }

    /// One record per listed gauge, in file order. An empty `basins` keeps
    /// every row.
    fn load_nestedness(&self, basins: &[BasinId]) -> Result<Vec<Nestedness>> {
        let table = Table::read(&self.nestedness_file(), TableFormat::SEMICOLON)?;
        let id = table.require(ID_COLUMN)?;
        let nested = table.require("nes_is_nested")?;
        let (count, next, dist, within) = (
            table.column("nes_n_station_ds"),
            table.column("nes_next_station_ds"),
            table.column("nes_dist_ds"),
            table.column("nes_station_nested_within"),
        );
        let wanted = wanted(basins);
        let cell = |r: usize, c: Option<usize>| c.map_or("", |c| table.cell(r, c));

        let mut out = Vec::new();
        for r in 0..table.rows.len() {
            let basin = BasinId::new(table.cell(r, id));
            if !basins.is_empty() && !wanted.contains(&basin) {
                continue;
            }
            let Some(is_nested) = parse_flag(table.cell(r, nested)) else {
                log::warn!(
                    "{}: unreadable nestedness flag '{}' for {}",
                    self.region(),
                    table.cell(r, nested),
                    basin
                );
                continue;
            };
            out.push(Nestedness {
                basin,
                is_nested,
                stations_downstream: cell(r, count).parse::<f64>().ok().map(|n| n as u32),
                next_downstream: parse_id_list(cell(r, next)).into_iter().next(),
                distance_downstream_km: cell(r, dist).parse::<f64>().ok().filter(|d| d.is_finite()),
                nested_within: parse_id_list(cell(r, within)),
            });
        }
        Ok(out)
    }
}
