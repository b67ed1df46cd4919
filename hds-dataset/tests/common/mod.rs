#![allow(dead_code)]

use std::{fs, path::Path};

use hds_core::DatasetRegion;
use hds_dataset::Dataset;
use tempfile::TempDir;

pub fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Raw data tree plus a separate cache directory.
pub struct Fixture {
    pub data: TempDir,
    pub cache: TempDir,
    pub region: DatasetRegion,
}

impl Fixture {
    pub fn open(&self) -> Dataset {
        Dataset::builder(self.data.path(), self.region)
            .cache_root(self.cache.path())
            .open()
            .unwrap()
    }
}

pub const CH_2009: &str = "date,discharge_vol(m3/s),precipitation(mm/d),temperature_mean(degC)\n\
1981-01-01,3.2,0.0,-1.5\n\
1981-01-02,-1,1.5,-2.0\n\
1981-01-03,NaN,2.0,0.5\n\
1981-01-04,4.0,0.0,1.0\n\
1981-01-05,4.5,7.25,2.0\n";

pub const CH_2011: &str = "date,discharge_vol(m3/s),precipitation(mm/d),temperature_mean(degC)\n\
1981-01-01,10,0.5,-4.0\n\
1981-01-02,11,0.0,-3.5\n\
1981-01-03,12,3.0,-3.0\n\
1981-01-04,13,1.0,-2.5\n\
1981-01-05,14,0.0,-2.0\n";

pub fn camels_ch() -> Fixture {
    let data = tempfile::tempdir().unwrap();
    let root = data.path();
    write(
        root,
        "static_attributes/CAMELS_CH_hydrology_attributes_obs.csv",
        "hydrological signatures\ngauge_id,q_mean\n2009,2.5\n2011,1.1\n",
    );
    write(
        root,
        "static_attributes/CAMELS_CH_climate_attributes_obs.csv",
        "climate indices\ngauge_id,p_mean,aridity,frac_snow\n2009,3.1,0.6,0.1\n2011,4.2,0.4,0.3\n",
    );
    write(
        root,
        "static_attributes/CAMELS_CH_topographic_attributes.csv",
        "topography\ngauge_id,gauge_name,area,elev_mean\n2009,Basel,120.5,400\n2011,Bern,88,550\n",
    );
    write(root, "timeseries/observation_based/CAMELS_CH_obs_based_2009.csv", CH_2009);
    write(root, "timeseries/observation_based/CAMELS_CH_obs_based_2011.csv", CH_2011);
    Fixture {
        data,
        cache: tempfile::tempdir().unwrap(),
        region: DatasetRegion::CamelsCh,
    }
}

pub fn camels_se() -> Fixture {
    let data = tempfile::tempdir().unwrap();
    let root = data.path();
    write(
        root,
        "catchment properties/catchment properties/catchments_physical_properties.csv",
        "ID,Name,Area_km2\n5,Torneälven,40131\n20,Kalixälven,18130\n",
    );
    write(
        root,
        "catchment time series/catchment time series/catchment_id_5_TORNEALVEN.csv",
        "Year,Month,Day,Qobs_m3s,Qobs_mm,Pobs_mm,Tobs_C\n\
         1961,1,1,120.5,0.26,0.4,50\n1961,1,2,-999,0,0,212\n",
    );
    Fixture {
        data,
        cache: tempfile::tempdir().unwrap(),
        region: DatasetRegion::CamelsSe,
    }
}

pub fn camels_br() -> Fixture {
    let data = tempfile::tempdir().unwrap();
    let root = data.path();
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
    Fixture {
        data,
        cache: tempfile::tempdir().unwrap(),
        region: DatasetRegion::CamelsBr,
    }
}

pub fn camels_fr() -> Fixture {
    let data = tempfile::tempdir().unwrap();
    let root = data.path();
    write(
        root,
        "CAMELS_FR_attributes/static_attributes/CAMELS_FR_geology_attributes.csv",
        "sta_code_h3;geo_dom_class\nA105003001;sedimentary\nA107020001;plutonic\n",
    );
    write(
        root,
        "CAMELS_FR_geography/CAMELS_FR_catchment_nestedness_information.csv",
        "sta_code_h3;nes_is_nested;nes_n_station_ds;nes_next_station_ds;nes_dist_ds;nes_station_nested_within\n\
         A105003001;True;1;A107020001;8.25;\n\
         A107020001;False;0;;;A105003001\n",
    );
    Fixture {
        data,
        cache: tempfile::tempdir().unwrap(),
        region: DatasetRegion::CamelsFr,
    }
}

pub fn robin() -> Fixture {
    let data = tempfile::tempdir().unwrap();
    let root = data.path();
    write(
        root,
        "ROBIN_metadata.csv",
        "ROBIN_ID,COUNTRY,STATION,RIVER,AREA,LATITUDE,LONGITUDE\n\
         GB00055,GB,Kirkby Thore,Eden,616.4,54.63,-2.55\n\
         AU00012,AU,Lake Mackintosh,Murchison,NA,-41.7,145.6\n",
    );
    write(
        root,
        "ROBIN_daily_flow.csv",
        "GB00055,1970-01-01,12.5\nAU00012,1970-01-01,3\nGB00055,1970-01-02,-999\n",
    );
    Fixture {
        data,
        cache: tempfile::tempdir().unwrap(),
        region: DatasetRegion::Robin,
    }
}
