use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{error::Capability, time_range::TimeRange};

/// A published hydrological dataset. Selects the raw format adapter and the
/// catalog rows used to normalise its variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatasetRegion {
    #[serde(rename = "AUS")]
    CamelsAus,
    #[serde(rename = "AUS_v2")]
    CamelsAusV2,
    #[serde(rename = "BR")]
    CamelsBr,
    #[serde(rename = "CH")]
    CamelsCh,
    #[serde(rename = "DE")]
    CamelsDe,
    #[serde(rename = "DK")]
    CamelsDk,
    #[serde(rename = "FR")]
    CamelsFr,
    #[serde(rename = "IND")]
    CamelsInd,
    #[serde(rename = "SE")]
    CamelsSe,
    #[serde(rename = "ROBIN")]
    Robin,
}

/// What a region can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub forcing: bool,
    pub cache: bool,
    /// Publishes upstream and downstream relations between gauges.
    pub nestedness: bool,
}

impl Capabilities {
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Attributes | Capability::Streamflow => true,
            Capability::Forcing => self.forcing,
            Capability::Cache => self.cache,
            Capability::Nestedness => self.nestedness,
        }
    }
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

impl DatasetRegion {
    pub const ALL: [DatasetRegion; 10] = [
        DatasetRegion::CamelsAus,
        DatasetRegion::CamelsAusV2,
        DatasetRegion::CamelsBr,
        DatasetRegion::CamelsCh,
        DatasetRegion::CamelsDe,
        DatasetRegion::CamelsDk,
        DatasetRegion::CamelsFr,
        DatasetRegion::CamelsInd,
        DatasetRegion::CamelsSe,
        DatasetRegion::Robin,
    ];

    /// Short code used in catalogs, cache directories and on the command line.
    pub fn code(&self) -> &'static str {
        match self {
            DatasetRegion::CamelsAus => "AUS",
            DatasetRegion::CamelsAusV2 => "AUS_v2",
            DatasetRegion::CamelsBr => "BR",
            DatasetRegion::CamelsCh => "CH",
            DatasetRegion::CamelsDe => "DE",
            DatasetRegion::CamelsDk => "DK",
            DatasetRegion::CamelsFr => "FR",
            DatasetRegion::CamelsInd => "IND",
            DatasetRegion::CamelsSe => "SE",
            DatasetRegion::Robin => "ROBIN",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        let nestedness = *self == DatasetRegion::CamelsFr;
        match self {
            DatasetRegion::Robin => Capabilities {
                forcing: false,
                cache: false,
                nestedness,
            },
            DatasetRegion::CamelsCh | DatasetRegion::CamelsInd | DatasetRegion::CamelsBr => {
                Capabilities {
                    forcing: true,
                    cache: true,
                    nestedness,
                }
            }
            _ => Capabilities {
                forcing: true,
                cache: false,
                nestedness,
            },
        }
    }

    /// Period covered by the published release, `[start, end)`.
    pub fn default_time_range(&self) -> TimeRange {
        let (start, end) = match self {
            DatasetRegion::CamelsAus | DatasetRegion::CamelsAusV2 => {
                (ymd(1990, 1, 1), ymd(2010, 1, 1))
            }
            DatasetRegion::CamelsBr => (ymd(1995, 1, 1), ymd(2015, 1, 1)),
            DatasetRegion::CamelsCh => (ymd(1981, 1, 1), ymd(2021, 1, 1)),
            DatasetRegion::CamelsDe => (ymd(1951, 1, 1), ymd(2021, 1, 1)),
            DatasetRegion::CamelsDk => (ymd(1989, 1, 2), ymd(2024, 1, 2)),
            DatasetRegion::CamelsFr => (ymd(1970, 1, 1), ymd(2022, 1, 1)),
            DatasetRegion::CamelsInd => (ymd(1980, 1, 1), ymd(2021, 1, 1)),
            DatasetRegion::CamelsSe => (ymd(1961, 1, 1), ymd(2021, 1, 1)),
            DatasetRegion::Robin => (ymd(1900, 1, 1), ymd(2023, 1, 1)),
        };
        TimeRange { start, end }
    }

    /// Files published by the data provider. Empty when the data must be
    /// placed under the data path by hand.
    pub fn download_urls(&self) -> Vec<String> {
        let (base, files): (&str, &[&str]) = match self {
            DatasetRegion::CamelsAus | DatasetRegion::CamelsAusV2 => (
                "https://download.pangaea.de/dataset/921850",
                &[
                    "files/01_id_name_metadata.zip",
                    "files/02_location_boundary_area.zip",
                    "files/03_streamflow.zip",
                    "files/04_attributes.zip",
                    "files/05_hydrometeorology.zip",
                    "files/CAMELS_AUS_Attributes-Indices_MasterTable.csv",
                ],
            ),
            DatasetRegion::CamelsBr => (
                "https://zenodo.org/records/15025488",
                &[
                    "files/01_CAMELS_BR_attributes.zip",
                    "files/03_CAMELS_BR_streamflow_selected_catchments.zip",
                    "files/05_CAMELS_BR_precipitation.zip",
                    "files/06_CAMELS_BR_actual_evapotransp.zip",
                    "files/07_CAMELS_BR_potential_evapotransp.zip",
                    "files/09_CAMELS_BR_temperature.zip",
                ],
            ),
            DatasetRegion::CamelsCh => (
                "https://zenodo.org/records/15025258",
                &["files/camels_ch.zip"],
            ),
            DatasetRegion::CamelsDe => (
                "https://zenodo.org/records/13837553",
                &["files/camels_de.zip"],
            ),
            DatasetRegion::CamelsDk => (
                "https://gdex.ucar.edu/dataset/camels",
                &["file/basin_set_full_res.zip"],
            ),
            DatasetRegion::CamelsFr => (
                "https://entrepot.recherche.data.gouv.fr",
                &["api/access/datafiles?gbrecs=true&format=original"],
            ),
            DatasetRegion::CamelsInd => (
                "https://zenodo.org/records/14999580",
                &["files/CAMELS_IND_All_Catchments.zip"],
            ),
            DatasetRegion::CamelsSe => (
                "https://api.researchdata.se/dataset/2023-173/1",
                &[
                    "file/data?filePath=catchment+properties.zip",
                    "file/data?filePath=catchment+time+series.zip",
                ],
            ),
            // distributed on request, no public file list
            DatasetRegion::Robin => return Vec::new(),
        };
        files.iter().map(|f| format!("{}/{}", base, f)).collect()
    }
}

impl fmt::Display for DatasetRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetRegion::Robin => f.write_str("ROBIN"),
            DatasetRegion::CamelsAusV2 => f.write_str("CAMELS-AUS_v2"),
            other => write!(f, "CAMELS-{}", other.code()),
        }
    }
}

impl FromStr for DatasetRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches("CAMELS-").trim_start_matches("camels-");
        DatasetRegion::ALL
            .iter()
            .find(|r| r.code().eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or_else(|| {
                let codes: Vec<&str> = DatasetRegion::ALL.iter().map(|r| r.code()).collect();
                format!("unknown region '{}', expected one of {}", s, codes.join(", "))
            })
    }
}
