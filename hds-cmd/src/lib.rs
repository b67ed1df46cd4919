//! Command implementations for the hydrodataset CLI.
//!
//! Every command opens one region's data under a data path, reads through
//! the cache and writes CSV or JSON to stdout or a file.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};
use log::info;

use hds_cache::Contention;
use hds_core::{BasinId, DatasetRegion, TimeRange, VariableKind};
use hds_dataset::Dataset;

pub mod fetch;
pub mod output;

pub use fetch::HttpFetcher;
use output::{open_output, Format};

/// Where the data lives and how the cache behaves.
#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Directory holding the region's raw files
    #[arg(long, env = "HDS_DATA_PATH")]
    pub data_path: PathBuf,

    /// Region code: AUS, AUS_v2, BR, CH, DE, DK, FR, IND, SE or ROBIN
    #[arg(short, long)]
    pub region: DatasetRegion,

    /// Cache directory (defaults to $HDS_CACHE_DIR or ~/.cache/hydrodataset)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Fail instead of waiting when another process is building the cache
    #[arg(long)]
    pub fail_fast: bool,

    /// Download the region's files first if they are missing
    #[arg(long)]
    pub download: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Output file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
}

/// Half-open `[start, end)` period; either end defaults to the region's
/// published period.
#[derive(Args, Debug, Clone, Default)]
pub struct PeriodArgs {
    /// First day, YYYY-MM-DD
    #[arg(long)]
    pub start: Option<String>,

    /// Day after the last one, YYYY-MM-DD
    #[arg(long)]
    pub end: Option<String>,
}

impl PeriodArgs {
    pub fn resolve(&self, region: DatasetRegion) -> anyhow::Result<TimeRange> {
        let default = region.default_time_range();
        let start = self.start.clone().unwrap_or_else(|| default.start.to_string());
        let end = self.end.clone().unwrap_or_else(|| default.end.to_string());
        TimeRange::parse(&start, &end).with_context(|| format!("period {} to {}", start, end))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List basin ids
    Basins {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List canonical variables
    Variables {
        /// attribute, forcing or streamflow (all when omitted)
        #[arg(long)]
        kind: Option<VariableKind>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Static basin attributes
    Attributes {
        /// Comma separated basin ids (all when omitted)
        #[arg(short, long, value_delimiter = ',')]
        basins: Vec<String>,

        /// Comma separated variable names (all when omitted)
        #[arg(short = 'V', long, value_delimiter = ',')]
        variables: Vec<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Daily meteorological forcing
    Forcing {
        #[arg(short, long, value_delimiter = ',')]
        basins: Vec<String>,

        #[arg(short = 'V', long, value_delimiter = ',')]
        variables: Vec<String>,

        #[command(flatten)]
        period: PeriodArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Daily streamflow in ft^3/s
    Streamflow {
        #[arg(short, long, value_delimiter = ',')]
        basins: Vec<String>,

        #[command(flatten)]
        period: PeriodArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Gauge nesting relations (CAMELS-FR only)
    Nestedness {
        #[arg(short, long, value_delimiter = ',')]
        basins: Vec<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Download and extract the region's published files
    Fetch,

    /// Cache every basin and variable of the region
    WarmCache {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show what the cache holds
    CacheStatus {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Remove the region's cached artifacts
    ClearCache,
}

pub fn open_dataset(args: &DatasetArgs) -> anyhow::Result<Dataset> {
    let contention = if args.fail_fast {
        Contention::FailFast
    } else {
        Contention::Block
    };
    let mut builder = Dataset::builder(&args.data_path, args.region)
        .contention(contention)
        .download(args.download);
    if let Some(dir) = &args.cache_dir {
        builder = builder.cache_root(dir);
    }
    if args.download {
        builder = builder.fetcher(HttpFetcher::new()?);
    }
    builder
        .open()
        .with_context(|| format!("opening {} at {}", args.region, args.data_path.display()))
}

fn basin_ids(ids: &[String]) -> Vec<BasinId> {
    ids.iter().map(|b| BasinId::new(b.trim())).collect()
}

pub async fn run(args: DatasetArgs, command: Command) -> anyhow::Result<()> {
    if let Command::Fetch = command {
        let fetcher = HttpFetcher::new()?;
        fetcher.fetch(args.region, &args.data_path).await?;
        info!("{} ready at {}", args.region, args.data_path.display());
        return Ok(());
    }

    let ds = open_dataset(&args)?;
    match command {
        Command::Basins { output } => {
            let out = open_output(output.output.as_deref())?;
            output::write_basins(ds.index().basins(), output.format, out)
        }
        Command::Variables { kind, output } => {
            let kinds = match kind {
                Some(k) => vec![k],
                None => vec![
                    VariableKind::Attribute,
                    VariableKind::Forcing,
                    VariableKind::Streamflow,
                ],
            };
            let vars: Vec<_> = kinds
                .into_iter()
                .flat_map(|k| ds.index().variables(k).to_vec())
                .collect();
            let out = open_output(output.output.as_deref())?;
            output::write_variables(&vars, output.format, out)
        }
        Command::Attributes {
            basins,
            variables,
            output,
        } => {
            let table = ds.get_attributes(&basin_ids(&basins), &variables)?;
            info!("Read {} attributes for {} basins", table.variables.len(), table.basins.len());
            let out = open_output(output.output.as_deref())?;
            output::write_attributes(&table, output.format, out)
        }
        Command::Forcing {
            basins,
            variables,
            period,
            output,
        } => {
            let range = period.resolve(args.region)?;
            let arr = ds.get_forcing(&basin_ids(&basins), &variables, &range)?;
            let out = open_output(output.output.as_deref())?;
            output::write_series(&arr, output.format, out)
        }
        Command::Streamflow {
            basins,
            period,
            output,
        } => {
            let range = period.resolve(args.region)?;
            let arr = ds.get_streamflow(&basin_ids(&basins), &range)?;
            let out = open_output(output.output.as_deref())?;
            output::write_series(&arr, output.format, out)
        }
        Command::Nestedness { basins, output } => {
            let records = ds.read_nestedness(&basin_ids(&basins))?;
            let out = open_output(output.output.as_deref())?;
            output::write_nestedness(&records, output.format, out)
        }
        Command::WarmCache { output } => {
            let status = ds.warm_cache()?;
            let out = open_output(output.output.as_deref())?;
            output::write_status(&status, output.format, out)
        }
        Command::CacheStatus { output } => {
            let status = ds.cache_status()?;
            let out = open_output(output.output.as_deref())?;
            output::write_status(&status, output.format, out)
        }
        Command::ClearCache => {
            ds.clear_cache()?;
            info!("Cleared cache for {}", args.region);
            Ok(())
        }
        Command::Fetch => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::Path};

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn camels_ch(root: &Path) {
        write(
            root,
            "static_attributes/CAMELS_CH_hydrology_attributes_obs.csv",
            "hydrological signatures\ngauge_id,q_mean\n2009,2.5\n",
        );
        write(
            root,
            "static_attributes/CAMELS_CH_topographic_attributes.csv",
            "topography\ngauge_id,gauge_name,area\n2009,Basel,120.5\n",
        );
        write(
            root,
            "timeseries/observation_based/CAMELS_CH_obs_based_2009.csv",
            "date,discharge_vol(m3/s),precipitation(mm/d)\n1981-01-01,1,0.5\n1981-01-02,NaN,1\n",
        );
    }

    fn args(data: &Path, cache: &Path) -> DatasetArgs {
        DatasetArgs {
            data_path: data.to_path_buf(),
            region: DatasetRegion::CamelsCh,
            cache_dir: Some(cache.to_path_buf()),
            fail_fast: false,
            download: false,
        }
    }

    #[test]
    fn period_defaults_to_published_range() {
        let period = PeriodArgs {
            start: Some("2000-01-01".into()),
            end: None,
        };
        let r = period.resolve(DatasetRegion::CamelsCh).unwrap();
        assert_eq!(r.start.to_string(), "2000-01-01");
        assert_eq!(r.end, DatasetRegion::CamelsCh.default_time_range().end);
        assert!(PeriodArgs {
            start: Some("2000-02-01".into()),
            end: Some("2000-01-01".into()),
        }
        .resolve(DatasetRegion::CamelsCh)
        .is_err());
    }

    #[tokio::test]
    async fn forcing_command_writes_csv() {
        let data = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let outdir = tempfile::tempdir().unwrap();
        camels_ch(data.path());
        let out = outdir.path().join("forcing.csv");

        let command = Command::Forcing {
            basins: vec!["2009".into()],
            variables: vec!["precipitation".into()],
            period: PeriodArgs {
                start: Some("1981-01-01".into()),
                end: Some("1981-01-03".into()),
            },
            output: OutputArgs {
                output: Some(out.clone()),
                format: Format::Csv,
            },
        };
        run(args(data.path(), cache.path()), command).await.unwrap();
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "basin,date,precipitation(mm/day)\n2009,1981-01-01,0.5\n2009,1981-01-02,1\n"
        );

        let status = outdir.path().join("status.json");
        let command = Command::CacheStatus {
            output: OutputArgs {
                output: Some(status.clone()),
                format: Format::Json,
            },
        };
        run(args(data.path(), cache.path()), command).await.unwrap();
        let rows: Vec<serde_json::Value> =
            serde_json::from_str(&fs::read_to_string(&status).unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["kind"], "forcing");
        assert_eq!(rows[0]["current"], true);
    }

    #[tokio::test]
    async fn unknown_basin_is_reported() {
        let data = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        camels_ch(data.path());
        let command = Command::Streamflow {
            basins: vec!["9999".into()],
            period: PeriodArgs::default(),
            output: OutputArgs::default(),
        };
        let err = run(args(data.path(), cache.path()), command).await.unwrap_err();
        let hds = err.downcast_ref::<hds_core::HdsError>().unwrap();
        assert!(matches!(hds, hds_core::HdsError::BasinNotFound { .. }));
    }
}
