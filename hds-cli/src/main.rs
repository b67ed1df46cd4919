//! hds-cli - read, cache and download CAMELS-family hydrological datasets.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "hds-cli",
    version,
    about = "Hydrological dataset access and caching toolkit"
)]
struct Cli {
    #[command(flatten)]
    dataset: hds_cmd::DatasetArgs,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: hds_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    hds_cmd::run(cli.dataset, cli.command).await
}
