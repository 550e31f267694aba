use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

/// The network used when none is given.
const DEFAULT_NETWORK: &str = "hardhat";

#[derive(Parser)]
#[command(name = "dcakit")]
#[command(
    author,
    version,
    about = "Deploy and verify the DCA periphery contracts"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "DCAKIT_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The network to operate on. Must be declared under `[networks]` in the configuration.
    #[arg(short, long, env = "DCAKIT_NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Path to the configuration file, or to the directory containing `Dcakit.toml`.
    ///
    /// Relative `artifacts` and `deployments` paths are resolved against this directory.
    #[arg(long, alias = "conf", env = "DCAKIT_CONFIG", default_value = ".")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Command {
    /// Deploy the contracts of the plan that are not deployed yet.
    Deploy {
        /// Only deploy these tags (and the tags they depend on).
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Submit the deployed contracts to the network's block explorer.
    Verify,
    /// Print the deterministic address of a contract without deploying it.
    Address {
        /// Name of the deployment.
        name: String,
    },
    /// List the deployment records of the network.
    Records,
    /// Write a starter configuration file.
    Init,
}
