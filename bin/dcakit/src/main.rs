//! dcakit is a CLI tool to deploy the DCA periphery contracts and verify them on block explorers.

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};

use cli::{Cli, Command};
use dcakit_deploy::{
    ArtifactStore, CONFIG_FILENAME, DcakitConfig, DeployOutcome, Deployer, DeploymentPlan,
    DeploymentRecord, EtherscanVerifier, FileRecordStore, NetworkConfig, RecordStore,
    RpcChainClient, RunFlags, VerificationReport, Verifier,
};

/// Directory relative paths of the configuration are resolved against.
fn config_dir(config: &Path) -> PathBuf {
    if config.is_dir() {
        config.to_path_buf()
    } else {
        config
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn outcomes_table(outcomes: &[(String, DeployOutcome)]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Name", "Outcome", "Address"]);
    for (name, outcome) in outcomes {
        let kind = match outcome {
            DeployOutcome::Skipped => "skipped",
            DeployOutcome::Reused(_) => "reused",
            DeployOutcome::Adopted(_) => "adopted",
            DeployOutcome::Deployed(_) => "deployed",
        };
        let address = outcome
            .record()
            .map(|record| record.address.to_string())
            .unwrap_or_default();
        table.add_row(vec![name.clone(), kind.to_string(), address]);
    }
    table
}

fn report_table(report: &VerificationReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Name", "Status", "Address"]);
    for outcome in &report.outcomes {
        table.add_row(vec![
            outcome.name.clone(),
            outcome.status.to_string(),
            outcome
                .address
                .map(|address| address.to_string())
                .unwrap_or_default(),
        ]);
    }
    table
}

fn records_table(records: &[DeploymentRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Name", "Address", "Contract", "Transaction"]);
    for record in records {
        table.add_row(vec![
            record.name.clone(),
            record.address.to_string(),
            record.contract_path.clone(),
            record
                .transaction_hash
                .map(|hash| hash.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

/// Write a starter configuration with a local hardhat network.
fn init(config: &Path) -> Result<()> {
    let path = if config.is_dir() {
        config.join(CONFIG_FILENAME)
    } else {
        config.to_path_buf()
    };
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }

    let mut dcakit = DcakitConfig::default();
    let mut hardhat = NetworkConfig::new("http://127.0.0.1:8545".parse()?);
    hardhat.chain_id = Some(31337);
    dcakit.networks.insert("hardhat".to_string(), hardhat);
    dcakit.save_to_file(&path)
}

/// Fail early when the node serves another chain than the configured one.
async fn check_chain_id(chain: &RpcChainClient, network: &str, config: &NetworkConfig) -> Result<()> {
    let Some(expected) = config.chain_id else {
        return Ok(());
    };
    let actual = chain.chain_id().await?;
    if actual != expected {
        anyhow::bail!("Network `{network}` expects chain id {expected}, the node reports {actual}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    if let Command::Init = cli.command {
        return init(&cli.config);
    }

    let root = config_dir(&cli.config);
    let config = DcakitConfig::load(&cli.config)?;
    let network = config.network(&cli.network)?;
    let flags = RunFlags::from_env();

    tracing::debug!(
        command = %cli.command,
        network = %cli.network,
        rpc_url = %network.rpc_url,
        test = flags.test,
        coverage = flags.coverage,
        "Starting"
    );

    let store = FileRecordStore::new(root.join(&config.deployments), cli.network.as_str());
    let artifacts = ArtifactStore::new(root.join(&config.artifacts));
    let chain = RpcChainClient::new(network.rpc_url.clone())?;
    let plan = DeploymentPlan::new(config.deployment_specs())?;

    let deployer = Deployer {
        network: &cli.network,
        accounts: &network.accounts,
        external: &network.external,
        store: &store,
        chain: &chain,
        artifacts: &artifacts,
        factory: network.factory(),
        gas_ceiling: network.gas_limit,
        flags,
    };

    match cli.command {
        Command::Deploy { tags } => {
            check_chain_id(&chain, &cli.network, network).await?;
            let outcomes = deployer.run(&plan, &tags).await?;
            println!("{}", outcomes_table(&outcomes));
        }
        Command::Verify => {
            let explorer = network.explorer.as_ref().with_context(|| {
                format!("Network `{}` has no explorer configured", cli.network)
            })?;
            let client = EtherscanVerifier::new(
                explorer.api_url.clone(),
                explorer.api_key.clone(),
                artifacts.clone(),
            )?;
            let verifier = Verifier {
                network: &cli.network,
                store: &store,
                client: &client,
            };
            let report = verifier.run(&config.verification_targets()).await?;
            println!("{}", report_table(&report));
        }
        Command::Address { name } => {
            let spec = plan
                .get(&name)
                .with_context(|| format!("No deployment named `{name}` in the plan"))?;
            match deployer.predict_address(spec)? {
                Some(address) => println!("{address}"),
                None => anyhow::bail!("`{name}` is not deployed deterministically"),
            }
        }
        Command::Records => {
            println!("{}", records_table(&store.list()?));
        }
        // Handled before loading the configuration.
        Command::Init => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_config_dir() {
        let temp_dir = TempDir::new("dcakit-cli").expect("Failed to create temp dir");
        assert_eq!(config_dir(temp_dir.path()), temp_dir.path());
        assert_eq!(
            config_dir(&temp_dir.path().join("Custom.toml")),
            temp_dir.path()
        );
        assert_eq!(config_dir(Path::new("Dcakit.toml")), PathBuf::from(""));
    }

    #[test]
    fn test_init_writes_loadable_config_once() {
        let temp_dir = TempDir::new("dcakit-cli").expect("Failed to create temp dir");

        init(temp_dir.path()).unwrap();
        let config = DcakitConfig::load(temp_dir.path()).unwrap();
        let hardhat = config.network("hardhat").unwrap();
        assert_eq!(hardhat.chain_id, Some(31337));
        assert_eq!(hardhat.rpc_url.as_str(), "http://127.0.0.1:8545/");

        let err = init(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_chain_id_check_skipped_without_expectation() {
        let config = NetworkConfig::new("http://127.0.0.1:1".parse().unwrap());
        let chain = RpcChainClient::new(config.rpc_url.clone()).unwrap();
        check_chain_id(&chain, "local", &config).await.unwrap();
    }
}
