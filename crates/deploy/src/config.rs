//! Project configuration.
//!
//! Configuration is read from `Dcakit.toml` and overlaid with `DCAKIT_`-prefixed
//! environment variables, using `__` to reach nested keys
//! (`DCAKIT_NETWORKS__MAINNET__EXPLORER__API_KEY`).

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    DeploymentSpec, VerificationTarget,
    create2::{Create2Factory, DEFAULT_FACTORY},
    plan,
};

/// The default name of the configuration file.
pub const CONFIG_FILENAME: &str = "Dcakit.toml";

/// Gas ceiling applied to deployments when nothing else is configured.
///
/// Large contracts fail default gas estimation on some networks.
pub const DEFAULT_GAS_LIMIT: u64 = 12_000_000;

/// Prefix of the environment variables overriding the configuration file.
pub const ENV_PREFIX: &str = "DCAKIT_";

/// Block explorer verification endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Etherscan-compatible API endpoint, e.g. `https://api-optimistic.etherscan.io/api`.
    pub api_url: Url,
    #[serde(default)]
    pub api_key: String,
}

/// Configuration of a single network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Expected chain id; checked against the node before deploying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    pub rpc_url: Url,
    /// Gas ceiling for deployments on this network.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// CREATE2 factory used for deterministic deployments.
    #[serde(default = "default_factory")]
    pub factory: Address,
    /// Named accounts. `deployer` sends the transactions.
    #[serde(default)]
    pub accounts: BTreeMap<String, Address>,
    /// Contracts deployed outside this project, resolvable as deployment references.
    #[serde(default)]
    pub external: BTreeMap<String, Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer: Option<ExplorerConfig>,
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

fn default_factory() -> Address {
    DEFAULT_FACTORY
}

impl NetworkConfig {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            chain_id: None,
            rpc_url,
            gas_limit: DEFAULT_GAS_LIMIT,
            factory: DEFAULT_FACTORY,
            accounts: BTreeMap::new(),
            external: BTreeMap::new(),
            explorer: None,
        }
    }

    pub fn factory(&self) -> Create2Factory {
        Create2Factory::new(self.factory)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcakitConfig {
    /// Hardhat artifacts directory.
    pub artifacts: PathBuf,
    /// Root directory of the deployment records.
    pub deployments: PathBuf,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Deployments to run (`[[deploy]]`). The built-in plan is used when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deploy: Vec<DeploymentSpec>,
    /// Contracts to verify (`[[verify]]`). The built-in targets are used when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verify: Vec<VerificationTarget>,
}

impl Default for DcakitConfig {
    fn default() -> Self {
        Self {
            artifacts: PathBuf::from("artifacts"),
            deployments: PathBuf::from("deployments"),
            networks: BTreeMap::new(),
            deploy: Vec::new(),
            verify: Vec::new(),
        }
    }
}

impl DcakitConfig {
    /// Load the configuration: defaults, then the TOML file (if present), then the environment.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context(format!(
                "Failed to load configuration from {}",
                config_path.display()
            ))?;

        tracing::debug!(path = %config_path.display(), networks = config.networks.len(), "Configuration loaded");
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    pub fn network(&self, name: &str) -> anyhow::Result<&NetworkConfig> {
        self.networks.get(name).with_context(|| {
            format!(
                "Network `{name}` is not configured (known: {})",
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })
    }

    /// The deployment plan: the configured one, or the built-in DCA periphery plan.
    pub fn deployment_specs(&self) -> Vec<DeploymentSpec> {
        if self.deploy.is_empty() {
            plan::default_specs()
        } else {
            self.deploy.clone()
        }
    }

    /// The verification targets: the configured ones, or the built-in list.
    pub fn verification_targets(&self) -> Vec<VerificationTarget> {
        if self.verify.is_empty() {
            plan::default_verification_targets()
        } else {
            self.verify.clone()
        }
    }
}

/// Flags read from the process environment for automated runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    /// `TEST`: suppress deployment logging.
    pub test: bool,
    /// `COVERAGE`: never attach gas limits, coverage instrumentation needs unmetered gas.
    pub coverage: bool,
}

impl RunFlags {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            test: is_truthy(lookup("TEST")),
            coverage: is_truthy(lookup("COVERAGE")),
        }
    }

    /// Gas limit to attach to a deployment, if any.
    pub fn gas_limit(&self, spec_gas_limit: Option<u64>, network_ceiling: u64) -> Option<u64> {
        if self.coverage {
            return None;
        }
        Some(spec_gas_limit.unwrap_or(network_ceiling))
    }
}

fn is_truthy(value: Option<String>) -> bool {
    match value {
        None => false,
        Some(value) => {
            let value = value.trim();
            !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn flags(test: Option<&str>, coverage: Option<&str>) -> RunFlags {
        RunFlags::from_lookup(|key| match key {
            "TEST" => test.map(String::from),
            "COVERAGE" => coverage.map(String::from),
            _ => None,
        })
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(flags(None, None), RunFlags::default());
        assert!(flags(Some("true"), None).test);
        assert!(flags(Some("1"), None).test);
        assert!(!flags(Some(""), None).test);
        assert!(!flags(Some("0"), None).test);
        assert!(!flags(Some("FALSE"), None).test);
        assert!(flags(None, Some("yes")).coverage);
    }

    #[test]
    fn test_gas_limit_policy() {
        let normal = RunFlags::default();
        assert_eq!(normal.gas_limit(None, DEFAULT_GAS_LIMIT), Some(12_000_000));
        assert_eq!(normal.gas_limit(Some(5_000_000), DEFAULT_GAS_LIMIT), Some(5_000_000));

        let coverage = RunFlags {
            coverage: true,
            ..Default::default()
        };
        assert_eq!(coverage.gas_limit(None, DEFAULT_GAS_LIMIT), None);
        assert_eq!(coverage.gas_limit(Some(5_000_000), DEFAULT_GAS_LIMIT), None);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new("dcakit-test").expect("Failed to create temp dir");
        std::fs::write(
            temp_dir.path().join(CONFIG_FILENAME),
            r#"
            artifacts = "build/artifacts"

            [networks.optimism]
            chain_id = 10
            rpc_url = "https://mainnet.optimism.io"

            [networks.optimism.accounts]
            deployer = "0x5FbDB2315678afecb367f032d93F642f64180aa3"

            [networks.optimism.explorer]
            api_url = "https://api-optimistic.etherscan.io/api"
            "#,
        )
        .unwrap();

        let config = DcakitConfig::load(temp_dir.path()).unwrap();
        assert_eq!(config.artifacts, PathBuf::from("build/artifacts"));
        assert_eq!(config.deployments, PathBuf::from("deployments"));

        let optimism = config.network("optimism").unwrap();
        assert_eq!(optimism.chain_id, Some(10));
        assert_eq!(optimism.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(optimism.factory, DEFAULT_FACTORY);
        assert!(optimism.accounts.contains_key("deployer"));
        assert!(config.network("mainnet").is_err());

        // No plan in the file: the built-in one applies.
        assert!(!config.deployment_specs().is_empty());
        assert!(!config.verification_targets().is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new("dcakit-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join(CONFIG_FILENAME);

        let mut config = DcakitConfig::default();
        config.networks.insert(
            "hardhat".to_string(),
            NetworkConfig::new("http://127.0.0.1:8545".parse().unwrap()),
        );
        config.save_to_file(&path).unwrap();

        let loaded = DcakitConfig::load(&path).unwrap();
        assert_eq!(loaded.networks, config.networks);
    }
}
