//! Compiled contract artifacts.
//!
//! Artifacts follow the Hardhat layout: `{artifacts}/{sourceName}/{Contract}.json`
//! holds the creation bytecode, `{Contract}.dbg.json` points at the build-info file
//! that carries the compiler version and the standard-JSON input used for verification.

use std::path::{Path, PathBuf};

use alloy_core::primitives::{B256, Bytes, keccak256};
use anyhow::Context;
use serde::Deserialize;

use crate::{DeployError, error::Result};

/// A fully qualified contract path, `contracts/Foo.sol:Foo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{source_name}:{contract_name}")]
pub struct ContractPath {
    pub source_name: String,
    pub contract_name: String,
}

impl ContractPath {
    pub fn parse(path: &str) -> Result<Self> {
        match path.rsplit_once(':') {
            Some((source, contract)) if !source.is_empty() && !contract.is_empty() => Ok(Self {
                source_name: source.to_string(),
                contract_name: contract.to_string(),
            }),
            _ => Err(DeployError::Artifact {
                path: path.to_string(),
                source: anyhow::anyhow!("expected `<source>.sol:<Contract>`"),
            }),
        }
    }
}

/// The parts of a compiled artifact needed to deploy it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub source_name: String,
    pub bytecode: Bytes,
}

impl Artifact {
    pub fn bytecode_hash(&self) -> B256 {
        keccak256(&self.bytecode)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: String,
}

/// Compiler run metadata used to verify a contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub solc_long_version: String,
    /// Standard-JSON compiler input.
    pub input: serde_json::Value,
}

/// Reader for a Hardhat artifacts directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn artifact_dir(&self, path: &ContractPath) -> PathBuf {
        self.root.join(&path.source_name)
    }

    fn read_json<T: serde::de::DeserializeOwned>(file: &Path) -> anyhow::Result<T> {
        let content = std::fs::read_to_string(file)
            .context(format!("Failed to read {}", file.display()))?;
        serde_json::from_str(&content).context(format!("Failed to parse {}", file.display()))
    }

    /// Load the artifact for `contract_path`.
    pub fn artifact(&self, contract_path: &str) -> Result<Artifact> {
        let path = ContractPath::parse(contract_path)?;
        let file = self
            .artifact_dir(&path)
            .join(format!("{}.json", path.contract_name));

        let artifact: Artifact = Self::read_json(&file).map_err(|source| DeployError::Artifact {
            path: contract_path.to_string(),
            source,
        })?;

        if artifact.bytecode.is_empty() {
            return Err(DeployError::Artifact {
                path: contract_path.to_string(),
                source: anyhow::anyhow!("artifact has no creation bytecode (abstract contract or interface?)"),
            });
        }

        Ok(artifact)
    }

    /// Load the build info the artifact for `contract_path` was compiled in.
    pub fn build_info(&self, contract_path: &str) -> Result<BuildInfo> {
        let path = ContractPath::parse(contract_path)?;
        let dir = self.artifact_dir(&path);
        let to_err = |source| DeployError::Artifact {
            path: contract_path.to_string(),
            source,
        };

        let debug: DebugFile = Self::read_json(&dir.join(format!("{}.dbg.json", path.contract_name)))
            .map_err(to_err)?;

        // The build-info path is relative to the artifact directory.
        Self::read_json(&dir.join(debug.build_info)).map_err(to_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn write_artifact(root: &Path) {
        let dir = root.join("contracts/Foo.sol");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::create_dir_all(root.join("build-info")).unwrap();
        std::fs::write(
            dir.join("Foo.json"),
            r#"{"contractName":"Foo","sourceName":"contracts/Foo.sol","abi":[],"bytecode":"0x6080604052"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("Foo.dbg.json"),
            r#"{"_format":"hh-sol-dbg-1","buildInfo":"../../build-info/abc.json"}"#,
        )
        .unwrap();
        std::fs::write(
            root.join("build-info/abc.json"),
            r#"{"solcLongVersion":"0.8.7+commit.e28d00a7","input":{"language":"Solidity","sources":{}}}"#,
        )
        .unwrap();
    }

    #[test]
    fn test_parse_contract_path() {
        let path = ContractPath::parse("contracts/DCAHubCompanion/DCAHubCompanion.sol:DCAHubCompanion")
            .unwrap();
        assert_eq!(path.source_name, "contracts/DCAHubCompanion/DCAHubCompanion.sol");
        assert_eq!(path.contract_name, "DCAHubCompanion");
        assert_eq!(
            path.to_string(),
            "contracts/DCAHubCompanion/DCAHubCompanion.sol:DCAHubCompanion"
        );

        assert!(ContractPath::parse("DCAHubCompanion").is_err());
        assert!(ContractPath::parse("contracts/Foo.sol:").is_err());
    }

    #[test]
    fn test_load_artifact_and_build_info() {
        let temp_dir = TempDir::new("dcakit-test").expect("Failed to create temp dir");
        write_artifact(temp_dir.path());
        let store = ArtifactStore::new(temp_dir.path());

        let artifact = store.artifact("contracts/Foo.sol:Foo").unwrap();
        assert_eq!(artifact.contract_name, "Foo");
        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);

        let build_info = store.build_info("contracts/Foo.sol:Foo").unwrap();
        assert_eq!(build_info.solc_long_version, "0.8.7+commit.e28d00a7");
        assert_eq!(build_info.input["language"], "Solidity");
    }

    #[test]
    fn test_missing_artifact() {
        let temp_dir = TempDir::new("dcakit-test").expect("Failed to create temp dir");
        let store = ArtifactStore::new(temp_dir.path());
        assert!(matches!(
            store.artifact("contracts/Bar.sol:Bar").unwrap_err(),
            DeployError::Artifact { .. }
        ));
    }
}
