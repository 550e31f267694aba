//! Deployment record store.
//!
//! Records are append-only per (name, network): once written they are never
//! replaced. The on-disk layout is one pretty-printed JSON file per contract:
//! `{deployments}/{network}/{name}.json`.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{DeployError, error::Result};

/// A contract deployed on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub name: String,
    pub address: Address,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Bytes,
    /// keccak256 of the creation bytecode, without constructor arguments.
    pub bytecode_hash: B256,
    pub contract_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<B256>,
    /// Absent when the contract was found already deployed at its deterministic address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    /// Unix timestamp of the write.
    pub deployed_at: i64,
}

/// Storage of deployment records for a single network.
pub trait RecordStore {
    /// Name of the network this store belongs to.
    fn network(&self) -> &str;

    /// Look up a record, `None` if the name was never deployed.
    fn get_or_null(&self, name: &str) -> Result<Option<DeploymentRecord>>;

    /// Persist a new record. Fails with [`DeployError::RecordExists`] if the name is taken.
    fn put(&self, name: &str, record: DeploymentRecord) -> Result<()>;

    /// All records, sorted by name.
    fn list(&self) -> Result<Vec<DeploymentRecord>>;

    /// Look up a record that must exist.
    fn get(&self, name: &str) -> Result<DeploymentRecord> {
        self.get_or_null(name)?
            .ok_or_else(|| DeployError::UnknownContract {
                name: name.to_string(),
                network: self.network().to_string(),
            })
    }
}

/// Record store backed by a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    network: String,
    dir: PathBuf,
}

impl FileRecordStore {
    /// Open the store for `network` under the `deployments` root directory.
    pub fn new(deployments: impl AsRef<Path>, network: impl Into<String>) -> Self {
        let network = network.into();
        let dir = deployments.as_ref().join(&network);
        Self { network, dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn read_record(path: &Path) -> anyhow::Result<DeploymentRecord> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read deployment record {}", path.display()))?;
        serde_json::from_str(&content)
            .context(format!("Failed to parse deployment record {}", path.display()))
    }
}

impl RecordStore for FileRecordStore {
    fn network(&self) -> &str {
        &self.network
    }

    fn get_or_null(&self, name: &str) -> Result<Option<DeploymentRecord>> {
        let path = self.record_path(name);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_record(&path).map(Some).map_err(DeployError::store)
    }

    fn put(&self, name: &str, record: DeploymentRecord) -> Result<()> {
        let path = self.record_path(name);
        if path.exists() {
            return Err(DeployError::RecordExists {
                name: name.to_string(),
                network: self.network.clone(),
            });
        }

        std::fs::create_dir_all(&self.dir)
            .context(format!(
                "Failed to create deployments directory {}",
                self.dir.display()
            ))
            .map_err(DeployError::store)?;

        let json = serde_json::to_string_pretty(&record)
            .context("Failed to serialize deployment record")
            .map_err(DeployError::store)?;
        std::fs::write(&path, json)
            .context(format!("Failed to write deployment record {}", path.display()))
            .map_err(DeployError::store)?;

        tracing::debug!(name, path = %path.display(), "Deployment record saved");
        Ok(())
    }

    fn list(&self) -> Result<Vec<DeploymentRecord>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.dir)
            .context(format!("Failed to list {}", self.dir.display()))
            .map_err(DeployError::store)?;

        let mut records = Vec::new();
        for entry in entries {
            let path = entry
                .context("Failed to read directory entry")
                .map_err(DeployError::store)?
                .path();
            if path.extension().is_some_and(|ext| ext == "json") {
                records.push(Self::read_record(&path).map_err(DeployError::store)?);
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}

/// Record store kept in memory, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    network: String,
    records: Mutex<BTreeMap<String, DeploymentRecord>>,
}

impl MemoryRecordStore {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            records: Mutex::default(),
        }
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, DeploymentRecord>>> {
        self.records
            .lock()
            .map_err(|_| DeployError::store(anyhow::anyhow!("record store lock poisoned")))
    }
}

impl RecordStore for MemoryRecordStore {
    fn network(&self) -> &str {
        &self.network
    }

    fn get_or_null(&self, name: &str) -> Result<Option<DeploymentRecord>> {
        Ok(self.records()?.get(name).cloned())
    }

    fn put(&self, name: &str, record: DeploymentRecord) -> Result<()> {
        let mut records = self.records()?;
        if records.contains_key(name) {
            return Err(DeployError::RecordExists {
                name: name.to_string(),
                network: self.network.clone(),
            });
        }
        records.insert(name.to_string(), record);
        Ok(())
    }

    fn list(&self) -> Result<Vec<DeploymentRecord>> {
        Ok(self.records()?.values().cloned().collect())
    }
}
