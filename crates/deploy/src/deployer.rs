//! Deployment orchestration.
//!
//! The [`Deployer`] turns a [`DeploymentSpec`] into exactly one [`DeploymentRecord`]
//! per network: it resolves constructor arguments, picks the deterministic factory
//! or a plain creation transaction, applies the gas and log policies, and persists
//! the result. Running it again for a recorded name is a no-op.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, B256, Bytes, U64};

use crate::{
    ArtifactStore, DeployError, DeploymentPlan, DeploymentRecord, DeploymentSpec, RecordStore,
    RunFlags,
    chain::{ChainClient, TransactionRequest},
    create2::{self, Create2Factory, Create2Outcome},
    error::Result,
    spec::ArgValue,
};

/// Name of the account that sends deployment transactions.
pub const DEPLOYER_ACCOUNT: &str = "deployer";

/// What happened to a single spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The spec does not apply to this network.
    Skipped,
    /// A record already existed; nothing was sent.
    Reused(DeploymentRecord),
    /// The contract was already present at its deterministic address and has been recorded.
    Adopted(DeploymentRecord),
    /// A transaction deployed the contract.
    Deployed(DeploymentRecord),
}

impl DeployOutcome {
    pub fn record(&self) -> Option<&DeploymentRecord> {
        match self {
            Self::Skipped => None,
            Self::Reused(record) | Self::Adopted(record) | Self::Deployed(record) => Some(record),
        }
    }
}

/// Deployment orchestrator for one network.
///
/// Everything the deployment depends on is passed in explicitly.
pub struct Deployer<'a, S, C> {
    pub network: &'a str,
    /// Named accounts; [`DEPLOYER_ACCOUNT`] sends the transactions.
    pub accounts: &'a BTreeMap<String, Address>,
    /// Contracts deployed outside this project.
    pub external: &'a BTreeMap<String, Address>,
    pub store: &'a S,
    pub chain: &'a C,
    pub artifacts: &'a ArtifactStore,
    pub factory: Create2Factory,
    /// Gas ceiling applied when a spec has no gas limit of its own.
    pub gas_ceiling: u64,
    pub flags: RunFlags,
}

impl<S, C> Deployer<'_, S, C>
where
    S: RecordStore,
    C: ChainClient,
{
    /// Run every spec of `plan` selected by `tags` (all when empty), in dependency order.
    pub async fn run(
        &self,
        plan: &DeploymentPlan,
        tags: &[String],
    ) -> Result<Vec<(String, DeployOutcome)>> {
        let order = plan.execution_order(tags)?;
        tracing::info!(
            network = self.network,
            count = order.len(),
            "Running deployments"
        );

        let mut outcomes = Vec::with_capacity(order.len());
        for spec in order {
            let outcome = self.deploy(spec).await?;
            outcomes.push((spec.name.clone(), outcome));
        }
        Ok(outcomes)
    }

    /// Deploy a single spec, or reuse its existing record.
    pub async fn deploy(&self, spec: &DeploymentSpec) -> Result<DeployOutcome> {
        if !spec.networks.matches(self.network) {
            tracing::debug!(name = %spec.name, network = self.network, "Deployment skipped on this network");
            return Ok(DeployOutcome::Skipped);
        }

        if let Some(existing) = self.store.get_or_null(&spec.name)? {
            self.warn_on_drift(spec, &existing);
            tracing::debug!(name = %spec.name, address = %existing.address, "Reusing recorded deployment");
            return Ok(DeployOutcome::Reused(existing));
        }

        spec.validate()?;
        let resolved = self.resolve_args(spec)?;
        let constructor_args = spec.encode_args(&resolved)?;
        let artifact = self.artifacts.artifact(&spec.contract_path)?;
        let bytecode_hash = artifact.bytecode_hash();

        let from = self.account(spec, DEPLOYER_ACCOUNT)?;
        let gas = self.flags.gas_limit(spec.gas_limit, self.gas_ceiling);
        let init_code = create2::init_code(&artifact.bytecode, &constructor_args);
        let log = spec.log && !self.flags.test;

        let tx_failed = |source: anyhow::Error| DeployError::DeployerTransactionFailed {
            name: spec.name.clone(),
            source,
        };

        let (address, salt, receipt) = match &spec.salt {
            Some(salt) => {
                let salt = create2::encode_salt(salt).map_err(|reason| DeployError::InvalidSalt {
                    name: spec.name.clone(),
                    reason,
                })?;
                match self
                    .factory
                    .deploy(self.chain, from, salt, init_code, gas)
                    .await
                    .map_err(tx_failed)?
                {
                    Create2Outcome::Existing(address) => (address, Some(salt), None),
                    Create2Outcome::Deployed { address, receipt } => {
                        (address, Some(salt), Some(receipt))
                    }
                }
            }
            None => {
                let receipt = self
                    .chain
                    .submit(TransactionRequest {
                        from,
                        to: None,
                        data: init_code,
                        gas: gas.map(U64::from),
                    })
                    .await
                    .map_err(tx_failed)?;
                let address = receipt.contract_address.ok_or_else(|| {
                    tx_failed(anyhow::anyhow!(
                        "receipt of {} carries no contract address",
                        receipt.transaction_hash
                    ))
                })?;
                (address, None, Some(receipt))
            }
        };

        let record = DeploymentRecord {
            name: spec.name.clone(),
            address,
            constructor_args,
            bytecode_hash,
            contract_path: spec.contract_path.clone(),
            salt,
            transaction_hash: receipt.as_ref().map(|r| r.transaction_hash),
            deployed_at: chrono::Utc::now().timestamp(),
        };
        self.store.put(&spec.name, record.clone())?;

        match receipt {
            Some(receipt) => {
                if log {
                    tracing::info!(
                        name = %spec.name,
                        %address,
                        tx_hash = %receipt.transaction_hash,
                        gas_used = %receipt.gas_used,
                        deterministic = spec.is_deterministic(),
                        "Deployed {}", spec.name
                    );
                }
                Ok(DeployOutcome::Deployed(record))
            }
            None => {
                if log {
                    tracing::info!(name = %spec.name, %address, "Found {} at its deterministic address", spec.name);
                }
                Ok(DeployOutcome::Adopted(record))
            }
        }
    }

    /// Bytecode hash and encoded constructor arguments `spec` would deploy now.
    fn current_build(&self, spec: &DeploymentSpec) -> Result<(B256, Bytes)> {
        spec.validate()?;
        let constructor_args = spec.encode_args(&self.resolve_args(spec)?)?;
        let artifact = self.artifacts.artifact(&spec.contract_path)?;
        Ok((artifact.bytecode_hash(), constructor_args))
    }

    /// Compare a recorded deployment with the current build. Never fails: a
    /// record stays valid after its artifact or inputs are gone.
    fn warn_on_drift(&self, spec: &DeploymentSpec, existing: &DeploymentRecord) {
        match self.current_build(spec) {
            Ok((bytecode_hash, constructor_args)) => {
                if existing.bytecode_hash != bytecode_hash
                    || existing.constructor_args != constructor_args
                {
                    tracing::warn!(
                        name = %spec.name,
                        address = %existing.address,
                        "Recorded deployment differs from the current artifact or arguments, keeping the recorded one"
                    );
                }
            }
            Err(err) => {
                tracing::debug!(name = %spec.name, error = %err, "Could not compare recorded deployment with the current build");
            }
        }
    }

    fn account(&self, spec: &DeploymentSpec, account: &str) -> Result<Address> {
        self.accounts
            .get(account)
            .copied()
            .ok_or_else(|| DeployError::UnknownAccount {
                name: spec.name.clone(),
                account: account.to_string(),
                network: self.network.to_string(),
            })
    }

    /// Address of a deployment on this network: recorded first, then external.
    fn dependency(&self, spec: &DeploymentSpec, dependency: &str) -> Result<Address> {
        if let Some(record) = self.store.get_or_null(dependency)? {
            return Ok(record.address);
        }
        self.external
            .get(dependency)
            .copied()
            .ok_or_else(|| DeployError::MissingDependency {
                name: spec.name.clone(),
                dependency: dependency.to_string(),
                network: self.network.to_string(),
            })
    }

    fn resolve_args(&self, spec: &DeploymentSpec) -> Result<Vec<String>> {
        spec.arg_values
            .iter()
            .map(|value| match value {
                ArgValue::Literal(literal) => Ok(literal.clone()),
                ArgValue::Account(account) => Ok(self.account(spec, account)?.to_string()),
                ArgValue::Deployment(dependency) => {
                    Ok(self.dependency(spec, dependency)?.to_string())
                }
            })
            .collect()
    }

    /// The deterministic address of `spec` on this network, without deploying it.
    pub fn predict_address(&self, spec: &DeploymentSpec) -> Result<Option<Address>> {
        let Some(salt) = &spec.salt else {
            return Ok(None);
        };
        spec.validate()?;
        let constructor_args: Bytes = spec.encode_args(&self.resolve_args(spec)?)?;
        let artifact = self.artifacts.artifact(&spec.contract_path)?;
        let salt = create2::encode_salt(salt).map_err(|reason| DeployError::InvalidSalt {
            name: spec.name.clone(),
            reason,
        })?;
        let init_code = create2::init_code(&artifact.bytecode, &constructor_args);
        Ok(Some(self.factory.compute_address(salt, &init_code)))
    }
}
