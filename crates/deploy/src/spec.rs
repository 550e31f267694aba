//! Deployment specifications.
//!
//! A [`DeploymentSpec`] describes one contract to deploy: which artifact to use,
//! how to build its constructor arguments, and whether it goes through the
//! deterministic factory (a salt is present) or a plain creation transaction.

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue},
    primitives::Bytes,
};
use serde::{Deserialize, Serialize};

use crate::{DeployError, NetworkFilter, error::Result};

/// A constructor argument value, resolved against the network at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgValue {
    /// A literal, coerced to the declared Solidity type (`"42"`, `"0xabc..."`, `"true"`).
    Literal(String),
    /// The address of a named account of the current network.
    Account(String),
    /// The address of a previously deployed (or externally provided) contract.
    Deployment(String),
}

impl ArgValue {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn account(name: impl Into<String>) -> Self {
        Self::Account(name.into())
    }

    pub fn deployment(name: impl Into<String>) -> Self {
        Self::Deployment(name.into())
    }
}

fn default_log() -> bool {
    true
}

/// Description of a single contract deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    /// Unique name, also the key of the deployment record.
    pub name: String,
    /// Fully qualified artifact path, `contracts/Foo.sol:Foo`.
    pub contract_path: String,
    /// Solidity types of the constructor arguments, in order.
    #[serde(default)]
    pub arg_types: Vec<String>,
    /// Constructor argument values, parallel to `arg_types`.
    #[serde(default)]
    pub arg_values: Vec<ArgValue>,
    /// CREATE2 salt. Present iff the contract is deployed through the factory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    /// Gas limit for this deployment, overriding the network ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Whether to log the deployment.
    #[serde(default = "default_log")]
    pub log: bool,
    /// Tags of this deployment. The name is used when empty.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Tags that must be deployed before this one.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Networks this deployment applies to.
    #[serde(default)]
    pub networks: NetworkFilter,
}

impl DeploymentSpec {
    /// Create a direct (non-deterministic) deployment with no constructor arguments.
    pub fn new(name: impl Into<String>, contract_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract_path: contract_path.into(),
            arg_types: Vec::new(),
            arg_values: Vec::new(),
            salt: None,
            gas_limit: None,
            log: true,
            tags: Vec::new(),
            dependencies: Vec::new(),
            networks: NetworkFilter::Any,
        }
    }

    /// Append a constructor argument.
    pub fn arg(mut self, ty: impl Into<String>, value: ArgValue) -> Self {
        self.arg_types.push(ty.into());
        self.arg_values.push(value);
        self
    }

    /// Deploy through the deterministic factory with this salt.
    pub fn salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn depends_on<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn networks(mut self, networks: NetworkFilter) -> Self {
        self.networks = networks;
        self
    }

    pub fn is_deterministic(&self) -> bool {
        self.salt.is_some()
    }

    /// Tags this spec answers to: its declared tags, or its name when none are declared.
    pub fn effective_tags(&self) -> Vec<String> {
        if self.tags.is_empty() {
            vec![self.name.clone()]
        } else {
            self.tags.clone()
        }
    }

    /// Check the argument types and values line up.
    pub fn validate(&self) -> Result<()> {
        if self.arg_types.len() != self.arg_values.len() {
            return Err(DeployError::ArgumentMismatch {
                name: self.name.clone(),
                types: self.arg_types.len(),
                values: self.arg_values.len(),
            });
        }
        Ok(())
    }

    /// ABI-encode the constructor arguments from their resolved string forms.
    ///
    /// `resolved` is parallel to `arg_types`; account and deployment references
    /// must already be replaced by their addresses.
    pub fn encode_args(&self, resolved: &[String]) -> Result<Bytes> {
        self.validate()?;
        if resolved.len() != self.arg_types.len() {
            return Err(DeployError::ArgumentMismatch {
                name: self.name.clone(),
                types: self.arg_types.len(),
                values: resolved.len(),
            });
        }

        let values = self
            .arg_types
            .iter()
            .zip(resolved)
            .enumerate()
            .map(|(index, (ty, raw))| {
                let invalid = |reason: String| DeployError::InvalidArgument {
                    name: self.name.clone(),
                    index,
                    ty: ty.clone(),
                    reason,
                };
                let sol_type = DynSolType::parse(ty).map_err(|e| invalid(e.to_string()))?;
                sol_type.coerce_str(raw).map_err(|e| invalid(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        if values.is_empty() {
            return Ok(Bytes::new());
        }

        Ok(DynSolValue::Tuple(values).abi_encode_params().into())
    }
}
