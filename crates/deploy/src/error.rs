//! Error taxonomy for deployment and verification runs.

use alloy_core::primitives::Address;

/// Errors surfaced by the deployment and verification orchestrators.
///
/// Every variant is fatal for the current run: the only recoverable condition,
/// an "already verified" answer from the explorer, never becomes a `DeployError`.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A constructor argument references a deployment that does not exist on this network.
    #[error("`{name}` requires `{dependency}`, which is not deployed on {network}")]
    MissingDependency {
        name: String,
        dependency: String,
        network: String,
    },

    /// The chain rejected or failed to confirm a deployment transaction.
    #[error("deployment transaction for `{name}` failed")]
    DeployerTransactionFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Verification was requested for a contract that has no deployment record.
    #[error("no deployment of `{name}` found on {network}")]
    UnknownContract { name: String, network: String },

    /// The verification backend refused the submission.
    #[error("verification of `{name}` at {address} failed: {message}")]
    VerificationFailed {
        name: String,
        address: Address,
        message: String,
    },

    #[error("`{name}` declares {types} constructor argument types but {values} values")]
    ArgumentMismatch {
        name: String,
        types: usize,
        values: usize,
    },

    #[error("invalid constructor argument {index} of `{name}` ({ty}): {reason}")]
    InvalidArgument {
        name: String,
        index: usize,
        ty: String,
        reason: String,
    },

    #[error("`{name}` references named account `{account}`, which is not configured for {network}")]
    UnknownAccount {
        name: String,
        account: String,
        network: String,
    },

    #[error("invalid salt for `{name}`: {reason}")]
    InvalidSalt { name: String, reason: String },

    #[error("a deployment record for `{name}` already exists on {network}")]
    RecordExists { name: String, network: String },

    #[error("deployment name `{0}` is declared more than once")]
    DuplicateName(String),

    #[error("tag `{0}` is declared by more than one deployment")]
    DuplicateTag(String),

    #[error("`{name}` depends on unknown tag `{tag}`")]
    UnknownTag { name: String, tag: String },

    #[error("dependency cycle between tags: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("artifact error for `{path}`")]
    Artifact {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("deployment record store error")]
    Store(#[source] anyhow::Error),
}

impl DeployError {
    pub(crate) fn store(source: impl Into<anyhow::Error>) -> Self {
        Self::Store(source.into())
    }
}

pub type Result<T, E = DeployError> = std::result::Result<T, E>;
