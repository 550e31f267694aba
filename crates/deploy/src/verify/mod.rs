//! Block explorer verification.
//!
//! Targets are processed strictly in order. Each one moves through
//! `PENDING -> SUBMITTED -> {VERIFIED | ALREADY_VERIFIED | FAILED}`, or straight to
//! `SKIPPED` when its network filter rejects the current network. The first
//! `FAILED` target aborts the batch.

mod etherscan;

pub use etherscan::EtherscanVerifier;

use std::future::Future;

use alloy_core::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

use crate::{DeployError, NetworkFilter, RecordStore, error::Result};

/// A contract to submit for verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationTarget {
    /// Deployment record name.
    pub name: String,
    /// Artifact path override. The recorded contract path is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_path: Option<String>,
    #[serde(default)]
    pub networks: NetworkFilter,
}

impl VerificationTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract_path: None,
            networks: NetworkFilter::Any,
        }
    }

    pub fn contract_path(mut self, path: impl Into<String>) -> Self {
        self.contract_path = Some(path.into());
        self
    }

    pub fn networks(mut self, networks: NetworkFilter) -> Self {
        self.networks = networks;
        self
    }
}

/// What is sent to the verification backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub name: String,
    pub address: Address,
    pub constructor_args: Bytes,
    pub contract_path: String,
}

/// Failure reported by a verification backend.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The backend already knows the source of this contract.
    #[error("already verified: {0}")]
    AlreadyVerified(String),
    /// The backend refused the submission.
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// A verification backend.
pub trait VerifierClient: Send + Sync {
    /// Submit `request` and wait for the backend's verdict.
    fn verify(
        &self,
        request: &VerificationRequest,
    ) -> impl Future<Output = Result<(), VerifyError>> + Send;
}

/// Lifecycle of a verification target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    Submitted,
    Verified,
    AlreadyVerified,
    Skipped,
    Failed,
}

impl VerificationStatus {
    /// Terminal states that do not fail the batch.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Verified | Self::AlreadyVerified | Self::Skipped)
    }
}

/// Classify a backend failure.
///
/// The structured kind wins; otherwise the message is searched for "already
/// verified", since not every backend reports it distinctly.
pub fn classify(error: &VerifyError) -> VerificationStatus {
    let message = match error {
        VerifyError::AlreadyVerified(_) => return VerificationStatus::AlreadyVerified,
        VerifyError::Rejected(message) => message.clone(),
        VerifyError::Transport(source) => format!("{source:#}"),
    };
    if message.to_lowercase().contains("already verified") {
        VerificationStatus::AlreadyVerified
    } else {
        VerificationStatus::Failed
    }
}

/// Terminal state of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub name: String,
    /// Absent for skipped targets, whose record is never looked up.
    pub address: Option<Address>,
    pub status: VerificationStatus,
}

/// Outcomes of a verification batch, in target order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub outcomes: Vec<VerificationOutcome>,
}

impl VerificationReport {
    pub fn status_of(&self, name: &str) -> Option<VerificationStatus> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.name == name)
            .map(|outcome| outcome.status)
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.status.is_success())
    }
}

/// Verification orchestrator for one network.
pub struct Verifier<'a, S, V> {
    pub network: &'a str,
    pub store: &'a S,
    pub client: &'a V,
}

impl<S, V> Verifier<'_, S, V>
where
    S: RecordStore,
    V: VerifierClient,
{
    /// Verify every target in order, stopping at the first failure.
    pub async fn run(&self, targets: &[VerificationTarget]) -> Result<VerificationReport> {
        let mut report = VerificationReport::default();
        for target in targets {
            report.outcomes.push(self.verify(target).await?);
        }
        Ok(report)
    }

    /// Verify a single target.
    pub async fn verify(&self, target: &VerificationTarget) -> Result<VerificationOutcome> {
        let mut status = VerificationStatus::Pending;

        if !target.networks.matches(self.network) {
            tracing::info!(name = %target.name, network = self.network, "Verification skipped on this network");
            return Ok(VerificationOutcome {
                name: target.name.clone(),
                address: None,
                status: VerificationStatus::Skipped,
            });
        }

        let record = self.store.get(&target.name)?;
        let request = VerificationRequest {
            name: target.name.clone(),
            address: record.address,
            constructor_args: record.constructor_args,
            contract_path: target
                .contract_path
                .clone()
                .unwrap_or(record.contract_path),
        };

        tracing::debug!(name = %request.name, address = %request.address, %status, "Submitting for verification");
        status = VerificationStatus::Submitted;

        status = match self.client.verify(&request).await {
            Ok(()) => VerificationStatus::Verified,
            Err(err) => match classify(&err) {
                VerificationStatus::AlreadyVerified => {
                    tracing::info!(name = %request.name, address = %request.address, "Contract already verified");
                    VerificationStatus::AlreadyVerified
                }
                _ => {
                    tracing::error!(name = %request.name, address = %request.address, from = %status, error = %err, "Verification failed");
                    return Err(DeployError::VerificationFailed {
                        name: request.name,
                        address: request.address,
                        message: format!("{err:#}"),
                    });
                }
            },
        };

        if status == VerificationStatus::Verified {
            tracing::info!(name = %request.name, address = %request.address, "Contract verified");
        }

        Ok(VerificationOutcome {
            name: request.name,
            address: Some(request.address),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_structured_kind() {
        assert_eq!(
            classify(&VerifyError::AlreadyVerified("Contract source code already verified".into())),
            VerificationStatus::AlreadyVerified
        );
    }

    #[test]
    fn test_classify_message_fallback_is_case_insensitive() {
        assert_eq!(
            classify(&VerifyError::Rejected("Contract source code Already Verified".into())),
            VerificationStatus::AlreadyVerified
        );
        assert_eq!(
            classify(&VerifyError::Transport(
                anyhow::anyhow!("ALREADY VERIFIED").context("explorer request failed")
            )),
            VerificationStatus::AlreadyVerified
        );
    }

    #[test]
    fn test_classify_other_failures() {
        assert_eq!(
            classify(&VerifyError::Rejected("Fail - Unable to verify".into())),
            VerificationStatus::Failed
        );
        assert_eq!(
            classify(&VerifyError::Transport(anyhow::anyhow!("connection reset"))),
            VerificationStatus::Failed
        );
    }

    #[test]
    fn test_status_display() {
        assert_eq!(VerificationStatus::AlreadyVerified.to_string(), "ALREADY_VERIFIED");
        assert!(VerificationStatus::Skipped.is_success());
        assert!(!VerificationStatus::Failed.is_success());
    }

    struct Unreachable;

    impl VerifierClient for Unreachable {
        async fn verify(&self, _request: &VerificationRequest) -> Result<(), VerifyError> {
            Err(anyhow::anyhow!("connection refused")
                .context("Failed to send verification request")
                .into())
        }
    }

    #[tokio::test]
    async fn test_failure_message_keeps_error_chain() {
        let store = crate::MemoryRecordStore::new("optimism");
        store
            .put(
                "Foo",
                crate::DeploymentRecord {
                    name: "Foo".to_string(),
                    address: Address::ZERO,
                    constructor_args: Bytes::new(),
                    bytecode_hash: Default::default(),
                    contract_path: "contracts/Foo.sol:Foo".to_string(),
                    salt: None,
                    transaction_hash: None,
                    deployed_at: 0,
                },
            )
            .unwrap();
        let verifier = Verifier {
            network: "optimism",
            store: &store,
            client: &Unreachable,
        };

        match verifier.verify(&VerificationTarget::new("Foo")).await.unwrap_err() {
            DeployError::VerificationFailed { message, .. } => {
                assert_eq!(message, "Failed to send verification request: connection refused");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
