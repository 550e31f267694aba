//! dcakit-deploy - Deployment and verification library for the DCA periphery contracts.
//!
//! This crate deploys compiled contracts to a network, either through a CREATE2
//! factory or with a plain creation transaction, keeps one deployment record per
//! contract and network, and submits the deployed contracts to a block explorer
//! for verification.

mod artifact;
pub mod chain;
mod config;
pub mod create2;
mod deployer;
mod error;
mod network;
mod plan;
mod record;
mod rpc;
mod spec;
pub mod verify;

pub use artifact::{Artifact, ArtifactStore, BuildInfo, ContractPath};
pub use chain::{ChainClient, RpcChainClient, TransactionReceipt, TransactionRequest};
pub use config::{
    CONFIG_FILENAME, DEFAULT_GAS_LIMIT, DcakitConfig, ENV_PREFIX, ExplorerConfig, NetworkConfig,
    RunFlags,
};
pub use create2::{Create2Factory, Create2Outcome, DEFAULT_FACTORY};
pub use deployer::{DEPLOYER_ACCOUNT, DeployOutcome, Deployer};
pub use error::DeployError;
pub use network::NetworkFilter;
pub use plan::{DeploymentPlan, default_specs, default_verification_targets};
pub use record::{DeploymentRecord, FileRecordStore, MemoryRecordStore, RecordStore};
pub use rpc::RpcError;
pub use spec::{ArgValue, DeploymentSpec};
pub use verify::{
    EtherscanVerifier, VerificationOutcome, VerificationReport, VerificationRequest,
    VerificationStatus, VerificationTarget, Verifier, VerifierClient, VerifyError,
};
