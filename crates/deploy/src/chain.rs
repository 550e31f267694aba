//! Chain access used by the deployers.

use std::{future::Future, time::Duration};

use alloy_core::primitives::{Address, B256, Bytes, U64};
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::rpc::{self, create_client};

/// Interval between receipt polls.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Number of receipt polls before giving up on a transaction.
const RECEIPT_MAX_POLLS: usize = 150;

/// A transaction to be signed and sent by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    /// `None` for contract creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub data: Bytes,
    /// Gas limit. Left to the node's estimation when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
}

/// The parts of a mined transaction's receipt the deployers care about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub contract_address: Option<Address>,
    pub gas_used: U64,
    /// `1` on success, `0` on revert.
    #[serde(default)]
    pub status: Option<U64>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| status == U64::from(1))
    }
}

/// Access to a chain: code lookups and transaction submission.
pub trait ChainClient: Send + Sync {
    /// Runtime code at `address`; empty when no contract lives there.
    fn code_at(&self, address: Address) -> impl Future<Output = anyhow::Result<Bytes>> + Send;

    /// Send a transaction and wait until it is mined successfully.
    fn submit(
        &self,
        tx: TransactionRequest,
    ) -> impl Future<Output = anyhow::Result<TransactionReceipt>> + Send;
}

#[derive(Debug, thiserror::Error)]
enum ReceiptPoll {
    #[error("transaction {0} is still pending")]
    Pending(B256),
    #[error(transparent)]
    Rpc(#[from] anyhow::Error),
}

/// [`ChainClient`] over JSON-RPC, relying on the node to sign for `from`.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    client: reqwest::Client,
    url: Url,
}

impl RpcChainClient {
    pub fn new(url: Url) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_client()?,
            url,
        })
    }

    /// Chain id reported by the node.
    pub async fn chain_id(&self) -> anyhow::Result<u64> {
        let id: U64 = rpc::call_required(&self.client, &self.url, "eth_chainId", &[]).await?;
        Ok(id.to::<u64>())
    }

    async fn fetch_receipt(&self, hash: B256) -> Result<TransactionReceipt, ReceiptPoll> {
        let receipt: Option<TransactionReceipt> = rpc::call(
            &self.client,
            &self.url,
            "eth_getTransactionReceipt",
            &[json!(hash)],
        )
        .await?;

        receipt.ok_or(ReceiptPoll::Pending(hash))
    }
}

impl ChainClient for RpcChainClient {
    async fn code_at(&self, address: Address) -> anyhow::Result<Bytes> {
        rpc::call_required(
            &self.client,
            &self.url,
            "eth_getCode",
            &[json!(address), json!("latest")],
        )
        .await
    }

    async fn submit(&self, tx: TransactionRequest) -> anyhow::Result<TransactionReceipt> {
        let hash: B256 = rpc::call_required(
            &self.client,
            &self.url,
            "eth_sendTransaction",
            &[json!(tx)],
        )
        .await?;

        tracing::debug!(tx_hash = %hash, "Transaction sent, waiting for receipt");

        let receipt = (|| self.fetch_receipt(hash))
            .retry(
                ConstantBuilder::default()
                    .with_delay(RECEIPT_POLL_INTERVAL)
                    .with_max_times(RECEIPT_MAX_POLLS),
            )
            .when(|e| matches!(e, ReceiptPoll::Pending(_)))
            .await?;

        if !receipt.succeeded() {
            anyhow::bail!("transaction {hash} reverted");
        }

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_request_omits_to_and_gas() {
        let tx = TransactionRequest {
            from: Address::ZERO,
            to: None,
            data: Bytes::from_static(&[0x60, 0x80]),
            gas: None,
        };
        let value = serde_json::to_value(&tx).unwrap();
        assert!(value.get("to").is_none());
        assert!(value.get("gas").is_none());
        assert_eq!(value["data"], "0x6080");
    }

    #[test]
    fn test_gas_is_hex_quantity() {
        let tx = TransactionRequest {
            from: Address::ZERO,
            to: Some(Address::ZERO),
            data: Bytes::new(),
            gas: Some(U64::from(12_000_000u64)),
        };
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["gas"], "0xb71b00");
    }

    #[test]
    fn test_receipt_status() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": B256::ZERO,
            "contractAddress": null,
            "gasUsed": "0x5208",
            "status": "0x0",
        }))
        .unwrap();
        assert!(!receipt.succeeded());
        assert_eq!(receipt.gas_used, U64::from(21000u64));
        assert!(receipt.contract_address.is_none());
    }
}
