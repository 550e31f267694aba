//! Etherscan-compatible verification backend.

use std::time::Duration;

use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use url::Url;

use super::{VerificationRequest, VerifierClient, VerifyError};
use crate::{ArtifactStore, rpc::create_client};

/// Interval between verification status polls.
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);
const STATUS_MAX_POLLS: usize = 60;

/// The explorer may not have indexed freshly deployed bytecode yet.
const SUBMIT_RETRY_INTERVAL: Duration = Duration::from_secs(10);
const SUBMIT_MAX_RETRIES: usize = 6;

#[derive(Debug, Clone, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

impl ExplorerResponse {
    fn result_text(&self) -> String {
        match &self.result {
            serde_json::Value::String(text) => text.clone(),
            serde_json::Value::Null => self.message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum SubmitError {
    #[error("explorer has not indexed the contract yet: {0}")]
    NotIndexed(String),
    #[error(transparent)]
    Verify(#[from] VerifyError),
}

#[derive(Debug, thiserror::Error)]
enum StatusPoll {
    #[error("verification is still pending")]
    Pending,
    #[error(transparent)]
    Verify(#[from] VerifyError),
}

fn already_verified(text: &str) -> bool {
    text.to_lowercase().contains("already verified")
}

/// Interpret a `verifysourcecode` response, returning the submission GUID.
fn interpret_submission(response: &ExplorerResponse) -> Result<String, SubmitError> {
    let text = response.result_text();
    if response.status == "1" {
        return Ok(text);
    }
    if already_verified(&text) {
        return Err(VerifyError::AlreadyVerified(text).into());
    }
    if text.contains("Unable to locate ContractCode") {
        return Err(SubmitError::NotIndexed(text));
    }
    Err(VerifyError::Rejected(text).into())
}

/// Interpret a `checkverifystatus` response.
fn interpret_status(response: &ExplorerResponse) -> Result<(), StatusPoll> {
    let text = response.result_text();
    if text.contains("Pending in queue") {
        return Err(StatusPoll::Pending);
    }
    if already_verified(&text) {
        return Err(VerifyError::AlreadyVerified(text).into());
    }
    if response.status == "1" && text.starts_with("Pass") {
        return Ok(());
    }
    Err(VerifyError::Rejected(text).into())
}

/// Verifier submitting standard-JSON input to an Etherscan-compatible API.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: reqwest::Client,
    api_url: Url,
    api_key: String,
    artifacts: ArtifactStore,
}

impl EtherscanVerifier {
    pub fn new(api_url: Url, api_key: impl Into<String>, artifacts: ArtifactStore) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_client()?,
            api_url,
            api_key: api_key.into(),
            artifacts,
        })
    }

    async fn submit(&self, form: &[(&str, String)]) -> Result<String, SubmitError> {
        let response: ExplorerResponse = self
            .client
            .post(self.api_url.clone())
            .form(form)
            .send()
            .await
            .context("Failed to send verification request")
            .map_err(VerifyError::from)?
            .json()
            .await
            .context("Failed to parse verification response")
            .map_err(VerifyError::from)?;

        interpret_submission(&response)
    }

    async fn check_status(&self, guid: &str) -> Result<(), StatusPoll> {
        let response: ExplorerResponse = self
            .client
            .get(self.api_url.clone())
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .context("Failed to send verification status request")
            .map_err(VerifyError::from)?
            .json()
            .await
            .context("Failed to parse verification status response")
            .map_err(VerifyError::from)?;

        interpret_status(&response)
    }
}

impl VerifierClient for EtherscanVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<(), VerifyError> {
        let build_info = self
            .artifacts
            .build_info(&request.contract_path)
            .map_err(|e| VerifyError::Transport(e.into()))?;
        let source = serde_json::to_string(&build_info.input)
            .context("Failed to serialize standard JSON input")?;

        let form = [
            ("apikey", self.api_key.clone()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", request.address.to_string()),
            ("sourceCode", source),
            ("codeformat", "solidity-standard-json-input".to_string()),
            ("contractname", request.contract_path.clone()),
            ("compilerversion", format!("v{}", build_info.solc_long_version)),
            // Misspelled in the Etherscan API.
            ("constructorArguements", hex::encode(&request.constructor_args)),
        ];

        let guid = (|| self.submit(&form))
            .retry(
                ConstantBuilder::default()
                    .with_delay(SUBMIT_RETRY_INTERVAL)
                    .with_max_times(SUBMIT_MAX_RETRIES),
            )
            .when(|e| matches!(e, SubmitError::NotIndexed(_)))
            .notify(|e, delay| {
                tracing::debug!(name = %request.name, error = %e, ?delay, "Retrying verification submission");
            })
            .await
            .map_err(|e| match e {
                SubmitError::Verify(e) => e,
                not_indexed => VerifyError::Rejected(not_indexed.to_string()),
            })?;

        tracing::debug!(name = %request.name, %guid, "Verification submitted");

        (|| self.check_status(&guid))
            .retry(
                ConstantBuilder::default()
                    .with_delay(STATUS_POLL_INTERVAL)
                    .with_max_times(STATUS_MAX_POLLS),
            )
            .when(|e| matches!(e, StatusPoll::Pending))
            .await
            .map_err(|e| match e {
                StatusPoll::Verify(e) => e,
                StatusPoll::Pending => VerifyError::Transport(anyhow::anyhow!(
                    "verification of {} still pending after {} polls",
                    request.name,
                    STATUS_MAX_POLLS
                )),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: &str, result: &str) -> ExplorerResponse {
        ExplorerResponse {
            status: status.to_string(),
            message: if status == "1" { "OK" } else { "NOTOK" }.to_string(),
            result: serde_json::Value::String(result.to_string()),
        }
    }

    #[test]
    fn test_submission_accepted() {
        let guid = interpret_submission(&response("1", "ezq878u486pzijkvvmerl6a9mzwhv6sefgvqi5tkwceejc7tvn")).unwrap();
        assert_eq!(guid, "ezq878u486pzijkvvmerl6a9mzwhv6sefgvqi5tkwceejc7tvn");
    }

    #[test]
    fn test_submission_already_verified() {
        let err = interpret_submission(&response("0", "Contract source code already verified")).unwrap_err();
        assert!(matches!(err, SubmitError::Verify(VerifyError::AlreadyVerified(_))));
    }

    #[test]
    fn test_submission_not_indexed_is_retryable() {
        let err = interpret_submission(&response(
            "0",
            "Unable to locate ContractCode at 0x5FbDB2315678afecb367f032d93F642f64180aa3",
        ))
        .unwrap_err();
        assert!(matches!(err, SubmitError::NotIndexed(_)));
    }

    #[test]
    fn test_submission_rejected() {
        let err = interpret_submission(&response("0", "Invalid API Key")).unwrap_err();
        assert!(matches!(err, SubmitError::Verify(VerifyError::Rejected(ref m)) if m == "Invalid API Key"));
    }

    #[test]
    fn test_status_results() {
        assert!(matches!(
            interpret_status(&response("0", "Pending in queue")),
            Err(StatusPoll::Pending)
        ));
        assert!(interpret_status(&response("1", "Pass - Verified")).is_ok());
        assert!(matches!(
            interpret_status(&response("1", "Already Verified")),
            Err(StatusPoll::Verify(VerifyError::AlreadyVerified(_)))
        ));
        assert!(matches!(
            interpret_status(&response("0", "Fail - Unable to verify")),
            Err(StatusPoll::Verify(VerifyError::Rejected(_)))
        ));
    }

    #[test]
    fn test_response_without_string_result() {
        let parsed: ExplorerResponse =
            serde_json::from_str(r#"{"status":"0","message":"Max rate limit reached","result":null}"#)
                .unwrap();
        assert_eq!(parsed.result_text(), "Max rate limit reached");
    }
}
