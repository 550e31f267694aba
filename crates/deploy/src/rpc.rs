//! JSON-RPC plumbing shared by the chain client and the explorer verifier.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

/// Timeout of a single HTTP request. Explorer submissions carry the whole
/// standard-JSON input, so this is generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client used for node and explorer requests.
pub fn create_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, thiserror::Error)]
#[error("{method} failed with code {code}: {message}")]
pub struct RpcError {
    #[serde(skip)]
    pub method: String,
    pub code: i64,
    pub message: String,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

impl<T> RpcResponse<T> {
    fn into_result(self, method: &str) -> anyhow::Result<Option<T>> {
        match self.error {
            Some(mut error) => {
                error.method = method.to_string();
                Err(error.into())
            }
            None => Ok(self.result),
        }
    }
}

/// Call `method` on the node at `url`.
///
/// A `null` result deserializes to `None`, for calls such as
/// `eth_getTransactionReceipt` where it means "not yet".
pub async fn call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    method: &str,
    params: &[Value],
) -> anyhow::Result<Option<T>> {
    let response: RpcResponse<T> = client
        .post(url.clone())
        .json(&RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        })
        .send()
        .await
        .with_context(|| format!("Failed to send {method} request"))?
        .json()
        .await
        .with_context(|| format!("Failed to parse {method} response"))?;

    response.into_result(method)
}

/// Like [`call`], for methods that always return a value.
pub async fn call_required<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    method: &str,
    params: &[Value],
) -> anyhow::Result<T> {
    call(client, url, method, params)
        .await?
        .with_context(|| format!("{method} returned no result"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope() {
        let params = [serde_json::json!("0x5FbDB2315678afecb367f032d93F642f64180aa3"), serde_json::json!("latest")];
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_getCode",
            params: &params,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "eth_getCode",
                "params": ["0x5FbDB2315678afecb367f032d93F642f64180aa3", "latest"],
            })
        );
    }

    #[test]
    fn test_null_result_is_none() {
        let response: RpcResponse<String> =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert_eq!(response.into_result("eth_getTransactionReceipt").unwrap(), None);
    }

    #[test]
    fn test_error_object() {
        let response: RpcResponse<String> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"insufficient funds"}}"#,
        )
        .unwrap();
        let err = response.into_result("eth_sendTransaction").unwrap_err();
        let rpc = err.downcast_ref::<RpcError>().unwrap();
        assert_eq!(rpc.code, -32000);
        assert_eq!(
            err.to_string(),
            "eth_sendTransaction failed with code -32000: insufficient funds"
        );
    }
}
