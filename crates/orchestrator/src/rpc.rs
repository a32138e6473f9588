//! Ethereum JSON-RPC provider
//!
//! A small client implementing only the calls the launch flow needs. Requests
//! go through a blocking `ureq` agent on the blocking pool. Transactions are
//! sent with `eth_sendTransaction`, so signing is left to the node (dev
//! chains, unlocked accounts, signer proxies).

use std::time::{Duration, Instant};

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::abi;
use crate::config::{OrchestratorConfig, RetryConfig};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::provider::{ChainReader, Log, TxReceipt, TxRequest, WalletProvider};

/// Code wallets use for a request the user declined (EIP-1193)
const USER_REJECTED_CODE: i64 = 4001;

pub struct JsonRpcProvider {
    url: String,
    agent: ureq::Agent,
    from: Option<Address>,
    retry: RetryConfig,
    confirmation_timeout: Duration,
}

/// RPC response wrapper
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// RPC error structure
#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Serialize)]
struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<Address>,
    to: Address,
    data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<U256>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    /// Absent on pre-Byzantium receipts
    status: Option<U64>,
    block_number: U64,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

#[derive(Debug, Deserialize)]
struct RpcLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
}

impl From<RpcReceipt> for TxReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        TxReceipt {
            hash: receipt.transaction_hash,
            success: receipt.status.map_or(true, |status| status == U64::from(1)),
            block_number: receipt.block_number.saturating_to::<u64>(),
            logs: receipt
                .logs
                .into_iter()
                .map(|log| Log { address: log.address, topics: log.topics, data: log.data })
                .collect(),
        }
    }
}

impl JsonRpcProvider {
    pub fn new(url: impl Into<String>, from: Option<Address>, retry: RetryConfig, confirmation_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(30))
            .build();

        Self { url: url.into(), agent, from, retry, confirmation_timeout }
    }

    /// Build a provider from configuration. Without a configured `from`
    /// account the node's first account is used.
    pub async fn connect(config: &OrchestratorConfig) -> OrchestratorResult<Self> {
        let mut provider =
            Self::new(config.rpc_url.clone(), config.from, config.retry.clone(), config.confirmation_timeout());

        if provider.from.is_none() {
            let accounts: Vec<Address> = provider.call("eth_accounts", json!([])).await?;
            provider.from = accounts.first().copied();
        }
        let chain_id: U64 = provider.call("eth_chainId", json!([])).await?;

        match provider.from {
            Some(from) => info!(url = %provider.url, chain_id = %chain_id, account = %from, "Connected to node"),
            None => warn!(url = %provider.url, chain_id = %chain_id, "Connected to node without an account"),
        }
        Ok(provider)
    }

    /// Make a JSON-RPC call that must return a non-null result
    async fn call<T>(&self, method: &str, params: Value) -> OrchestratorResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.send(method, params).await?.ok_or_else(|| missing_result(method))
    }

    /// Make a JSON-RPC call, retrying transport failures. A null result is `None`.
    async fn send<T>(&self, method: &str, params: Value) -> OrchestratorResult<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut attempt = 0;
        loop {
            match self.send_once(method, &params).await {
                Err(OrchestratorError::NetworkError(message)) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(method, attempt, delay_ms = delay, "RPC transport error, retrying: {}", message);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn send_once<T>(&self, method: &str, params: &Value) -> OrchestratorResult<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let request_body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        debug!("RPC call: {} with params: {}", method, params);

        // Use blocking call since ureq is sync
        let response_body = tokio::task::spawn_blocking({
            let agent = self.agent.clone();
            let url = self.url.clone();
            let body = request_body.to_string();

            move || -> OrchestratorResult<String> {
                let response = agent
                    .post(&url)
                    .set("Content-Type", "application/json")
                    .send_string(&body)?;
                Ok(response.into_string()?)
            }
        })
        .await??;

        let rpc_response: RpcResponse<T> = serde_json::from_str(&response_body)?;

        if let Some(error) = rpc_response.error {
            return Err(classify(error));
        }

        Ok(rpc_response.result)
    }

    /// `eth_call` against the latest block
    async fn eth_call(&self, to: Address, data: Bytes) -> OrchestratorResult<Bytes> {
        let request = CallRequest { from: None, to, data, value: None };
        self.call("eth_call", json!([request, "latest"])).await
    }
}

fn missing_result(method: &str) -> OrchestratorError {
    OrchestratorError::InvalidResponse(format!("No result in {} response", method))
}

fn classify(error: RpcError) -> OrchestratorError {
    if error.code == USER_REJECTED_CODE {
        return OrchestratorError::Rejected(error.message);
    }
    if error.message.to_lowercase().contains("revert") {
        let detail = match error.data {
            Some(data) => format!("{} ({})", error.message, data),
            None => error.message,
        };
        return OrchestratorError::CallReverted(detail);
    }
    OrchestratorError::Rpc { code: error.code, message: error.message }
}

#[async_trait::async_trait]
impl WalletProvider for JsonRpcProvider {
    fn account(&self) -> Option<Address> {
        self.from
    }

    async fn submit(&self, tx: &TxRequest) -> OrchestratorResult<B256> {
        let from = self.from.ok_or(OrchestratorError::WalletNotConnected)?;
        let request = CallRequest { from: Some(from), to: tx.to, data: tx.data.clone(), value: Some(tx.value) };
        // Sent once, never retried
        let hash: B256 = self
            .send_once("eth_sendTransaction", &json!([request]))
            .await?
            .ok_or_else(|| missing_result("eth_sendTransaction"))?;
        debug!(kind = %tx.kind, hash = %hash, "Transaction broadcast");
        Ok(hash)
    }

    async fn await_confirmation(&self, hash: B256) -> OrchestratorResult<TxReceipt> {
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            let receipt: Option<RpcReceipt> = self.send("eth_getTransactionReceipt", json!([hash])).await?;
            if let Some(receipt) = receipt {
                return Ok(receipt.into());
            }

            if started.elapsed() >= self.confirmation_timeout {
                return Err(OrchestratorError::Timeout {
                    what: format!("receipt of {}", hash),
                    seconds: self.confirmation_timeout.as_secs(),
                });
            }
            let delay = self.retry.delay_for_attempt(attempt);
            debug!(hash = %hash, attempt, delay_ms = delay, "Receipt not available yet");
            tokio::time::sleep(Duration::from_millis(delay)).await;
            attempt = attempt.saturating_add(1);
        }
    }
}

#[async_trait::async_trait]
impl ChainReader for JsonRpcProvider {
    async fn decimals(&self, token: Address) -> OrchestratorResult<u8> {
        abi::decode_decimals(&self.eth_call(token, abi::encode_decimals()).await?)
    }

    async fn symbol(&self, token: Address) -> OrchestratorResult<String> {
        abi::decode_symbol(&self.eth_call(token, abi::encode_symbol()).await?)
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> OrchestratorResult<U256> {
        abi::decode_allowance(&self.eth_call(token, abi::encode_allowance(owner, spender)).await?)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> OrchestratorResult<U256> {
        abi::decode_balance_of(&self.eth_call(token, abi::encode_balance_of(owner)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::INonfungiblePositionManager::IncreaseLiquidity;
    use alloy_sol_types::SolEvent;

    #[test]
    fn test_receipt_parsing() {
        let body = r#"{
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "status": "0x0",
            "blockNumber": "0x1b4",
            "logs": [{
                "address": "0x1238536071e1c677a632429e3655c799b22cda52",
                "topics": ["0x3067048beee31b25b2f1681f88dac838c8bba36af25bfb2b7cf7473a5847e35f"],
                "data": "0x"
            }]
        }"#;
        let receipt: TxReceipt = serde_json::from_str::<RpcReceipt>(body).unwrap().into();
        assert!(!receipt.success);
        assert_eq!(receipt.block_number, 436);
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(receipt.logs[0].topics[0], IncreaseLiquidity::SIGNATURE_HASH);
    }

    #[test]
    fn test_missing_status_counts_as_success() {
        let body = r#"{
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockNumber": "0x1"
        }"#;
        let receipt: TxReceipt = serde_json::from_str::<RpcReceipt>(body).unwrap().into();
        assert!(receipt.success);
        assert!(receipt.logs.is_empty());
    }

    #[test]
    fn test_error_classification() {
        let rejected = RpcError { code: 4001, message: "User rejected the request.".into(), data: None };
        assert!(matches!(classify(rejected), OrchestratorError::Rejected(_)));

        let reverted = RpcError { code: 3, message: "execution reverted".into(), data: Some(json!("0x08c379a0")) };
        assert!(matches!(classify(reverted), OrchestratorError::CallReverted(_)));

        let other = RpcError { code: -32601, message: "method not found".into(), data: None };
        assert_eq!(
            classify(other),
            OrchestratorError::Rpc { code: -32601, message: "method not found".into() }
        );
    }

    #[test]
    fn test_send_transaction_params() {
        let request = CallRequest {
            from: Some(Address::repeat_byte(0x01)),
            to: Address::repeat_byte(0x02),
            data: Bytes::from(vec![0x09, 0x5e, 0xa7, 0xb3]),
            value: Some(U256::ZERO),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["data"], "0x095ea7b3");
        assert_eq!(value["value"], "0x0");
        assert!(value["from"].as_str().unwrap().eq_ignore_ascii_case("0x0101010101010101010101010101010101010101"));

        let call = CallRequest { from: None, to: Address::repeat_byte(0x02), data: Bytes::new(), value: None };
        let value = serde_json::to_value(&call).unwrap();
        assert!(value.get("from").is_none());
        assert!(value.get("value").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_node_is_network_error() {
        let retry = RetryConfig { max_retries: 1, base_delay_ms: 1, max_delay_ms: 1, backoff_multiplier: 2.0 };
        let provider = JsonRpcProvider::new("http://127.0.0.1:1", None, retry, Duration::from_secs(1));
        let result = provider.decimals(Address::repeat_byte(0xAA)).await;
        assert!(matches!(result, Err(OrchestratorError::NetworkError(_))));
    }
}
