use async_trait::async_trait;
use mockall::automock;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::json_codecs::{option_wei_from_hex, u64_from_hex, wei_from_hex};
use crate::units::WeiNewtype;
use crate::upstream::{decode_json, send, unexpected_status, UpstreamError};

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTransaction {
    pub hash: String,
    /// `None` for contract creations.
    pub to: Option<String>,
    #[serde(deserialize_with = "wei_from_hex")]
    pub value: WeiNewtype,
    #[serde(default, deserialize_with = "option_wei_from_hex")]
    pub gas_price: Option<WeiNewtype>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionBlock {
    #[serde(deserialize_with = "u64_from_hex")]
    pub number: u64,
    pub hash: String,
    /// Absent before London.
    #[serde(default, deserialize_with = "option_wei_from_hex")]
    pub base_fee_per_gas: Option<WeiNewtype>,
    #[serde(deserialize_with = "u64_from_hex")]
    pub gas_used: u64,
    pub transactions: Vec<ExecutionTransaction>,
}

impl ExecutionBlock {
    /// Builders conventionally pay the proposer in the final transaction of a block.
    pub fn last_transaction(&self) -> Option<&ExecutionTransaction> {
        self.transactions.last()
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(deserialize_with = "u64_from_hex")]
    pub gas_used: u64,
    #[serde(default, deserialize_with = "option_wei_from_hex")]
    pub effective_gas_price: Option<WeiNewtype>,
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[automock]
#[async_trait]
pub trait ExecutionNode: Send + Sync {
    /// Block with full transaction objects, `None` if the node does not know the height.
    async fn get_block_by_number(
        &self,
        block_number: u64,
    ) -> Result<Option<ExecutionBlock>, UpstreamError>;
    async fn get_transaction_receipt(
        &self,
        transaction_hash: &str,
    ) -> Result<TransactionReceipt, UpstreamError>;
}

pub struct ExecutionNodeHttp {
    execution_url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl ExecutionNodeHttp {
    pub fn new(execution_url: &str, client: reqwest::Client) -> Self {
        Self {
            execution_url: execution_url.to_string(),
            client,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, UpstreamError> {
        let url = self.execution_url.as_str();
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let res = send(url, self.client.post(url).json(&request)).await?;
        if res.status() != StatusCode::OK {
            return Err(unexpected_status(url, &res));
        }

        let response: JsonRpcResponse<T> = decode_json(url, res).await?;
        match response.error {
            Some(error) => Err(UpstreamError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            }),
            None => Ok(response.result),
        }
    }
}

#[async_trait]
impl ExecutionNode for ExecutionNodeHttp {
    async fn get_block_by_number(
        &self,
        block_number: u64,
    ) -> Result<Option<ExecutionBlock>, UpstreamError> {
        debug!(block_number, "fetching execution block");
        self.call(
            "eth_getBlockByNumber",
            json!([format!("0x{block_number:x}"), true]),
        )
        .await
    }

    async fn get_transaction_receipt(
        &self,
        transaction_hash: &str,
    ) -> Result<TransactionReceipt, UpstreamError> {
        debug!(transaction_hash, "fetching transaction receipt");
        self.call("eth_getTransactionReceipt", json!([transaction_hash]))
            .await?
            .ok_or_else(|| UpstreamError::MissingResult {
                method: "eth_getTransactionReceipt".to_string(),
                param: transaction_hash.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn block_result() -> Value {
        json!({
            "number": "0x145b737",
            "hash": "0x5f1c",
            "miner": "0x95222290dd7278aa3ddd389cc1e1d165cc4bafe5",
            "baseFeePerGas": "0x3b9aca00",
            "gasUsed": "0xa410",
            "transactions": [
                {
                    "hash": "0x01",
                    "to": null,
                    "value": "0x0",
                    "gasPrice": "0x3b9aca01"
                },
                {
                    "hash": "0x02",
                    "to": "0x3C3EDD7EcD0B58472CDBe3c742827799b3CF92b6",
                    "value": "0x2d79883d2000",
                    "gasPrice": "0x3b9aca00"
                }
            ]
        })
    }

    #[tokio::test]
    async fn get_block_by_number_test() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "method": "eth_getBlockByNumber",
                "params": ["0x145b737", true]
            })))
            .with_status(200)
            .with_body(json!({ "jsonrpc": "2.0", "id": 1, "result": block_result() }).to_string())
            .create_async()
            .await;

        let node = ExecutionNodeHttp::new(&server.url(), reqwest::Client::new());
        let block = node.get_block_by_number(21346103).await.unwrap().unwrap();

        mock.assert_async().await;
        assert_eq!(block.number, 21346103);
        assert_eq!(block.gas_used, 42_000);
        assert_eq!(block.base_fee_per_gas, Some(WeiNewtype(1_000_000_000)));
        assert_eq!(block.transactions[0].to, None);
        let last = block.last_transaction().unwrap();
        assert_eq!(last.hash, "0x02");
        assert_eq!(last.value, WeiNewtype(50_000_000_000_000));
    }

    #[tokio::test]
    async fn get_unknown_block_test() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":null}"#)
            .create_async()
            .await;

        let node = ExecutionNodeHttp::new(&server.url(), reqwest::Client::new());
        let block = node.get_block_by_number(2_134_610_300).await.unwrap();

        assert_eq!(block, None);
    }

    #[tokio::test]
    async fn pre_london_block_has_no_base_fee_test() {
        let mut block = block_result();
        block.as_object_mut().unwrap().remove("baseFeePerGas");
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(json!({ "jsonrpc": "2.0", "id": 1, "result": block }).to_string())
            .create_async()
            .await;

        let node = ExecutionNodeHttp::new(&server.url(), reqwest::Client::new());
        let block = node.get_block_by_number(21346103).await.unwrap().unwrap();

        assert_eq!(block.base_fee_per_gas, None);
    }

    #[tokio::test]
    async fn rpc_error_test() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"rate limit exceeded"}}"#,
            )
            .create_async()
            .await;

        let node = ExecutionNodeHttp::new(&server.url(), reqwest::Client::new());
        let result = node.get_block_by_number(1).await;

        match result {
            Err(UpstreamError::Rpc { code, message, .. }) => {
                assert_eq!(code, -32005);
                assert_eq!(message, "rate limit exceeded");
            }
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_transaction_receipt_test() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "method": "eth_getTransactionReceipt",
                "params": ["0x02"]
            })))
            .with_status(200)
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {
                        "transactionHash": "0x02",
                        "gasUsed": "0x5208",
                        "effectiveGasPrice": "0x3b9aca00",
                        "status": "0x1"
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let node = ExecutionNodeHttp::new(&server.url(), reqwest::Client::new());
        let receipt = node.get_transaction_receipt("0x02").await.unwrap();

        assert_eq!(receipt.gas_used, 21_000);
        assert_eq!(receipt.effective_gas_price, Some(WeiNewtype(1_000_000_000)));
    }

    #[tokio::test]
    async fn missing_receipt_test() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":null}"#)
            .create_async()
            .await;

        let node = ExecutionNodeHttp::new(&server.url(), reqwest::Client::new());
        let result = node.get_transaction_receipt("0xdead").await;

        assert!(matches!(result, Err(UpstreamError::MissingResult { .. })));
    }

    #[tokio::test]
    async fn http_status_error_test() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(429)
            .create_async()
            .await;

        let node = ExecutionNodeHttp::new(&server.url(), reqwest::Client::new());
        let result = node.get_transaction_receipt("0x02").await;

        assert!(matches!(
            result,
            Err(UpstreamError::Status { status: StatusCode::TOO_MANY_REQUESTS, .. })
        ));
    }
}
