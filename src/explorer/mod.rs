//! Etherscan-compatible block explorer, used for address histories and for
//! checking our reward figures against an independent source.
use async_trait::async_trait;
use mockall::automock;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use crate::json_codecs::{u64_from_string, wei_from_string};
use crate::units::WeiNewtype;
use crate::upstream::{decode_json, send, unexpected_status, UpstreamError};

pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/api";

const NO_TRANSACTIONS_FOUND: &str = "No transactions found";

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerTransaction {
    #[serde(deserialize_with = "u64_from_string")]
    pub block_number: u64,
    pub hash: String,
    pub from: String,
    /// Empty for contract creations.
    #[serde(default)]
    pub to: String,
    #[serde(deserialize_with = "wei_from_string")]
    pub value: WeiNewtype,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockReward {
    #[serde(deserialize_with = "wei_from_string")]
    block_reward: WeiNewtype,
}

// Failed calls put a message string where the payload would be.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExplorerResult<T> {
    Payload(T),
    Message(String),
}

#[derive(Deserialize)]
struct ExplorerEnvelope<T> {
    status: String,
    message: String,
    result: ExplorerResult<T>,
}

#[automock]
#[async_trait]
pub trait Explorer: Send + Sync {
    /// Most recent transactions of `address`, newest first, at most `limit`.
    async fn get_recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<ExplorerTransaction>, UpstreamError>;
    /// Static block reward plus fees as the explorer reports it.
    async fn get_block_reward(&self, block_number: u64) -> Result<WeiNewtype, UpstreamError>;
}

pub struct EtherscanApi {
    explorer_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl EtherscanApi {
    pub fn new(explorer_url: &str, api_key: &str, client: reqwest::Client) -> Self {
        Self {
            explorer_url: explorer_url.to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        query: &[(&str, String)],
    ) -> Result<ExplorerEnvelope<T>, UpstreamError> {
        let url = self.explorer_url.as_str();
        let request = self
            .client
            .get(url)
            .query(query)
            .query(&[("apikey", self.api_key.as_str())]);

        let res = send(url, request).await?;
        if res.status() != StatusCode::OK {
            return Err(unexpected_status(url, &res));
        }

        decode_json(url, res).await
    }
}

#[async_trait]
impl Explorer for EtherscanApi {
    async fn get_recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<ExplorerTransaction>, UpstreamError> {
        debug!(address, limit, "fetching recent transactions from explorer");
        let envelope = self
            .get::<Vec<ExplorerTransaction>>(&[
                ("module", "account".to_string()),
                ("action", "txlist".to_string()),
                ("address", address.to_string()),
                ("startblock", "0".to_string()),
                ("endblock", "99999999".to_string()),
                ("page", "1".to_string()),
                ("offset", limit.to_string()),
                ("sort", "desc".to_string()),
            ])
            .await?;

        match (envelope.status.as_str(), envelope.result) {
            ("1", ExplorerResult::Payload(mut transactions)) => {
                transactions.truncate(limit);
                Ok(transactions)
            }
            ("0", _) if envelope.message == NO_TRANSACTIONS_FOUND => Ok(vec![]),
            (_, ExplorerResult::Message(message)) => Err(UpstreamError::Explorer(format!(
                "{}: {}",
                envelope.message, message
            ))),
            (_, ExplorerResult::Payload(_)) => Err(UpstreamError::Explorer(envelope.message)),
        }
    }

    async fn get_block_reward(&self, block_number: u64) -> Result<WeiNewtype, UpstreamError> {
        debug!(block_number, "fetching block reward from explorer");
        let envelope = self
            .get::<BlockReward>(&[
                ("module", "block".to_string()),
                ("action", "getblockreward".to_string()),
                ("blockno", block_number.to_string()),
            ])
            .await?;

        match (envelope.status.as_str(), envelope.result) {
            ("1", ExplorerResult::Payload(reward)) => Ok(reward.block_reward),
            (_, ExplorerResult::Message(message)) => Err(UpstreamError::Explorer(format!(
                "{}: {}",
                envelope.message, message
            ))),
            (_, ExplorerResult::Payload(_)) => Err(UpstreamError::Explorer(envelope.message)),
        }
    }
}
