//! Functions and data structures to talk to a beacon chain node over the standard
//! REST API. Only the handful of endpoints reward computation needs are covered.
use async_trait::async_trait;
use mockall::automock;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::{slot_from_string, Slot};
use crate::json_codecs::{gwei_from_string, u64_from_string, u64_vec_from_strings};
use crate::units::GweiNewtype;
use crate::upstream::{decode_json, send, unexpected_status, UpstreamError};

pub type ValidatorIndex = u64;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ExecutionPayload {
    #[serde(deserialize_with = "u64_from_string")]
    pub block_number: u64,
    pub block_hash: String,
}

impl ExecutionPayload {
    /// Bellatrix blocks proposed before the merge carry a default payload: block
    /// number zero and an all-zero hash.
    pub fn is_default(&self) -> bool {
        self.block_number == 0
            || self
                .block_hash
                .trim_start_matches("0x")
                .chars()
                .all(|c| c == '0')
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BeaconBlockBody {
    // Absent before the merge.
    #[serde(default)]
    pub execution_payload: Option<ExecutionPayload>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BeaconBlock {
    #[serde(deserialize_with = "slot_from_string")]
    pub slot: Slot,
    #[serde(deserialize_with = "u64_from_string")]
    pub proposer_index: ValidatorIndex,
    pub body: BeaconBlockBody,
}

impl BeaconBlock {
    /// Number of the execution block this slot carries, `None` before the merge.
    pub fn block_number(&self) -> Option<u64> {
        self.body
            .execution_payload
            .as_ref()
            .filter(|payload| !payload.is_default())
            .map(|payload| payload.block_number)
    }
}

#[derive(Deserialize)]
struct BeaconBlockSignedEnvelope {
    message: BeaconBlock,
}

#[derive(Deserialize)]
struct BeaconBlockVersionedEnvelope {
    data: BeaconBlockSignedEnvelope,
}

#[derive(Deserialize)]
struct SyncCommittee {
    #[serde(deserialize_with = "u64_vec_from_strings")]
    validators: Vec<ValidatorIndex>,
}

#[derive(Deserialize)]
struct SyncCommitteeEnvelope {
    data: SyncCommittee,
}

/// Consensus layer rewards paid to the proposer of a block, in Gwei.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BlockRewards {
    #[serde(deserialize_with = "u64_from_string")]
    pub proposer_index: ValidatorIndex,
    #[serde(deserialize_with = "gwei_from_string")]
    pub sync_aggregate: GweiNewtype,
    #[serde(deserialize_with = "gwei_from_string")]
    pub proposer_slashings: GweiNewtype,
}

#[derive(Deserialize)]
struct BlockRewardsEnvelope {
    data: BlockRewards,
}

#[derive(Deserialize)]
struct TotalAttestationRewards {
    #[serde(deserialize_with = "u64_from_string")]
    validator_index: ValidatorIndex,
    #[serde(deserialize_with = "gwei_from_string")]
    head: GweiNewtype,
}

#[derive(Deserialize)]
struct AttestationRewards {
    total_rewards: Vec<TotalAttestationRewards>,
}

#[derive(Deserialize)]
struct AttestationRewardsEnvelope {
    data: AttestationRewards,
}

#[derive(Deserialize)]
struct Validator {
    pubkey: String,
}

#[derive(Deserialize)]
struct ValidatorEnvelope {
    #[serde(deserialize_with = "u64_from_string")]
    index: ValidatorIndex,
    validator: Validator,
}

#[derive(Deserialize)]
struct ValidatorsEnvelope {
    data: Vec<ValidatorEnvelope>,
}

#[automock]
#[async_trait]
pub trait BeaconNode: Send + Sync {
    /// `None` when no block was proposed for the slot.
    async fn get_block_by_slot(&self, slot: Slot) -> Result<Option<BeaconBlock>, UpstreamError>;
    async fn get_sync_committee(&self, slot: Slot) -> Result<Vec<ValidatorIndex>, UpstreamError>;
    async fn get_block_rewards(&self, slot: Slot) -> Result<BlockRewards, UpstreamError>;
    /// The validator's head attestation reward for the slot's epoch, spread evenly
    /// over the slots of that epoch.
    async fn get_attestation_reward_estimate(
        &self,
        slot: Slot,
        validator_index: ValidatorIndex,
    ) -> Result<GweiNewtype, UpstreamError>;
    /// Public keys in the same order as `validator_indices`.
    async fn get_validator_pubkeys(
        &self,
        slot: Slot,
        validator_indices: &[ValidatorIndex],
    ) -> Result<Vec<String>, UpstreamError>;
}

pub struct BeaconNodeHttp {
    beacon_url: String,
    client: reqwest::Client,
}

impl BeaconNodeHttp {
    pub fn new(beacon_url: &str, client: reqwest::Client) -> Self {
        Self {
            beacon_url: beacon_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn get_ok<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, UpstreamError> {
        let res = send(url, self.client.get(url)).await?;
        match res.status() {
            StatusCode::OK => decode_json(url, res).await,
            _ => Err(unexpected_status(url, &res)),
        }
    }
}

#[async_trait]
impl BeaconNode for BeaconNodeHttp {
    async fn get_block_by_slot(&self, slot: Slot) -> Result<Option<BeaconBlock>, UpstreamError> {
        let url = format!("{}/eth/v2/beacon/blocks/{}", self.beacon_url, slot);
        debug!(%slot, "fetching beacon block");

        let res = send(&url, self.client.get(&url)).await?;
        match res.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::OK => {
                let envelope: BeaconBlockVersionedEnvelope = decode_json(&url, res).await?;
                Ok(Some(envelope.data.message))
            }
            _ => Err(unexpected_status(&url, &res)),
        }
    }

    async fn get_sync_committee(&self, slot: Slot) -> Result<Vec<ValidatorIndex>, UpstreamError> {
        let url = format!(
            "{}/eth/v1/beacon/states/{}/sync_committees",
            self.beacon_url, slot
        );
        debug!(%slot, "fetching sync committee");

        let envelope: SyncCommitteeEnvelope = self.get_ok(&url).await?;
        Ok(envelope.data.validators)
    }

    async fn get_block_rewards(&self, slot: Slot) -> Result<BlockRewards, UpstreamError> {
        let url = format!("{}/eth/v1/beacon/rewards/blocks/{}", self.beacon_url, slot);
        debug!(%slot, "fetching block rewards");

        let envelope: BlockRewardsEnvelope = self.get_ok(&url).await?;
        Ok(envelope.data)
    }

    async fn get_attestation_reward_estimate(
        &self,
        slot: Slot,
        validator_index: ValidatorIndex,
    ) -> Result<GweiNewtype, UpstreamError> {
        let url = format!(
            "{}/eth/v1/beacon/rewards/attestations/{}",
            self.beacon_url,
            slot.epoch()
        );
        debug!(%slot, validator_index, "fetching attestation rewards");

        let request = self
            .client
            .post(&url)
            .json(&[validator_index.to_string()]);
        let res = send(&url, request).await?;
        if res.status() != StatusCode::OK {
            return Err(unexpected_status(&url, &res));
        }
        let envelope: AttestationRewardsEnvelope = decode_json(&url, res).await?;

        envelope
            .data
            .total_rewards
            .iter()
            .find(|rewards| rewards.validator_index == validator_index)
            .map(|rewards| GweiNewtype(rewards.head.0 / Slot::SLOTS_PER_EPOCH as i64))
            .ok_or_else(|| UpstreamError::Decode {
                url: url.clone(),
                message: format!("no attestation rewards for validator {validator_index}"),
            })
    }

    async fn get_validator_pubkeys(
        &self,
        slot: Slot,
        validator_indices: &[ValidatorIndex],
    ) -> Result<Vec<String>, UpstreamError> {
        if validator_indices.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}/eth/v1/beacon/states/{}/validators", self.beacon_url, slot);
        let ids = validator_indices
            .iter()
            .map(|index| index.to_string())
            .collect::<Vec<_>>()
            .join(",");
        debug!(%slot, count = validator_indices.len(), "fetching validator pubkeys");

        let res = send(&url, self.client.get(&url).query(&[("id", ids)])).await?;
        if res.status() != StatusCode::OK {
            return Err(unexpected_status(&url, &res));
        }
        let envelope: ValidatorsEnvelope = decode_json(&url, res).await?;

        // Nodes return validators sorted by index, committees are not.
        validator_indices
            .iter()
            .map(|index| {
                envelope
                    .data
                    .iter()
                    .find(|validator| validator.index == *index)
                    .map(|validator| validator.validator.pubkey.clone())
                    .ok_or_else(|| UpstreamError::Decode {
                        url: url.clone(),
                        message: format!("validator {index} missing from response"),
                    })
            })
            .collect()
    }
}
