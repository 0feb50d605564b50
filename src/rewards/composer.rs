//! Turns a slot or block height into the proposer's reward.
//!
//! Light mode covers what the execution layer paid the proposer: fees minus burn,
//! plus the builder's tip when the block's last transaction is a payout. Full mode
//! adds the consensus layer incentives on top, so its figure is never below light.
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use super::{fees::FeeCalculator, mev::MevClassifier, RewardError, RewardMode, RewardResult};
use crate::beacon_chain::{BeaconNode, Slot, SlotClock, ValidatorIndex};
use crate::execution_chain::{ExecutionBlock, ExecutionNode};
use crate::units::{GweiNewtype, WeiNewtype};

pub struct RewardComposer {
    beacon_node: Arc<dyn BeaconNode>,
    execution_node: Arc<dyn ExecutionNode>,
    classifier: Arc<dyn MevClassifier>,
    fee_calculator: FeeCalculator,
    clock: SlotClock,
}

fn overflow(what: &str) -> RewardError {
    RewardError::Computation(format!("{what} does not fit in a gwei amount"))
}

fn non_negative(name: &str, amount: GweiNewtype) -> Result<GweiNewtype, RewardError> {
    if amount.0 < 0 {
        Err(RewardError::Computation(format!(
            "{name} reward is negative: {amount}"
        )))
    } else {
        Ok(amount)
    }
}

impl RewardComposer {
    pub fn new(
        beacon_node: Arc<dyn BeaconNode>,
        execution_node: Arc<dyn ExecutionNode>,
        classifier: Arc<dyn MevClassifier>,
        fee_calculator: FeeCalculator,
        clock: SlotClock,
    ) -> Self {
        Self {
            beacon_node,
            execution_node,
            classifier,
            fee_calculator,
            clock,
        }
    }

    pub fn clock(&self) -> &SlotClock {
        &self.clock
    }

    /// Light reward for an execution block height.
    pub async fn reward_for_block(&self, block_number: u64) -> Result<RewardResult, RewardError> {
        let block = self.fetch_execution_block(block_number).await?;
        let result = self.light_reward(&block).await?;

        info!(
            block_number,
            block_hash = %block.hash,
            boosted = result.boosted,
            reward = result.reward_gwei,
            "computed block reward"
        );

        Ok(result)
    }

    pub async fn reward_for_slot(
        &self,
        slot: Slot,
        mode: RewardMode,
        now: &DateTime<Utc>,
    ) -> Result<RewardResult, RewardError> {
        if self.clock.is_in_future(slot, now) {
            return Err(RewardError::InFuture(slot));
        }

        let beacon_block = self
            .beacon_node
            .get_block_by_slot(slot)
            .await?
            .ok_or_else(|| RewardError::NotFound(format!("no block for slot {slot}")))?;

        let block_number = beacon_block.block_number().ok_or_else(|| {
            RewardError::NotFound(format!("block at slot {slot} has no execution payload"))
        })?;

        let block = self.fetch_execution_block(block_number).await?;
        let light = self.light_reward(&block).await?;

        let result = match mode {
            RewardMode::Light => light,
            RewardMode::Full => {
                let consensus = self
                    .consensus_reward(slot, beacon_block.proposer_index)
                    .await?;
                RewardResult {
                    boosted: light.boosted,
                    reward_gwei: light
                        .reward_gwei
                        .checked_add(consensus.0)
                        .ok_or_else(|| overflow("full reward"))?,
                }
            }
        };

        info!(
            %slot,
            block_number,
            %mode,
            boosted = result.boosted,
            reward = result.reward_gwei,
            "computed slot reward"
        );

        Ok(result)
    }

    async fn fetch_execution_block(&self, block_number: u64) -> Result<ExecutionBlock, RewardError> {
        self.execution_node
            .get_block_by_number(block_number)
            .await?
            .ok_or_else(|| RewardError::NotFound(format!("block {block_number} not found")))
    }

    async fn light_reward(&self, block: &ExecutionBlock) -> Result<RewardResult, RewardError> {
        let net_fees = self.fee_calculator.net_fees(block).await?;

        // Contract creations can't be a payout to the proposer.
        let payout = block
            .last_transaction()
            .and_then(|last| last.to.as_deref().map(|to| (to, last.value)));

        let (boosted, tip) = match payout {
            Some((to, value)) => {
                if self.classifier.is_mev_address(to).await? {
                    (true, value)
                } else {
                    (false, WeiNewtype::ZERO)
                }
            }
            None => (false, WeiNewtype::ZERO),
        };

        debug!(block_number = block.number, %net_fees, boosted, %tip, "execution reward");

        let reward = net_fees
            .checked_add(tip)
            .and_then(WeiNewtype::to_gwei_truncated)
            .ok_or_else(|| overflow("execution reward"))?;

        Ok(RewardResult {
            boosted,
            reward_gwei: reward.0,
        })
    }

    async fn consensus_reward(
        &self,
        slot: Slot,
        proposer_index: ValidatorIndex,
    ) -> Result<GweiNewtype, RewardError> {
        let (block_rewards, sync_committee, attestation_estimate) = futures::try_join!(
            self.beacon_node.get_block_rewards(slot),
            self.beacon_node.get_sync_committee(slot),
            self.beacon_node
                .get_attestation_reward_estimate(slot, proposer_index),
        )?;

        let proposer_slashings = non_negative("proposer slashing", block_rewards.proposer_slashings)?;
        let attestation_estimate = non_negative("attestation", attestation_estimate)?;

        let sync_share = if sync_committee.contains(&proposer_index) {
            let sync_aggregate = non_negative("sync aggregate", block_rewards.sync_aggregate)?;
            GweiNewtype(sync_aggregate.0 / sync_committee.len() as i64)
        } else {
            GweiNewtype(0)
        };

        debug!(
            %slot,
            proposer_index,
            %proposer_slashings,
            %sync_share,
            %attestation_estimate,
            "consensus reward"
        );

        proposer_slashings
            .checked_add(sync_share)
            .and_then(|sum| sum.checked_add(attestation_estimate))
            .ok_or_else(|| overflow("consensus reward"))
    }
}
