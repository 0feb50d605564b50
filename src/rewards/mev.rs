//! Decides whether an address is a builder's proposer payout address.
//!
//! Builders that pay proposers do so in the last transaction of the blocks they build
//! and keep reusing the same payout address. We look at the blocks of the address'
//! most recent transactions and check whether the address received the last
//! transaction of each. This is a heuristic, an address with little history always
//! passes since the mismatch threshold can't be reached.
use async_trait::async_trait;
use mockall::automock;
use std::sync::Arc;
use tracing::debug;

use super::RewardError;
use crate::execution_chain::ExecutionNode;
use crate::explorer::Explorer;
use crate::upstream::UpstreamError;

/// Recent transactions inspected per address.
pub const SAMPLE_SIZE: usize = 3;
/// More mismatching blocks than this and the address is not a payout address.
pub const MAX_MISMATCHES: usize = 2;

#[automock]
#[async_trait]
pub trait MevClassifier: Send + Sync {
    async fn is_mev_address(&self, address: &str) -> Result<bool, RewardError>;
}

pub struct LastTransactionHeuristic {
    explorer: Arc<dyn Explorer>,
    execution_node: Arc<dyn ExecutionNode>,
}

impl LastTransactionHeuristic {
    pub fn new(explorer: Arc<dyn Explorer>, execution_node: Arc<dyn ExecutionNode>) -> Self {
        Self {
            explorer,
            execution_node,
        }
    }
}

#[async_trait]
impl MevClassifier for LastTransactionHeuristic {
    async fn is_mev_address(&self, address: &str) -> Result<bool, RewardError> {
        let transactions = self
            .explorer
            .get_recent_transactions(address, SAMPLE_SIZE)
            .await?;

        let mut mismatches = 0;
        for transaction in transactions.iter().take(SAMPLE_SIZE) {
            let block = self
                .execution_node
                .get_block_by_number(transaction.block_number)
                .await?
                .ok_or_else(|| UpstreamError::MissingResult {
                    method: "eth_getBlockByNumber".to_string(),
                    param: transaction.block_number.to_string(),
                })?;

            let paid_last = block
                .last_transaction()
                .and_then(|last| last.to.as_deref())
                .map_or(false, |to| to.eq_ignore_ascii_case(address));

            if !paid_last {
                mismatches += 1;
                if mismatches > MAX_MISMATCHES {
                    debug!(address, mismatches, "not a payout address");
                    return Ok(false);
                }
            }
        }

        debug!(
            address,
            mismatches,
            samples = transactions.len().min(SAMPLE_SIZE),
            "payout address"
        );

        Ok(true)
    }
}
