//! Fees a block's proposer keeps: what transactions paid minus what the protocol burned.
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

use super::RewardError;
use crate::execution_chain::{
    ExecutionBlock, ExecutionNode, ExecutionTransaction, TransactionReceipt,
    LONDON_HARD_FORK_BLOCK_NUMBER,
};
use crate::units::WeiNewtype;

/// `baseFeePerGas * gasUsed`, zero for blocks from before London.
pub fn burnt_fees(block: &ExecutionBlock) -> Result<WeiNewtype, RewardError> {
    match block.base_fee_per_gas {
        None => {
            if block.number >= LONDON_HARD_FORK_BLOCK_NUMBER {
                warn!(
                    block_number = block.number,
                    "block past london without a base fee, assuming nothing was burnt"
                );
            }
            Ok(WeiNewtype::ZERO)
        }
        Some(base_fee_per_gas) => base_fee_per_gas
            .checked_mul(WeiNewtype::from(block.gas_used))
            .ok_or_else(|| {
                RewardError::Computation(format!(
                    "burnt fees overflow for block {}",
                    block.number
                ))
            }),
    }
}

/// `gasUsed * effectiveGasPrice`. Receipts from before London may lack the effective
/// price, the transaction's own gas price is what was paid then.
pub fn transaction_fee(
    transaction: &ExecutionTransaction,
    receipt: &TransactionReceipt,
) -> Result<WeiNewtype, RewardError> {
    let gas_price = receipt
        .effective_gas_price
        .or(transaction.gas_price)
        .ok_or_else(|| {
            RewardError::Decode(format!(
                "no gas price for transaction {}",
                transaction.hash
            ))
        })?;

    WeiNewtype::from(receipt.gas_used)
        .checked_mul(gas_price)
        .ok_or_else(|| {
            RewardError::Computation(format!("fee overflow for transaction {}", transaction.hash))
        })
}

pub struct FeeCalculator {
    execution_node: Arc<dyn ExecutionNode>,
    receipt_delay: Duration,
}

impl FeeCalculator {
    pub fn new(execution_node: Arc<dyn ExecutionNode>, receipt_delay: Duration) -> Self {
        Self {
            execution_node,
            receipt_delay,
        }
    }

    /// Fetches every receipt one after the other, pausing between calls to go easy
    /// on the node. Any failed fetch fails the whole sum.
    pub async fn net_fees(&self, block: &ExecutionBlock) -> Result<WeiNewtype, RewardError> {
        let mut paid = WeiNewtype::ZERO;

        for (index, transaction) in block.transactions.iter().enumerate() {
            if index > 0 && !self.receipt_delay.is_zero() {
                tokio::time::sleep(self.receipt_delay).await;
            }

            let receipt = self
                .execution_node
                .get_transaction_receipt(&transaction.hash)
                .await
                .map_err(|err| {
                    warn!(
                        block_number = block.number,
                        transaction_hash = %transaction.hash,
                        %err,
                        "failed to fetch transaction receipt"
                    );
                    err
                })?;

            let fee = transaction_fee(transaction, &receipt)?;
            paid = paid.checked_add(fee).ok_or_else(|| {
                RewardError::Computation(format!("fee sum overflow for block {}", block.number))
            })?;
        }

        let burnt = burnt_fees(block)?;
        let net = paid.checked_sub(burnt).ok_or_else(|| {
            RewardError::Computation(format!("net fee underflow for block {}", block.number))
        })?;

        if net.is_negative() {
            return Err(RewardError::Computation(format!(
                "block {} burnt {burnt} but transactions only paid {paid}",
                block.number
            )));
        }

        debug!(block_number = block.number, %paid, %burnt, %net, "computed net fees");

        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution_chain::MockExecutionNode;
    use crate::upstream::UpstreamError;

    const GWEI: i128 = 1_000_000_000;

    fn transaction(hash: &str, gas_price: Option<i128>) -> ExecutionTransaction {
        ExecutionTransaction {
            hash: hash.to_string(),
            to: Some("0x3c3edd7ecd0b58472cdbe3c742827799b3cf92b6".to_string()),
            value: WeiNewtype::ZERO,
            gas_price: gas_price.map(WeiNewtype),
        }
    }

    fn block(
        base_fee_per_gas: Option<i128>,
        gas_used: u64,
        transactions: Vec<ExecutionTransaction>,
    ) -> ExecutionBlock {
        ExecutionBlock {
            number: 21346103,
            hash: "0x5f1c".to_string(),
            base_fee_per_gas: base_fee_per_gas.map(WeiNewtype),
            gas_used,
            transactions,
        }
    }

    fn receipt(hash: &str, gas_used: u64, effective_gas_price: Option<i128>) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: hash.to_string(),
            gas_used,
            effective_gas_price: effective_gas_price.map(WeiNewtype),
        }
    }

    fn node_with_receipts(receipts: Vec<TransactionReceipt>) -> MockExecutionNode {
        let mut node = MockExecutionNode::new();
        for receipt in receipts {
            let hash = receipt.transaction_hash.clone();
            node.expect_get_transaction_receipt()
                .withf(move |transaction_hash| transaction_hash == hash)
                .times(1)
                .returning(move |_| Ok(receipt.clone()));
        }
        node
    }

    #[test]
    fn burnt_fees_test() {
        let london = block(Some(10 * GWEI), 42_000, vec![]);
        assert_eq!(burnt_fees(&london).unwrap(), WeiNewtype(420_000 * GWEI));

        let pre_london = ExecutionBlock {
            number: 12_964_999,
            ..block(None, 42_000, vec![])
        };
        assert_eq!(burnt_fees(&pre_london).unwrap(), WeiNewtype::ZERO);
    }

    #[test]
    fn transaction_fee_falls_back_to_gas_price_test() {
        let tx = transaction("0x01", Some(20 * GWEI));
        assert_eq!(
            transaction_fee(&tx, &receipt("0x01", 21_000, None)).unwrap(),
            WeiNewtype(420_000 * GWEI)
        );
        assert_eq!(
            transaction_fee(&tx, &receipt("0x01", 21_000, Some(12 * GWEI))).unwrap(),
            WeiNewtype(252_000 * GWEI)
        );
    }

    #[test]
    fn transaction_fee_without_any_price_test() {
        let tx = transaction("0x01", None);
        let result = transaction_fee(&tx, &receipt("0x01", 21_000, None));
        assert!(matches!(result, Err(RewardError::Decode(_))));
    }

    #[tokio::test]
    async fn net_fees_test() {
        let node = node_with_receipts(vec![
            receipt("0x01", 21_000, Some(12 * GWEI)),
            receipt("0x02", 21_000, Some(15 * GWEI)),
        ]);
        let calculator = FeeCalculator::new(Arc::new(node), Duration::ZERO);
        let block = block(
            Some(10 * GWEI),
            42_000,
            vec![transaction("0x01", None), transaction("0x02", None)],
        );

        let net = calculator.net_fees(&block).await.unwrap();

        assert_eq!(net, WeiNewtype(147_000 * GWEI));
    }

    #[tokio::test]
    async fn net_fees_pre_london_test() {
        let node = node_with_receipts(vec![receipt("0x01", 21_000, None)]);
        let calculator = FeeCalculator::new(Arc::new(node), Duration::ZERO);
        let block = block(None, 21_000, vec![transaction("0x01", Some(50 * GWEI))]);

        let net = calculator.net_fees(&block).await.unwrap();

        assert_eq!(net, WeiNewtype(1_050_000 * GWEI));
    }

    #[tokio::test]
    async fn net_fees_empty_block_test() {
        let calculator = FeeCalculator::new(Arc::new(MockExecutionNode::new()), Duration::ZERO);
        let block = block(Some(10 * GWEI), 0, vec![]);

        assert_eq!(calculator.net_fees(&block).await.unwrap(), WeiNewtype::ZERO);
    }

    #[tokio::test]
    async fn negative_net_fees_is_computation_error_test() {
        let node = node_with_receipts(vec![receipt("0x01", 21_000, Some(5 * GWEI))]);
        let calculator = FeeCalculator::new(Arc::new(node), Duration::ZERO);
        let block = block(Some(10 * GWEI), 21_000, vec![transaction("0x01", None)]);

        let result = calculator.net_fees(&block).await;

        assert!(matches!(result, Err(RewardError::Computation(_))));
    }

    #[tokio::test]
    async fn failed_receipt_aborts_test() {
        let mut node = MockExecutionNode::new();
        node.expect_get_transaction_receipt()
            .times(1)
            .returning(|hash| {
                Err(UpstreamError::MissingResult {
                    method: "eth_getTransactionReceipt".to_string(),
                    param: hash.to_string(),
                })
            });
        let calculator = FeeCalculator::new(Arc::new(node), Duration::ZERO);
        let block = block(
            Some(10 * GWEI),
            42_000,
            vec![transaction("0x01", None), transaction("0x02", None)],
        );

        let result = calculator.net_fees(&block).await;

        assert!(matches!(result, Err(RewardError::UpstreamFetch(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn receipts_are_spaced_out_test() {
        let node = node_with_receipts(vec![
            receipt("0x01", 21_000, Some(12 * GWEI)),
            receipt("0x02", 21_000, Some(12 * GWEI)),
            receipt("0x03", 21_000, Some(12 * GWEI)),
        ]);
        let calculator = FeeCalculator::new(Arc::new(node), Duration::from_millis(100));
        let block = block(
            Some(GWEI),
            63_000,
            vec![
                transaction("0x01", None),
                transaction("0x02", None),
                transaction("0x03", None),
            ],
        );

        let started = tokio::time::Instant::now();
        calculator.net_fees(&block).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
