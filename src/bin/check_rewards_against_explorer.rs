//! Compares our light mode rewards for a range of blocks against the explorer's
//! figures. Usage: check_rewards_against_explorer FROM TO
use anyhow::{anyhow, Context, Result};
use proposer_rewards::{
    beacon_chain::BeaconNodeHttp,
    env::EnvConfig,
    execution_chain::{ExecutionNode, ExecutionNodeHttp},
    explorer::{EtherscanApi, Explorer},
    log,
    rewards::{FeeCalculator, LastTransactionHeuristic, RewardComposer},
    units::WeiNewtype,
    upstream::http_client,
};
use std::sync::Arc;
use tracing::{error, info};

fn parse_range() -> Result<(u64, u64)> {
    let mut args = std::env::args().skip(1);
    let from = args
        .next()
        .context("missing FROM block")?
        .parse::<u64>()
        .context("FROM is not a block number")?;
    let to = args
        .next()
        .context("missing TO block")?
        .parse::<u64>()
        .context("TO is not a block number")?;
    if from > to {
        return Err(anyhow!("FROM {from} is after TO {to}"));
    }
    Ok((from, to))
}

#[tokio::main]
pub async fn main() -> Result<()> {
    let config = EnvConfig::from_env()?;
    log::init_with_env(config.log_json);
    let (from, to) = parse_range()?;

    let client = http_client(config.upstream_timeout)?;
    let execution_node: Arc<dyn ExecutionNode> =
        Arc::new(ExecutionNodeHttp::new(&config.execution_url, client.clone()));
    let explorer: Arc<dyn Explorer> = Arc::new(EtherscanApi::new(
        &config.explorer_url,
        &config.etherscan_api_key,
        client.clone(),
    ));
    let composer = RewardComposer::new(
        Arc::new(BeaconNodeHttp::new(&config.beacon_url, client)),
        execution_node.clone(),
        Arc::new(LastTransactionHeuristic::new(
            explorer.clone(),
            execution_node.clone(),
        )),
        FeeCalculator::new(execution_node.clone(), config.receipt_fetch_delay),
        config.slot_clock()?,
    );

    let mut mismatches = 0;
    for block_number in from..=to {
        let ours = composer.reward_for_block(block_number).await?;

        let mut expected = explorer.get_block_reward(block_number).await?;
        if ours.boosted {
            let tip = execution_node
                .get_block_by_number(block_number)
                .await?
                .and_then(|block| block.last_transaction().map(|last| last.value))
                .unwrap_or(WeiNewtype::ZERO);
            expected = expected
                .checked_add(tip)
                .context("explorer reward plus payout overflows")?;
        }
        let expected = expected
            .to_gwei_truncated()
            .context("explorer reward out of range")?;

        if expected.0 == ours.reward_gwei {
            info!(block_number, reward = ours.reward_gwei, "reward matches explorer");
        } else {
            error!(
                block_number,
                ours = ours.reward_gwei,
                explorer = expected.0,
                boosted = ours.boosted,
                "reward differs from explorer"
            );
            mismatches += 1;
        }
    }

    if mismatches > 0 {
        return Err(anyhow!(
            "{mismatches} of {} blocks differ from the explorer",
            to - from + 1
        ));
    }

    info!(from, to, "all rewards match the explorer");
    Ok(())
}
