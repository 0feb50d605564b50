//! Public keys of the sync committee members for a slot.
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::beacon_chain::{BeaconNode, Slot, SlotClock};
use crate::rewards::RewardError;

/// Keys come back in committee order. A validator sitting in the committee more
/// than once appears once per seat.
pub async fn get_sync_duties(
    beacon_node: &dyn BeaconNode,
    clock: &SlotClock,
    slot: Slot,
    now: &DateTime<Utc>,
) -> Result<Vec<String>, RewardError> {
    if clock.is_in_future(slot, now) {
        return Err(RewardError::InFuture(slot));
    }

    beacon_node
        .get_block_by_slot(slot)
        .await?
        .ok_or_else(|| RewardError::NotFound(format!("no block for slot {slot}")))?;

    let committee = beacon_node.get_sync_committee(slot).await?;
    let pubkeys = beacon_node.get_validator_pubkeys(slot, &committee).await?;

    if pubkeys.len() != committee.len() {
        return Err(RewardError::Decode(format!(
            "asked for {} sync committee keys at slot {slot}, got {}",
            committee.len(),
            pubkeys.len()
        )));
    }

    debug!(%slot, committee_size = committee.len(), "resolved sync duties");

    Ok(pubkeys)
}
