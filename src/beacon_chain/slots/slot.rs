use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialOrd, PartialEq, Serialize)]
pub struct Slot(pub u64);

impl Slot {
    pub const SLOTS_PER_EPOCH: u64 = 32;

    pub fn epoch(&self) -> u64 {
        self.0 / Self::SLOTS_PER_EPOCH
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn slot_from_string<'de, D>(deserializer: D) -> Result<Slot, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer)?
        .parse::<u64>()
        .map(Slot)
        .map_err(serde::de::Error::custom)
}

/// Maps slots to unix timestamps and back for one network. Whether a slot lies in
/// the future is for the caller to decide, "now" is not known here.
///
/// Timestamps are whole unix seconds in an `i128`, wide enough for any slot times
/// any slot duration, so both directions are total and invert each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotClock {
    genesis_timestamp: i64,
    seconds_per_slot: u32,
}

impl SlotClock {
    /// 2020-12-01T12:00:23Z
    pub const MAINNET_GENESIS_TIMESTAMP: i64 = 1_606_824_023;
    pub const MAINNET_SECONDS_PER_SLOT: u64 = 12;

    /// Returns `None` for a zero slot duration or one beyond `u32::MAX` seconds.
    pub fn new(genesis_timestamp: i64, seconds_per_slot: u64) -> Option<Self> {
        let seconds_per_slot = u32::try_from(seconds_per_slot).ok()?;
        if seconds_per_slot == 0 {
            return None;
        }
        Some(Self {
            genesis_timestamp,
            seconds_per_slot,
        })
    }

    pub fn mainnet() -> Self {
        Self {
            genesis_timestamp: Self::MAINNET_GENESIS_TIMESTAMP,
            seconds_per_slot: Self::MAINNET_SECONDS_PER_SLOT as u32,
        }
    }

    pub fn seconds_per_slot(&self) -> u64 {
        u64::from(self.seconds_per_slot)
    }

    /// Unix timestamp of the start of the slot.
    pub fn timestamp(&self, slot: Slot) -> i128 {
        i128::from(self.genesis_timestamp)
            + i128::from(slot.0) * i128::from(self.seconds_per_slot)
    }

    /// The slot containing `unix_timestamp`, rounded down. `None` before genesis or
    /// past the last representable slot.
    pub fn slot_at(&self, unix_timestamp: i128) -> Option<Slot> {
        let seconds_since_genesis = unix_timestamp.checked_sub(i128::from(self.genesis_timestamp))?;
        if seconds_since_genesis < 0 {
            return None;
        }
        u64::try_from(seconds_since_genesis / i128::from(self.seconds_per_slot))
            .ok()
            .map(Slot)
    }

    pub fn is_in_future(&self, slot: Slot, now: &DateTime<Utc>) -> bool {
        self.timestamp(slot) > i128::from(now.timestamp())
    }
}
