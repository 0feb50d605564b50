//! Process configuration, read once at startup and handed to whoever needs it.
use anyhow::{anyhow, Context, Result};
use std::{str::FromStr, time::Duration};

use crate::beacon_chain::SlotClock;
use crate::explorer::ETHERSCAN_API_URL;
use crate::rewards::RewardMode;

#[derive(Clone, Debug, PartialEq)]
pub struct EnvConfig {
    pub beacon_url: String,
    pub execution_url: String,
    pub explorer_url: String,
    pub etherscan_api_key: String,
    pub reward_mode: RewardMode,
    pub port: u16,
    pub genesis_timestamp: i64,
    pub seconds_per_slot: u64,
    pub receipt_fetch_delay: Duration,
    pub upstream_timeout: Duration,
    pub log_json: bool,
}

fn get_env_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn get_env_parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_var(lookup, key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|err| anyhow!("invalid {key} {value:?}: {err}")),
    }
}

fn get_env_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<bool> {
    match get_env_var(lookup, key).map(|value| value.trim().to_lowercase()) {
        None => Ok(false),
        Some(value) => match value.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(anyhow!("invalid {key} {value:?}, expected true or false")),
        },
    }
}

impl EnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let beacon_url =
            get_env_var(&lookup, "BEACON_URL").context("BEACON_URL is required")?;
        let execution_url =
            get_env_var(&lookup, "EXECUTION_URL").unwrap_or_else(|| beacon_url.clone());
        let explorer_url =
            get_env_var(&lookup, "EXPLORER_URL").unwrap_or_else(|| ETHERSCAN_API_URL.to_string());
        let etherscan_api_key = get_env_var(&lookup, "ETHERSCAN_API_KEY").unwrap_or_default();

        let config = Self {
            beacon_url,
            execution_url,
            explorer_url,
            etherscan_api_key,
            reward_mode: get_env_parsed(&lookup, "REWARD_MODE", RewardMode::Light)?,
            port: get_env_parsed(&lookup, "PORT", 3002)?,
            genesis_timestamp: get_env_parsed(
                &lookup,
                "GENESIS_TIMESTAMP",
                SlotClock::MAINNET_GENESIS_TIMESTAMP,
            )?,
            seconds_per_slot: get_env_parsed(
                &lookup,
                "SECONDS_PER_SLOT",
                SlotClock::MAINNET_SECONDS_PER_SLOT,
            )?,
            receipt_fetch_delay: Duration::from_millis(get_env_parsed(
                &lookup,
                "RECEIPT_FETCH_DELAY_MS",
                100,
            )?),
            upstream_timeout: Duration::from_secs(get_env_parsed(
                &lookup,
                "UPSTREAM_TIMEOUT_SECS",
                10,
            )?),
            log_json: get_env_bool(&lookup, "LOG_JSON")?,
        };

        // Fail at startup rather than on the first request.
        config.slot_clock()?;

        Ok(config)
    }

    pub fn slot_clock(&self) -> Result<SlotClock> {
        SlotClock::new(self.genesis_timestamp, self.seconds_per_slot).ok_or_else(|| {
            anyhow!(
                "invalid slot clock, genesis {} with {} seconds per slot",
                self.genesis_timestamp,
                self.seconds_per_slot
            )
        })
    }
}
