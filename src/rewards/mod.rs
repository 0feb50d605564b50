//! Proposer reward computation.
pub mod composer;
pub mod fees;
pub mod mev;

use serde::Serialize;
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

use crate::beacon_chain::Slot;
use crate::upstream::UpstreamError;

pub use composer::RewardComposer;
pub use fees::FeeCalculator;
pub use mev::{LastTransactionHeuristic, MevClassifier, MockMevClassifier};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RewardResult {
    /// Whether the block carried a builder payment to the proposer.
    #[serde(rename = "status")]
    pub boosted: bool,
    #[serde(rename = "reward")]
    pub reward_gwei: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RewardMode {
    /// Execution layer fees and builder tip only.
    #[default]
    Light,
    /// Light plus the consensus layer incentives of the proposer.
    Full,
}

impl Display for RewardMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewardMode::Light => write!(f, "light"),
            RewardMode::Full => write!(f, "full"),
        }
    }
}

impl FromStr for RewardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(RewardMode::Light),
            "full" | "beast" => Ok(RewardMode::Full),
            other => Err(format!("unknown reward mode {other}, expected light or full")),
        }
    }
}

#[derive(Debug, Error)]
pub enum RewardError {
    #[error("{0}")]
    NotFound(String),
    #[error("slot {0} is in the future")]
    InFuture(Slot),
    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(#[source] UpstreamError),
    #[error("failed to decode upstream data: {0}")]
    Decode(String),
    #[error("reward computation failed: {0}")]
    Computation(String),
}

impl From<UpstreamError> for RewardError {
    fn from(err: UpstreamError) -> Self {
        if err.is_decode() {
            RewardError::Decode(err.to_string())
        } else {
            RewardError::UpstreamFetch(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn reward_result_serializes_test() {
        let json = serde_json::to_value(RewardResult {
            boosted: true,
            reward_gwei: 203_182_923,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "status": true, "reward": 203182923 }));
    }

    #[test]
    fn parse_reward_mode_test() {
        assert_eq!("light".parse::<RewardMode>(), Ok(RewardMode::Light));
        assert_eq!("full".parse::<RewardMode>(), Ok(RewardMode::Full));
        assert_eq!("BEAST".parse::<RewardMode>(), Ok(RewardMode::Full));
        assert!("heavy".parse::<RewardMode>().is_err());
        assert_eq!(RewardMode::default(), RewardMode::Light);
    }

    #[test]
    fn upstream_error_classification_test() {
        let decode = UpstreamError::Decode {
            url: "http://node".to_string(),
            message: "missing field `slot`".to_string(),
        };
        let status = UpstreamError::Status {
            url: "http://node".to_string(),
            status: StatusCode::BAD_GATEWAY,
        };
        assert!(matches!(RewardError::from(decode), RewardError::Decode(_)));
        assert!(matches!(
            RewardError::from(status),
            RewardError::UpstreamFetch(_)
        ));
    }
}
