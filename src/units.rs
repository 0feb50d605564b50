use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const WEI_PER_GWEI: i128 = 1_000_000_000;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct GweiNewtype(pub i64);

impl Display for GweiNewtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} gwei", self.0)
    }
}

impl GweiNewtype {
    pub fn checked_add(self, rhs: GweiNewtype) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }
}

/// Amounts in wei. Fee sums for a single block comfortably exceed `i64::MAX`, hence i128.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct WeiNewtype(pub i128);

impl WeiNewtype {
    pub const ZERO: Self = Self(0);

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Integer division by 10^9. The remainder is dropped on purpose, callers rely on
    /// the exact truncated figures.
    pub fn to_gwei_truncated(self) -> Option<GweiNewtype> {
        i64::try_from(self.0 / WEI_PER_GWEI).ok().map(GweiNewtype)
    }

    pub fn checked_add(self, rhs: WeiNewtype) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: WeiNewtype) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn checked_mul(self, rhs: WeiNewtype) -> Option<Self> {
        self.0.checked_mul(rhs.0).map(Self)
    }
}

impl Display for WeiNewtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} wei", self.0)
    }
}

impl From<u64> for WeiNewtype {
    fn from(wei: u64) -> Self {
        Self(wei as i128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_gwei_truncates_test() {
        assert_eq!(
            WeiNewtype(45_031_378_244_999_999_999).to_gwei_truncated(),
            Some(GweiNewtype(45_031_378_244))
        );
        assert_eq!(WeiNewtype(999_999_999).to_gwei_truncated(), Some(GweiNewtype(0)));
    }

    #[test]
    fn to_gwei_truncates_toward_zero_for_negative_test() {
        assert_eq!(WeiNewtype(-1_500_000_000).to_gwei_truncated(), Some(GweiNewtype(-1)));
    }

    #[test]
    fn to_gwei_out_of_range_test() {
        assert_eq!(WeiNewtype(i128::MAX).to_gwei_truncated(), None);
    }

    #[test]
    fn gwei_serializes_as_number_test() {
        let json = serde_json::to_string(&GweiNewtype(203_182_923)).unwrap();
        assert_eq!(json, "203182923");
    }

    #[test]
    fn wei_arithmetic_test() {
        let fees = WeiNewtype::from(21_000u64)
            .checked_mul(WeiNewtype(30_000_000_000))
            .unwrap();
        assert_eq!(fees, WeiNewtype(630_000_000_000_000));
        assert_eq!(
            fees.checked_sub(WeiNewtype(30_000_000_000_000)),
            Some(WeiNewtype(600_000_000_000_000))
        );
        assert!(WeiNewtype(1).checked_sub(WeiNewtype(2)).unwrap().is_negative());
    }

    #[test]
    fn wei_arithmetic_overflow_test() {
        assert_eq!(WeiNewtype(i128::MAX).checked_add(WeiNewtype(1)), None);
        assert_eq!(WeiNewtype(i128::MIN).checked_sub(WeiNewtype(1)), None);
        assert_eq!(WeiNewtype(i128::MAX).checked_mul(WeiNewtype(2)), None);
        assert_eq!(GweiNewtype(i64::MAX).checked_add(GweiNewtype(1)), None);
    }
}
