//! Serde helpers for the number encodings used by our upstreams.
//! Beacon API numbers arrive as quoted decimals ("12345"), JSON-RPC quantities as
//! `0x` prefixed hex, explorer numbers as quoted decimals again.
use crate::units::{GweiNewtype, WeiNewtype};
use serde::{de, Deserialize, Deserializer};

fn parse_hex_quantity(text: &str) -> Result<u128, String> {
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| format!("expected 0x prefixed quantity, got {text}"))?;
    if digits.is_empty() {
        return Err("empty hex quantity".to_string());
    }
    u128::from_str_radix(digits, 16).map_err(|err| format!("invalid hex quantity {text}: {err}"))
}

fn wei_from_quantity(quantity: u128) -> Result<WeiNewtype, String> {
    i128::try_from(quantity)
        .map(WeiNewtype)
        .map_err(|_| format!("wei quantity {quantity} out of range"))
}

pub fn u64_from_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer)?
        .parse::<u64>()
        .map_err(de::Error::custom)
}

pub fn i64_from_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer)?
        .parse::<i64>()
        .map_err(de::Error::custom)
}

pub fn gwei_from_string<'de, D>(deserializer: D) -> Result<GweiNewtype, D::Error>
where
    D: Deserializer<'de>,
{
    i64_from_string(deserializer).map(GweiNewtype)
}

pub fn u64_vec_from_strings<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer)?
        .iter()
        .map(|text| text.parse::<u64>().map_err(de::Error::custom))
        .collect()
}

pub fn u64_from_hex<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let quantity = parse_hex_quantity(&text).map_err(de::Error::custom)?;
    u64::try_from(quantity).map_err(de::Error::custom)
}

pub fn wei_from_hex<'de, D>(deserializer: D) -> Result<WeiNewtype, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let quantity = parse_hex_quantity(&text).map_err(de::Error::custom)?;
    wei_from_quantity(quantity).map_err(de::Error::custom)
}

pub fn option_wei_from_hex<'de, D>(deserializer: D) -> Result<Option<WeiNewtype>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(text) => {
            let quantity = parse_hex_quantity(&text).map_err(de::Error::custom)?;
            wei_from_quantity(quantity).map(Some).map_err(de::Error::custom)
        }
    }
}

pub fn wei_from_string<'de, D>(deserializer: D) -> Result<WeiNewtype, D::Error>
where
    D: Deserializer<'de>,
{
    let quantity = String::deserialize(deserializer)?
        .parse::<u128>()
        .map_err(de::Error::custom)?;
    wei_from_quantity(quantity).map_err(de::Error::custom)
}
