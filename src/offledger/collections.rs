//! Off-ledger collection configuration
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config_error;
use crate::error::Result;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum CollectionType {
    /// Plain off-ledger key/value data
    OffLedger,
    /// Content-addressed: each key is the hash of its value
    Dcas,
}

impl std::fmt::Display for CollectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionType::OffLedger => write!(f, "COL_OFFLEDGER"),
            CollectionType::Dcas => write!(f, "COL_DCAS"),
        }
    }
}

/// Static configuration of one off-ledger collection.
///
/// `time_to_live` uses Go duration syntax (`"30s"`, `"1h30m"`); an empty string
/// means records never expire. `member_orgs_policy` is the signature policy
/// expression, evaluated elsewhere.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CollectionConfig {
    pub name: String,
    pub collection_type: CollectionType,
    pub required_peer_count: i32,
    pub maximum_peer_count: i32,
    pub time_to_live: String,
    pub member_orgs_policy: String,
}

impl CollectionConfig {
    pub fn off_ledger(
        name: &str,
        policy: &str,
        required_peer_count: i32,
        maximum_peer_count: i32,
        time_to_live: &str,
    ) -> Self {
        Self::with_type(
            CollectionType::OffLedger,
            name,
            policy,
            required_peer_count,
            maximum_peer_count,
            time_to_live,
        )
    }

    pub fn dcas(
        name: &str,
        policy: &str,
        required_peer_count: i32,
        maximum_peer_count: i32,
        time_to_live: &str,
    ) -> Self {
        Self::with_type(
            CollectionType::Dcas,
            name,
            policy,
            required_peer_count,
            maximum_peer_count,
            time_to_live,
        )
    }

    fn with_type(
        collection_type: CollectionType,
        name: &str,
        policy: &str,
        required_peer_count: i32,
        maximum_peer_count: i32,
        time_to_live: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            collection_type,
            required_peer_count,
            maximum_peer_count,
            time_to_live: time_to_live.to_string(),
            member_orgs_policy: policy.to_string(),
        }
    }

    pub fn is_dcas(&self) -> bool {
        self.collection_type == CollectionType::Dcas
    }

    pub fn ttl(&self) -> Result<Option<Duration>> {
        if self.time_to_live.trim().is_empty() {
            return Ok(None);
        }
        parse_duration(&self.time_to_live).map(Some)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(config_error!("collection name must not be empty"));
        }
        if self.maximum_peer_count < 0 || self.required_peer_count < 0 {
            return Err(config_error!(
                "collection [{}]: peer counts must not be negative",
                self.name
            ));
        }
        if self.required_peer_count > self.maximum_peer_count {
            return Err(config_error!(
                "collection [{}]: required peer count {} exceeds maximum peer count {}",
                self.name,
                self.required_peer_count,
                self.maximum_peer_count
            ));
        }
        self.ttl()?;
        Ok(())
    }
}

/// Parse a Go-style duration such as `"300ms"`, `"1.5h"` or `"2h45m"`.
/// Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err(config_error!("invalid duration: empty string"));
    }

    let mut rest = input;
    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(config_error!("invalid duration: {}", input));
        }

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let nanos_per_unit = match unit {
            "ns" => 1f64,
            "us" | "\u{b5}s" | "\u{3bc}s" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(config_error!("missing unit in duration: {}", input)),
            other => {
                return Err(config_error!(
                    "unknown unit '{}' in duration: {}",
                    other,
                    input
                ))
            }
        };
        let value: f64 = number
            .parse()
            .map_err(|_| config_error!("invalid duration: {}", input))?;
        total_nanos += value * nanos_per_unit;
        rest = tail;
    }

    if total_nanos > u64::MAX as f64 {
        return Err(config_error!("duration out of range: {}", input));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}
