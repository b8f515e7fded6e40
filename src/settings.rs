//! Peer extension settings
use std::time::Duration;

use crate::roles::RoleSet;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_CHANNEL_ID: &str = "mychannel";
pub const STANDARD_OL_EXPIRATION_CHECK_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_OL_EXPIRATION_CHECK_INTERVAL_SECS: &str = "60";
pub const DEFAULT_OL_DEFAULT_TTL_SECS: &str = "0";

/// Settings for the off-ledger store provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OffLedgerSettings {
    // How often the purge task looks for expired records
    pub expiration_check_interval: Duration,
    // TTL stamped on records written to stores opened without a collection config
    pub default_ttl: Option<Duration>,
}

impl Default for OffLedgerSettings {
    fn default() -> Self {
        Self {
            expiration_check_interval: Duration::from_secs(
                STANDARD_OL_EXPIRATION_CHECK_INTERVAL_SECS,
            ),
            default_ttl: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    // Channel the state provider extension serves
    pub channel_id: String,

    // Roles held by this peer; empty means all roles
    pub roles: RoleSet,

    // Off-ledger purge interval in seconds
    pub ol_expiration_check_interval_secs: u64,

    // Off-ledger default time-to-live in seconds (0 = never expires)
    pub ol_default_ttl_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel_id: DEFAULT_CHANNEL_ID.to_string(),
            roles: RoleSet::all(),
            ol_expiration_check_interval_secs: STANDARD_OL_EXPIRATION_CHECK_INTERVAL_SECS,
            ol_default_ttl_secs: 0,
        }
    }
}

impl Settings {
    pub fn offledger_settings(&self) -> OffLedgerSettings {
        OffLedgerSettings {
            expiration_check_interval: Duration::from_secs(self.ol_expiration_check_interval_secs),
            default_ttl: match self.ol_default_ttl_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}
