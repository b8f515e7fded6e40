//! CLI for this application
//!
use crate::roles::RoleSet;
use crate::settings;

#[derive(Clone, Debug, clap::Parser)]
#[clap(version, about = "Role-gated gossip state replication with expiring off-ledger storage")]
pub struct Cli {
    // Channel served by the gossip state provider
    #[clap(
        long,
        default_value = settings::DEFAULT_CHANNEL_ID,
        env("PEER_EXT_CHANNEL_ID"),
        help = "Channel the state provider extension serves"
    )]
    pub channel_id: String,

    // Roles of this peer
    #[clap(
        long,
        default_value = "",
        env("PEER_EXT_ROLES"),
        help = "Comma-separated peer roles, e.g. 'endorser,committer'. Empty means all roles"
    )]
    pub roles: RoleSet,

    // Off-ledger purge interval
    #[clap(
        long,
        default_value = settings::DEFAULT_OL_EXPIRATION_CHECK_INTERVAL_SECS,
        env("PEER_EXT_OL_EXPIRATION_CHECK_INTERVAL_SECS"),
        help = "Interval in seconds between off-ledger expiry sweeps"
    )]
    pub ol_expiration_check_interval_secs: u64,

    // Off-ledger default time-to-live
    #[clap(
        long,
        default_value = settings::DEFAULT_OL_DEFAULT_TTL_SECS,
        env("PEER_EXT_OL_DEFAULT_TTL_SECS"),
        help = "Default off-ledger time-to-live in seconds (0 = never expires)"
    )]
    pub ol_default_ttl_secs: u64,
}

impl Cli {
    pub fn into_settings(self) -> settings::Settings {
        settings::Settings {
            channel_id: self.channel_id,
            roles: self.roles,
            ol_expiration_check_interval_secs: self.ol_expiration_check_interval_secs,
            ol_default_ttl_secs: self.ol_default_ttl_secs,
        }
    }
}
