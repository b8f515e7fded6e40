//! Role-gated gossip state replication and expiring off-ledger storage.
//!
//! [`gossip::StateProviderExtension`] decides, per replication event, whether
//! the local peer's roles let the real state handler run.
//! [`offledger::ExpiringStoreProvider`] serves per-collection stores whose
//! records expire and are purged in the background.
pub mod cli;
pub mod error;
pub mod gossip;
pub mod offledger;
pub mod roles;
pub mod settings;

pub use error::{PeerExtError, Result};
pub use roles::{Role, RoleRegistry, RoleSet};
