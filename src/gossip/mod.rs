//! Gossip state replication gated by peer roles.
//! Transport and message framing live outside this crate; this module holds
//! the decoded message types, the membership view, and the role gate placed in
//! front of the state provider.
pub mod member;
pub mod messages;
pub mod state;

pub use member::{Membership, NetworkMember, Properties};
pub use messages::{Block, Payload, PvtDataCollections, ReceivedMessage, StateRequest};
pub use state::{Dispatch, GatedStateHandler, ReplicationOp, StateHandler, StateProviderExtension};
