//! Replication payloads handed to the state provider by the gossip layer.
//!
//! These are decoded forms; wire framing belongs to the transport.
use serde::{Deserialize, Serialize};

use super::member::NetworkMember;

/// A block delivered by gossip, with the private data that accompanied it
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Payload {
    pub seq_num: u64,
    pub data: Vec<u8>,
    pub private_data: Vec<Vec<u8>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub previous_hash: Vec<u8>,
    pub data_hash: Vec<u8>,
    pub data: Vec<Vec<u8>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct KeyWrite {
    pub key: String,
    pub value: Vec<u8>,
    pub is_delete: bool,
}

/// Private writes of one transaction to one collection
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CollectionPvtWrites {
    pub namespace: String,
    pub collection: String,
    pub writes: Vec<KeyWrite>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TxPvtData {
    pub seq_in_block: u64,
    pub write_set: Vec<CollectionPvtWrites>,
}

/// Private data for all transactions of a block
pub type PvtDataCollections = Vec<TxPvtData>;

/// Request for a range of blocks, sent by a lagging peer
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct StateRequest {
    pub start_seq_num: u64,
    pub end_seq_num: u64,
}

/// An inbound state request together with the peer that sent it
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub sender: Option<NetworkMember>,
    pub request: StateRequest,
}

impl ReceivedMessage {
    pub fn new(request: StateRequest) -> Self {
        Self {
            sender: None,
            request,
        }
    }

    pub fn from_peer(sender: NetworkMember, request: StateRequest) -> Self {
        Self {
            sender: Some(sender),
            request,
        }
    }
}
