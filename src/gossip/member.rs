use serde::{Deserialize, Serialize};

/// Properties a peer advertises alongside its membership
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Properties {
    pub ledger_height: u64,
    pub left_channel: bool,
    pub roles: Vec<String>,
}

/// A remote peer as seen through gossip membership
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct NetworkMember {
    pub endpoint: String,
    pub internal_endpoint: String,
    pub pki_id: Vec<u8>,
    pub properties: Option<Properties>,
}

impl NetworkMember {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            internal_endpoint: endpoint.clone(),
            pki_id: endpoint.as_bytes().to_vec(),
            endpoint,
            properties: None,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let properties = self.properties.get_or_insert_with(Properties::default);
        properties.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Roles this member advertises. A member without properties advertises none.
    pub fn advertised_roles(&self) -> &[String] {
        self.properties
            .as_ref()
            .map(|p| p.roles.as_slice())
            .unwrap_or_default()
    }

    pub fn ledger_height(&self) -> u64 {
        self.properties
            .as_ref()
            .map(|p| p.ledger_height)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for NetworkMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint)
    }
}

/// Peer membership service for a channel
pub trait Membership: Send + Sync {
    /// Currently alive peers
    fn peers(&self) -> Vec<NetworkMember>;
}

/// Fixed membership list
impl Membership for Vec<NetworkMember> {
    fn peers(&self) -> Vec<NetworkMember> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_without_properties_has_no_roles() {
        let member = NetworkMember::new("peer0.org1:7051");
        assert!(member.advertised_roles().is_empty());
        assert_eq!(member.ledger_height(), 0);
    }

    #[test]
    fn with_roles_sets_properties() {
        let member = NetworkMember::new("peer0.org1:7051").with_roles(["endorser", "committer"]);
        assert_eq!(member.advertised_roles(), ["endorser", "committer"]);
        assert_eq!(member.to_string(), "peer0.org1:7051");
    }
}
