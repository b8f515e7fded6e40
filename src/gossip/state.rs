//! Role-gated gossip state provider
//!
//! The gossip state provider performs four replication operations: ingesting
//! payloads, storing blocks, running anti-entropy, and answering state requests
//! from other peers. A peer that does not commit blocks has no ledger to build,
//! so the first three are skipped on such peers. Every peer answers state requests.
//!
//! [`StateProviderExtension::wrap`] puts a [`GatedStateHandler`] in front of the
//! real handler. The gated handler implements the same [`StateHandler`] trait and
//! consults the role registry on every call, so role changes apply to the next
//! event without rebuilding anything.
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::member::{Membership, NetworkMember};
use super::messages::{Block, Payload, PvtDataCollections, ReceivedMessage};
use crate::roles::{RoleRegistry, RoleSet, ENDORSER};

/// Replication entry points driven by the gossip layer
#[async_trait]
pub trait StateHandler: Send + Sync {
    type Error: Send + 'static;

    async fn add_payload(&self, payload: Payload, blocking: bool) -> Result<(), Self::Error>;

    async fn store_block(
        &self,
        block: Block,
        pvt_data: PvtDataCollections,
    ) -> Result<(), Self::Error>;

    async fn anti_entropy(&self);

    async fn handle_state_request(&self, msg: ReceivedMessage);
}

/// Shared handlers: the replication engine and the gate may hold the same handler
#[async_trait]
impl<H: StateHandler + ?Sized> StateHandler for Arc<H> {
    type Error = H::Error;

    async fn add_payload(&self, payload: Payload, blocking: bool) -> Result<(), Self::Error> {
        (**self).add_payload(payload, blocking).await
    }

    async fn store_block(
        &self,
        block: Block,
        pvt_data: PvtDataCollections,
    ) -> Result<(), Self::Error> {
        (**self).store_block(block, pvt_data).await
    }

    async fn anti_entropy(&self) {
        (**self).anti_entropy().await
    }

    async fn handle_state_request(&self, msg: ReceivedMessage) {
        (**self).handle_state_request(msg).await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReplicationOp {
    AddPayload,
    StoreBlock,
    AntiEntropy,
    HandleStateRequest,
}

/// What to do with one replication event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Run the real handler and return its result
    Invoke,
    /// Succeed without running the handler
    Skip,
}

impl ReplicationOp {
    pub fn dispatch_for(self, roles: &RoleSet) -> Dispatch {
        match self {
            ReplicationOp::AddPayload | ReplicationOp::StoreBlock | ReplicationOp::AntiEntropy => {
                if roles.is_committer() {
                    Dispatch::Invoke
                } else {
                    Dispatch::Skip
                }
            }
            ReplicationOp::HandleStateRequest => Dispatch::Invoke,
        }
    }
}

impl std::fmt::Display for ReplicationOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicationOp::AddPayload => write!(f, "add-payload"),
            ReplicationOp::StoreBlock => write!(f, "store-block"),
            ReplicationOp::AntiEntropy => write!(f, "anti-entropy"),
            ReplicationOp::HandleStateRequest => write!(f, "handle-state-request"),
        }
    }
}

/// Per-channel gate for state replication
#[derive(Clone)]
pub struct StateProviderExtension {
    channel_id: String,
    roles: RoleRegistry,
    membership: Option<Arc<dyn Membership>>,
}

impl std::fmt::Debug for StateProviderExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateProviderExtension")
            .field("channel_id", &self.channel_id)
            .field("roles", &self.roles.roles())
            .field("has_membership", &self.membership.is_some())
            .finish()
    }
}

impl StateProviderExtension {
    pub fn new(channel_id: impl Into<String>, roles: RoleRegistry) -> Self {
        Self {
            channel_id: channel_id.into(),
            roles,
            membership: None,
        }
    }

    pub fn with_membership(mut self, membership: Arc<dyn Membership>) -> Self {
        self.membership = Some(membership);
        self
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Decide an operation against the current role snapshot
    pub fn dispatch(&self, op: ReplicationOp) -> Dispatch {
        let roles = self.roles.roles();
        let decision = op.dispatch_for(&roles);
        if decision == Dispatch::Skip {
            debug!(
                "[{}] Skipping {} for peer with roles [{}]",
                self.channel_id, op, roles
            );
        }
        decision
    }

    /// Gate `handler` behind this extension's role checks
    pub fn wrap<H: StateHandler>(&self, handler: H) -> GatedStateHandler<H> {
        GatedStateHandler {
            extension: self.clone(),
            inner: handler,
        }
    }

    /// Filter for choosing which peers to replicate from.
    ///
    /// A member passes if `base` accepts it and it either advertises no roles
    /// or advertises the endorser role.
    pub fn predicate<P>(&self, base: P) -> impl Fn(&NetworkMember) -> bool + Send + Sync + 'static
    where
        P: Fn(&NetworkMember) -> bool + Send + Sync + 'static,
    {
        let channel_id = self.channel_id.clone();
        move |member: &NetworkMember| {
            if !base(member) {
                return false;
            }
            if is_replication_source(member) {
                true
            } else {
                debug!(
                    "[{}] Rejecting {} as replication source, roles: {:?}",
                    channel_id,
                    member,
                    member.advertised_roles()
                );
                false
            }
        }
    }

    /// Current peers that pass `predicate(base)`
    pub fn replication_sources<P>(&self, base: P) -> Vec<NetworkMember>
    where
        P: Fn(&NetworkMember) -> bool + Send + Sync + 'static,
    {
        let Some(membership) = &self.membership else {
            return Vec::new();
        };
        let accept = self.predicate(base);
        membership
            .peers()
            .into_iter()
            .filter(|member| accept(member))
            .collect()
    }
}

// Roles are compared verbatim: a lone "" is an advertised role, not an absence of one.
fn is_replication_source(member: &NetworkMember) -> bool {
    let roles = member.advertised_roles();
    roles.is_empty() || roles.iter().any(|role| role == ENDORSER)
}

/// A [`StateHandler`] that only reaches `inner` when the local roles allow it
#[derive(Clone, Debug)]
pub struct GatedStateHandler<H> {
    extension: StateProviderExtension,
    inner: H,
}

impl<H> GatedStateHandler<H> {
    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn extension(&self) -> &StateProviderExtension {
        &self.extension
    }
}

#[async_trait]
impl<H: StateHandler> StateHandler for GatedStateHandler<H> {
    type Error = H::Error;

    async fn add_payload(&self, payload: Payload, blocking: bool) -> Result<(), Self::Error> {
        match self.extension.dispatch(ReplicationOp::AddPayload) {
            Dispatch::Invoke => self.inner.add_payload(payload, blocking).await,
            Dispatch::Skip => Ok(()),
        }
    }

    async fn store_block(
        &self,
        block: Block,
        pvt_data: PvtDataCollections,
    ) -> Result<(), Self::Error> {
        match self.extension.dispatch(ReplicationOp::StoreBlock) {
            Dispatch::Invoke => self.inner.store_block(block, pvt_data).await,
            Dispatch::Skip => Ok(()),
        }
    }

    async fn anti_entropy(&self) {
        if self.extension.dispatch(ReplicationOp::AntiEntropy) == Dispatch::Invoke {
            self.inner.anti_entropy().await;
        }
    }

    async fn handle_state_request(&self, msg: ReceivedMessage) {
        if self.extension.dispatch(ReplicationOp::HandleStateRequest) == Dispatch::Invoke {
            self.inner.handle_state_request(msg).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::gossip::messages::StateRequest;
    use crate::roles::Role;

    const SAMPLE_ERROR: &str = "not implemented";

    #[derive(Default)]
    struct RecordingHandler {
        calls: Mutex<Vec<ReplicationOp>>,
    }

    impl RecordingHandler {
        fn calls(&self) -> Vec<ReplicationOp> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, op: ReplicationOp) {
            self.calls.lock().unwrap().push(op);
        }
    }

    #[async_trait]
    impl StateHandler for RecordingHandler {
        type Error = String;

        async fn add_payload(&self, _payload: Payload, _blocking: bool) -> Result<(), String> {
            self.record(ReplicationOp::AddPayload);
            Err(SAMPLE_ERROR.to_string())
        }

        async fn store_block(
            &self,
            _block: Block,
            _pvt_data: PvtDataCollections,
        ) -> Result<(), String> {
            self.record(ReplicationOp::StoreBlock);
            Err(SAMPLE_ERROR.to_string())
        }

        async fn anti_entropy(&self) {
            self.record(ReplicationOp::AntiEntropy);
        }

        async fn handle_state_request(&self, _msg: ReceivedMessage) {
            self.record(ReplicationOp::HandleStateRequest);
        }
    }

    fn gated(roles: RoleSet) -> GatedStateHandler<RecordingHandler> {
        StateProviderExtension::new("test", RoleRegistry::new(roles))
            .wrap(RecordingHandler::default())
    }

    async fn drive(handler: &GatedStateHandler<RecordingHandler>) -> (Result<(), String>, Result<(), String>) {
        let payload = handler.add_payload(Payload::default(), false).await;
        let block = handler.store_block(Block::default(), Vec::new()).await;
        handler.anti_entropy().await;
        handler
            .handle_state_request(ReceivedMessage::new(StateRequest::default()))
            .await;
        (payload, block)
    }

    #[tokio::test]
    async fn all_roles_invokes_everything() {
        let handler = gated(RoleSet::all());
        let (payload, block) = drive(&handler).await;
        assert_eq!(payload, Err(SAMPLE_ERROR.to_string()));
        assert_eq!(block, Err(SAMPLE_ERROR.to_string()));
        assert_eq!(
            handler.inner().calls(),
            vec![
                ReplicationOp::AddPayload,
                ReplicationOp::StoreBlock,
                ReplicationOp::AntiEntropy,
                ReplicationOp::HandleStateRequest,
            ]
        );
    }

    #[tokio::test]
    async fn endorser_only_skips_ledger_operations() {
        let handler = gated(RoleSet::from_roles([Role::endorser()]));
        let (payload, block) = drive(&handler).await;
        assert_eq!(payload, Ok(()));
        assert_eq!(block, Ok(()));
        assert_eq!(
            handler.inner().calls(),
            vec![ReplicationOp::HandleStateRequest]
        );
    }

    #[tokio::test]
    async fn committer_invokes_everything() {
        let handler = gated(RoleSet::from_roles([Role::committer()]));
        let (payload, block) = drive(&handler).await;
        assert!(payload.is_err());
        assert!(block.is_err());
        assert_eq!(handler.inner().calls().len(), 4);
    }

    #[tokio::test]
    async fn validator_only_is_not_a_committer() {
        let handler = gated(RoleSet::from_roles([Role::validator()]));
        let (payload, _) = drive(&handler).await;
        assert_eq!(payload, Ok(()));
        assert_eq!(
            handler.inner().calls(),
            vec![ReplicationOp::HandleStateRequest]
        );
    }

    #[tokio::test]
    async fn role_change_applies_to_next_call() {
        let registry = RoleRegistry::new(RoleSet::from_roles([Role::committer()]));
        let handler = StateProviderExtension::new("test", registry.clone())
            .wrap(RecordingHandler::default());

        handler.anti_entropy().await;
        registry.set_roles(RoleSet::from_roles([Role::endorser()]));
        handler.anti_entropy().await;

        assert_eq!(handler.inner().calls(), vec![ReplicationOp::AntiEntropy]);
    }

    #[test]
    fn dispatch_table() {
        let endorser = RoleSet::from_roles([Role::endorser()]);
        assert_eq!(
            ReplicationOp::AddPayload.dispatch_for(&endorser),
            Dispatch::Skip
        );
        assert_eq!(
            ReplicationOp::HandleStateRequest.dispatch_for(&endorser),
            Dispatch::Invoke
        );
        assert_eq!(
            ReplicationOp::StoreBlock.dispatch_for(&RoleSet::all()),
            Dispatch::Invoke
        );
    }

    #[test]
    fn predicate_filters_by_advertised_roles() {
        let extension = StateProviderExtension::new("test", RoleRegistry::default());
        let predicate = extension.predicate(|_| true);

        assert!(predicate(&NetworkMember::new("p1").with_roles(["endorser"])));
        assert!(!predicate(&NetworkMember::new("p2").with_roles(["committer"])));
        assert!(predicate(&NetworkMember::new("p3").with_roles(Vec::<String>::new())));
        assert!(!predicate(&NetworkMember::new("p4").with_roles([""])));
        assert!(predicate(&NetworkMember::new("p5")));
        assert!(predicate(
            &NetworkMember::new("p6").with_roles(["committer", "endorser"])
        ));
    }

    #[test]
    fn predicate_respects_base() {
        let extension = StateProviderExtension::new("test", RoleRegistry::default());
        let predicate = extension.predicate(|member| member.ledger_height() > 10);
        assert!(!predicate(&NetworkMember::new("p1").with_roles(["endorser"])));
    }

    #[test]
    fn replication_sources_uses_membership() {
        let peers = vec![
            NetworkMember::new("p1").with_roles(["endorser"]),
            NetworkMember::new("p2").with_roles(["committer"]),
            NetworkMember::new("p3"),
        ];
        let extension = StateProviderExtension::new("test", RoleRegistry::default())
            .with_membership(Arc::new(peers));
        let sources: Vec<String> = extension
            .replication_sources(|_| true)
            .into_iter()
            .map(|m| m.endpoint)
            .collect();
        assert_eq!(sources, vec!["p1".to_string(), "p3".to_string()]);

        let detached = StateProviderExtension::new("test", RoleRegistry::default());
        assert!(detached.replication_sources(|_| true).is_empty());
    }
}
