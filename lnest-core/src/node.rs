use core::fmt;
use core::time::Duration;

use bitcoin::secp256k1::{self, PublicKey, Secp256k1};
use bitcoin::Network;
use log::*;

use crate::announce::Announcer;
use crate::channel::{ChannelId, ChannelRecord};
use crate::funding::{FundingSource, PERCENTAGE_OF_FUNDS_PER_CHANNEL};
use crate::handshake::{Handshake, PeerTransport, Role};
use crate::persist::Persist;
use crate::prelude::*;
use crate::signer::derive::{ChannelSecrets, IndexedKeyDerive, KeyDerive};
use crate::util::clock::Clock;
use crate::util::status::{internal_error, invalid_argument, Status};
use crate::Arc;

/// Default time allowed for each handshake stage
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default confirmations required on both funding transactions
pub const DEFAULT_MINIMUM_DEPTH: u32 = 3;

/// Node configuration parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NodeConfig {
    /// The network type
    pub network: Network,
    /// Time allowed for each stage of a handshake before it fails
    pub handshake_timeout: Duration,
    /// Confirmations required on both funding transactions before a channel opens
    pub minimum_depth: u32,
    /// The percentage of the spendable balance committed to each new channel
    pub funding_percent: u8,
}

impl NodeConfig {
    /// Create a new node config with default parameters
    pub fn new(network: Network) -> NodeConfig {
        NodeConfig {
            network,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            minimum_depth: DEFAULT_MINIMUM_DEPTH,
            funding_percent: PERCENTAGE_OF_FUNDS_PER_CHANNEL,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig::new(Network::Testnet)
    }
}

/// External services a node depends on
#[derive(Clone)]
pub struct NodeServices {
    /// The layer-1 wallet which funds channels
    pub funding: Arc<dyn FundingSource>,
    /// Publishes established channels
    pub announcer: Arc<dyn Announcer>,
    /// The persister
    pub persister: Arc<dyn Persist>,
    /// Clock source
    pub clock: Arc<dyn Clock>,
}

/// A node, which establishes channels with peers.
///
/// Shared by all of its handshakes, each of which owns its own channel record.
pub struct Node {
    seed: [u8; 32],
    config: NodeConfig,
    services: NodeServices,
    key_derive: Box<dyn KeyDerive + Send + Sync>,
    node_id: PublicKey,
    secp_ctx: Secp256k1<secp256k1::All>,
}

impl SendSync for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node").field("node_id", &self.node_id).field("config", &self.config).finish()
    }
}

impl Node {
    /// Create a node with the default key derivation
    pub fn new(config: NodeConfig, seed: &[u8; 32], services: NodeServices) -> Result<Node, Status> {
        Self::new_with_key_derive(config, seed, services, Box::new(IndexedKeyDerive::new()))
    }

    /// Create a node with a specific key derivation
    pub fn new_with_key_derive(
        config: NodeConfig,
        seed: &[u8; 32],
        services: NodeServices,
        key_derive: Box<dyn KeyDerive + Send + Sync>,
    ) -> Result<Node, Status> {
        if config.funding_percent == 0 || config.funding_percent > 100 {
            return Err(invalid_argument(format!(
                "funding percent {} not in 1..=100",
                config.funding_percent
            )));
        }
        if config.handshake_timeout.is_zero() {
            return Err(invalid_argument("handshake timeout must be positive"));
        }
        let secp_ctx = Secp256k1::new();
        let (node_id, _) = key_derive
            .node_keys(seed, &secp_ctx)
            .map_err(|e| internal_error(format!("node keys: {}", e)))?;
        info!("node {} on {}", node_id, config.network);
        Ok(Node { seed: *seed, config, services, key_derive, node_id, secp_ctx })
    }

    /// The node id
    pub fn get_id(&self) -> PublicKey {
        self.node_id
    }

    /// The node configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The node services
    pub fn services(&self) -> &NodeServices {
        &self.services
    }

    pub(crate) fn secp_ctx(&self) -> &Secp256k1<secp256k1::All> {
        &self.secp_ctx
    }

    pub(crate) fn channel_keys(&self, channel_index: u64) -> Result<ChannelSecrets, secp256k1::Error> {
        self.key_derive.channel_keys(&self.seed, channel_index)
    }

    /// Start a handshake as the initiator, call [Handshake::activate] to send A
    pub fn initiator(self: &Arc<Self>, transport: Arc<dyn PeerTransport>) -> Handshake {
        Handshake::new(Arc::clone(self), transport, Role::Initiator)
    }

    /// Start a handshake as the responder, awaiting A
    pub fn responder(self: &Arc<Self>, transport: Arc<dyn PeerTransport>) -> Handshake {
        Handshake::new(Arc::clone(self), transport, Role::Responder)
    }

    /// The persisted channels of this node
    pub fn channels(&self) -> Result<Vec<(ChannelId, ChannelRecord)>, Status> {
        Ok(self.services.persister.get_channels()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_utils::*;
    use test_log::test;

    #[test]
    fn config_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.minimum_depth, 3);
        assert_eq!(config.handshake_timeout, Duration::from_secs(60));
        assert_eq!(config.funding_percent, 10);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (services, _) = make_services(1_000_000);
        let mut config = NodeConfig::new(Network::Regtest);
        config.funding_percent = 101;
        let err = Node::new(config, &test_seed(0), services.clone()).unwrap_err();
        assert_eq!(err.code(), crate::util::status::Code::InvalidArgument);
        config.funding_percent = 10;
        config.handshake_timeout = Duration::ZERO;
        assert!(Node::new(config, &test_seed(0), services).is_err());
    }

    #[test]
    fn node_id_depends_on_seed() {
        let (services, _) = make_services(1_000_000);
        let config = NodeConfig::new(Network::Regtest);
        let a = Node::new(config, &test_seed(0), services.clone()).unwrap();
        let b = Node::new(config, &test_seed(1), services).unwrap();
        assert_ne!(a.get_id(), b.get_id());
    }
}
