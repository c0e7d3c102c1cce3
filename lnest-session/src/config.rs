use core::time::Duration;
use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use lnest::bitcoin::Network;
use lnest::node::NodeConfig;
use lnest::util::log_utils::parse_log_level_filter;
use lnest_common::hex_to_array;

/// Network name
pub const NETWORK_VAR: &str = "LNEST_NETWORK";
/// Seconds allowed per handshake stage
pub const HANDSHAKE_TIMEOUT_VAR: &str = "LNEST_HANDSHAKE_TIMEOUT_SECS";
/// Confirmations required before a channel opens
pub const MINIMUM_DEPTH_VAR: &str = "LNEST_MINIMUM_DEPTH";
/// Share of the spendable balance per channel, in percent
pub const FUNDING_PERCENT_VAR: &str = "LNEST_FUNDING_PERCENT";
/// Node seed as 64 hex characters
pub const SEED_VAR: &str = "LNEST_SEED";
/// Default log level when RUST_LOG has no directive for a target
pub const LOG_LEVEL_VAR: &str = "LNEST_LOG_LEVEL";

/// Session configuration
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// The node configuration
    pub node: NodeConfig,
    /// The node seed, if provided
    pub seed: Option<[u8; 32]>,
    /// Default log level
    pub log_level: log::LevelFilter,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig { node: NodeConfig::default(), seed: None, log_level: log::LevelFilter::Info }
    }
}

impl SessionConfig {
    /// Read the configuration from the process environment.  Unset variables
    /// take their defaults.
    pub fn from_env() -> Result<SessionConfig> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read the configuration through a variable lookup function
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<SessionConfig> {
        let mut config = SessionConfig::default();
        if let Some(network) = lookup(NETWORK_VAR) {
            config.node.network = Network::from_str(&network)
                .map_err(|e| anyhow!("{}: {}", NETWORK_VAR, e))?;
        }
        if let Some(secs) = lookup(HANDSHAKE_TIMEOUT_VAR) {
            let secs: u64 = secs.parse().with_context(|| HANDSHAKE_TIMEOUT_VAR)?;
            if secs == 0 {
                return Err(anyhow!("{} must be positive", HANDSHAKE_TIMEOUT_VAR));
            }
            config.node.handshake_timeout = Duration::from_secs(secs);
        }
        if let Some(depth) = lookup(MINIMUM_DEPTH_VAR) {
            config.node.minimum_depth = depth.parse().with_context(|| MINIMUM_DEPTH_VAR)?;
        }
        if let Some(percent) = lookup(FUNDING_PERCENT_VAR) {
            let percent: u8 = percent.parse().with_context(|| FUNDING_PERCENT_VAR)?;
            if percent == 0 || percent > 100 {
                return Err(anyhow!("{} must be in 1..=100, got {}", FUNDING_PERCENT_VAR, percent));
            }
            config.node.funding_percent = percent;
        }
        if let Some(seed) = lookup(SEED_VAR) {
            config.seed = Some(hex_to_array(seed.trim()).with_context(|| SEED_VAR)?);
        }
        if let Some(level) = lookup(LOG_LEVEL_VAR) {
            config.log_level = parse_log_level_filter(&level)?;
        }
        Ok(config)
    }
}
