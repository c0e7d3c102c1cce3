use bitcoin::{Address, Amount, Network, ScriptBuf, Transaction};

use crate::util::status::Status;
use crate::SendSync;

/// The share of the spendable balance committed to a new channel, in percent
pub const PERCENTAGE_OF_FUNDS_PER_CHANNEL: u8 = 10;

/// The output a funding transaction must carry at index 0
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundingRequest {
    /// P2WSH of the 2-of-2 funding script
    pub script_pubkey: ScriptBuf,
    /// The committed amount
    pub value: Amount,
    /// The network the channel lives on
    pub network: Network,
}

impl FundingRequest {
    /// The funding output as an address, for wallets which pay to addresses
    pub fn address(&self) -> Result<Address, Status> {
        Address::from_script(&self.script_pubkey, self.network)
            .map_err(|e| Status::invalid_argument(format!("funding script: {}", e)))
    }
}

/// A layer-1 wallet which funds channels.
///
/// The handshake never broadcasts the returned transaction; the host does
/// that once the channel is established.
pub trait FundingSource: SendSync {
    /// The balance available for new channels, in satoshis
    fn spendable_balance(&self) -> Result<u64, Status>;

    /// Build and sign a transaction paying the requested output at index 0
    fn build_funding_transaction(&self, request: &FundingRequest) -> Result<Transaction, Status>;
}

/// The amount to commit from a balance, rounding down
pub fn channel_share(balance: u64, percent: u8) -> u64 {
    ((balance as u128 * percent as u128) / 100) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_share_test() {
        assert_eq!(channel_share(1_000_000, PERCENTAGE_OF_FUNDS_PER_CHANNEL), 100_000);
        assert_eq!(channel_share(500_000, PERCENTAGE_OF_FUNDS_PER_CHANNEL), 50_000);
        assert_eq!(channel_share(9, PERCENTAGE_OF_FUNDS_PER_CHANNEL), 0);
        assert_eq!(channel_share(u64::MAX, 100), u64::MAX);
    }

    #[test]
    fn address_of_p2wsh_request() {
        let request = FundingRequest {
            script_pubkey: ScriptBuf::new_p2wsh(&ScriptBuf::from_bytes(vec![0x51]).wscript_hash()),
            value: Amount::from_sat(1000),
            network: Network::Regtest,
        };
        assert!(request.address().unwrap().to_string().starts_with("bcrt1q"));
        let bad = FundingRequest { script_pubkey: ScriptBuf::new(), ..request };
        assert!(bad.address().is_err());
    }
}
