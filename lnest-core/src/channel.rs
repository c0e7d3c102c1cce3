use core::fmt::{self, Debug, Formatter};

use bitcoin::hashes::sha256::Hash as Sha256;
use bitcoin::hashes::{Hash, HashEngine};
use bitcoin::secp256k1::{self, ecdsa::Signature, PublicKey, Secp256k1, SecretKey};
use bitcoin::{Amount, Txid};
use lnest_common::HexEncode;
use serde_derive::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as, Bytes, IfIsHumanReadable};

use crate::error::{protocol_violation, EstablishError};
use crate::signer::derive::ChannelSecrets;
use crate::tx::tx::{txid_bytes, EscapeTxParams};
use crate::util::debug_utils::{DebugBytes, DebugSecret};

/// Initial depth of the local payment hash chain
pub const INITIAL_CHAIN_DEPTH: u32 = 1000;

/// Channel identifier
///
/// SHA256 of the two funding txids in lexicographic order, so both peers
/// derive the same identifier.
#[serde_as]
#[derive(PartialEq, Eq, Clone, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(#[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")] [u8; 32]);

impl ChannelId {
    /// Create an ID from the two funding transactions
    pub fn from_funding_txids(a: &Txid, b: &Txid) -> Self {
        let (a, b) = (txid_bytes(a), txid_bytes(b));
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let mut sha = Sha256::engine();
        sha.input(&first);
        sha.input(&second);
        ChannelId(Sha256::from_engine(sha).to_byte_array())
    }

    /// Create an ID
    pub fn new(inner: [u8; 32]) -> Self {
        Self(inner)
    }

    /// Convert to a byte slice
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for ChannelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// The announcement handed to the [crate::announce::Announcer] once a channel is established
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAnnouncement {
    /// The channel
    pub channel_id: ChannelId,
}

/// The local view of one channel.
///
/// "server" fields belong to the local party, "client" fields to the remote
/// party.  Remote material is absent until the remote's message has been
/// processed.
#[serde_as]
#[derive(Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// The local amount at negotiation time
    pub initial_amount_server: u64,
    /// The local amount
    pub amount_server: u64,
    /// The remote amount at negotiation time
    pub initial_amount_client: u64,
    /// The remote amount
    pub amount_client: u64,

    /// Local escape key
    pub key_server: SecretKey,
    /// Local fast-escape key
    pub key_server_a: SecretKey,
    /// Per-channel master key material
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub master_private_key_server: [u8; 32],
    /// Local fast-escape secret
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub anchor_secret_server: [u8; 32],
    /// SHA256 of the local fast-escape secret
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub anchor_secret_hash_server: [u8; 32],
    /// Local revocation secret
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub anchor_revocation_server: [u8; 32],
    /// SHA256 of the local revocation secret
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub anchor_revocation_hash_server: [u8; 32],

    /// Remote escape key
    pub key_client: Option<PublicKey>,
    /// Remote fast-escape key
    pub key_client_a: Option<PublicKey>,
    /// Remote fast-escape secret hash
    #[serde_as(as = "Option<IfIsHumanReadable<Hex, Bytes>>")]
    pub anchor_secret_hash_client: Option<[u8; 32]>,
    /// Remote revocation hash
    #[serde_as(as = "Option<IfIsHumanReadable<Hex, Bytes>>")]
    pub anchor_revocation_hash_client: Option<[u8; 32]>,

    /// The remote funding transaction, output 0 funds the remote amount
    pub anchor_tx_hash_client: Option<Txid>,
    /// The local funding transaction, output 0 funds the local amount
    pub anchor_tx_hash_server: Option<Txid>,

    /// Remote signature over the local escape transaction
    pub escape_tx_sig: Option<Signature>,
    /// Remote signature over the local fast-escape transaction
    pub fast_escape_tx_sig: Option<Signature>,

    /// Remaining depth of the local payment hash chain
    pub server_chain_depth: u32,
    /// Current child in the local payment hash chain
    pub server_chain_child: u32,
    /// Set once both funding transactions are confirmed
    pub is_ready: bool,

    /// The node channel counter value the local keys were derived from
    pub channel_index: u64,
    /// Whether the local party activated the handshake
    pub is_initiator: bool,
}

impl ChannelRecord {
    /// A fresh record with local material only
    pub fn new(
        secrets: ChannelSecrets,
        channel_index: u64,
        is_initiator: bool,
        amount_server: u64,
        amount_client: u64,
    ) -> Self {
        ChannelRecord {
            initial_amount_server: amount_server,
            amount_server,
            initial_amount_client: amount_client,
            amount_client,
            key_server: secrets.key_server,
            key_server_a: secrets.key_server_a,
            master_private_key_server: secrets.master_private_key_server,
            anchor_secret_server: secrets.anchor_secret_server,
            anchor_secret_hash_server: secrets.anchor_secret_hash_server,
            anchor_revocation_server: secrets.anchor_revocation_server,
            anchor_revocation_hash_server: secrets.anchor_revocation_hash_server,
            key_client: None,
            key_client_a: None,
            anchor_secret_hash_client: None,
            anchor_revocation_hash_client: None,
            anchor_tx_hash_client: None,
            anchor_tx_hash_server: None,
            escape_tx_sig: None,
            fast_escape_tx_sig: None,
            server_chain_depth: INITIAL_CHAIN_DEPTH,
            server_chain_child: 0,
            is_ready: false,
            channel_index,
            is_initiator,
        }
    }

    /// Local escape public key
    pub fn pubkey_server(&self, secp_ctx: &Secp256k1<secp256k1::All>) -> PublicKey {
        PublicKey::from_secret_key(secp_ctx, &self.key_server)
    }

    /// Local fast-escape public key
    pub fn pubkey_server_a(&self, secp_ctx: &Secp256k1<secp256k1::All>) -> PublicKey {
        PublicKey::from_secret_key(secp_ctx, &self.key_server_a)
    }

    /// Set the remote keys and commitments, learned from message A or B
    pub fn set_remote_material(
        &mut self,
        key_client: PublicKey,
        key_client_a: PublicKey,
        anchor_secret_hash_client: [u8; 32],
        anchor_revocation_hash_client: [u8; 32],
    ) {
        self.key_client = Some(key_client);
        self.key_client_a = Some(key_client_a);
        self.anchor_secret_hash_client = Some(anchor_secret_hash_client);
        self.anchor_revocation_hash_client = Some(anchor_revocation_hash_client);
    }

    /// The total of both amounts
    pub fn total_amount(&self) -> u64 {
        self.amount_server.saturating_add(self.amount_client)
    }

    /// The channel id, once both funding transactions are known
    pub fn channel_id(&self) -> Option<ChannelId> {
        match (&self.anchor_tx_hash_server, &self.anchor_tx_hash_client) {
            (Some(s), Some(c)) => Some(ChannelId::from_funding_txids(s, c)),
            _ => None,
        }
    }

    fn remote_keys(&self) -> Result<(PublicKey, PublicKey), EstablishError> {
        match (self.key_client, self.key_client_a) {
            (Some(k), Some(ka)) => Ok((k, ka)),
            _ => Err(protocol_violation("remote keys not yet known")),
        }
    }

    /// Parameters of the local escape transactions, which the remote signs.
    ///
    /// Available once the local funding transaction and the remote keys are known.
    pub fn holder_escape_params(
        &self,
        secp_ctx: &Secp256k1<secp256k1::All>,
    ) -> Result<EscapeTxParams, EstablishError> {
        let (key_client, key_client_a) = self.remote_keys()?;
        let funding_txid = self
            .anchor_tx_hash_server
            .ok_or_else(|| protocol_violation("local funding transaction not yet built"))?;
        Ok(EscapeTxParams {
            funding_txid,
            amount: Amount::from_sat(self.amount_server),
            owner_key: self.pubkey_server(secp_ctx),
            owner_key_a: self.pubkey_server_a(secp_ctx),
            counterparty_key: key_client,
            counterparty_key_a: key_client_a,
            revocation_hash: self.anchor_revocation_hash_server,
            secret_hash: self.anchor_secret_hash_server,
        })
    }

    /// Parameters of the remote escape transactions, which the local party signs.
    ///
    /// Available once the remote funding txid and the remote material are known.
    pub fn counterparty_escape_params(
        &self,
        secp_ctx: &Secp256k1<secp256k1::All>,
    ) -> Result<EscapeTxParams, EstablishError> {
        let (key_client, key_client_a) = self.remote_keys()?;
        let funding_txid = self
            .anchor_tx_hash_client
            .ok_or_else(|| protocol_violation("remote funding txid not yet known"))?;
        let (revocation_hash, secret_hash) =
            match (self.anchor_revocation_hash_client, self.anchor_secret_hash_client) {
                (Some(r), Some(s)) => (r, s),
                _ => return Err(protocol_violation("remote commitments not yet known")),
            };
        Ok(EscapeTxParams {
            funding_txid,
            amount: Amount::from_sat(self.amount_client),
            owner_key: key_client,
            owner_key_a: key_client_a,
            counterparty_key: self.pubkey_server(secp_ctx),
            counterparty_key_a: self.pubkey_server_a(secp_ctx),
            revocation_hash,
            secret_hash,
        })
    }
}

impl Debug for ChannelRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRecord")
            .field("channel_index", &self.channel_index)
            .field("is_initiator", &self.is_initiator)
            .field("initial_amount_server", &self.initial_amount_server)
            .field("amount_server", &self.amount_server)
            .field("initial_amount_client", &self.initial_amount_client)
            .field("amount_client", &self.amount_client)
            .field("key_server", &DebugSecret(&self.key_server.secret_bytes()))
            .field("key_server_a", &DebugSecret(&self.key_server_a.secret_bytes()))
            .field("master_private_key_server", &DebugSecret(&self.master_private_key_server))
            .field("anchor_secret_server", &DebugSecret(&self.anchor_secret_server))
            .field("anchor_secret_hash_server", &DebugBytes(&self.anchor_secret_hash_server))
            .field("anchor_revocation_server", &DebugSecret(&self.anchor_revocation_server))
            .field(
                "anchor_revocation_hash_server",
                &DebugBytes(&self.anchor_revocation_hash_server),
            )
            .field("key_client", &self.key_client)
            .field("key_client_a", &self.key_client_a)
            .field(
                "anchor_secret_hash_client",
                &self.anchor_secret_hash_client.as_ref().map(|h| DebugBytes(h)),
            )
            .field(
                "anchor_revocation_hash_client",
                &self.anchor_revocation_hash_client.as_ref().map(|h| DebugBytes(h)),
            )
            .field("anchor_tx_hash_client", &self.anchor_tx_hash_client)
            .field("anchor_tx_hash_server", &self.anchor_tx_hash_server)
            .field("escape_tx_sig", &self.escape_tx_sig.is_some())
            .field("fast_escape_tx_sig", &self.fast_escape_tx_sig.is_some())
            .field("server_chain_depth", &self.server_chain_depth)
            .field("server_chain_child", &self.server_chain_child)
            .field("is_ready", &self.is_ready)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::derive::{IndexedKeyDerive, KeyDerive};
    use test_log::test;

    fn record(index: u64) -> ChannelRecord {
        let secrets = IndexedKeyDerive::new().channel_keys(&[3u8; 32], index).unwrap();
        ChannelRecord::new(secrets, index, true, 100_000, 100_000)
    }

    #[test]
    fn channel_id_is_symmetric() {
        let a = Txid::from_byte_array([1u8; 32]);
        let b = Txid::from_byte_array([2u8; 32]);
        assert_eq!(ChannelId::from_funding_txids(&a, &b), ChannelId::from_funding_txids(&b, &a));
        assert_ne!(ChannelId::from_funding_txids(&a, &a), ChannelId::from_funding_txids(&a, &b));
    }

    #[test]
    fn new_record_defaults() {
        let r = record(0);
        assert_eq!(r.server_chain_depth, 1000);
        assert_eq!(r.server_chain_child, 0);
        assert!(!r.is_ready);
        assert!(r.key_client.is_none());
        assert!(r.escape_tx_sig.is_none());
        assert!(r.channel_id().is_none());
        assert_eq!(r.total_amount(), 200_000);
    }

    #[test]
    fn escape_params_require_remote_material() {
        let secp = Secp256k1::new();
        let mut local = record(0);
        let remote = record(1);
        assert!(local.holder_escape_params(&secp).is_err());
        assert!(local.counterparty_escape_params(&secp).is_err());

        local.set_remote_material(
            remote.pubkey_server(&secp),
            remote.pubkey_server_a(&secp),
            remote.anchor_secret_hash_server,
            remote.anchor_revocation_hash_server,
        );
        // funding txids still missing
        assert!(local.holder_escape_params(&secp).is_err());
        local.anchor_tx_hash_server = Some(Txid::from_byte_array([4u8; 32]));
        local.anchor_tx_hash_client = Some(Txid::from_byte_array([5u8; 32]));

        let holder = local.holder_escape_params(&secp).unwrap();
        assert_eq!(holder.owner_key, local.pubkey_server(&secp));
        assert_eq!(holder.counterparty_key_a, remote.pubkey_server_a(&secp));
        let cp = local.counterparty_escape_params(&secp).unwrap();
        assert_eq!(cp.owner_key, remote.pubkey_server(&secp));
        assert_eq!(cp.revocation_hash, remote.anchor_revocation_hash_server);
        assert!(local.channel_id().is_some());
    }

    #[test]
    fn debug_redacts_secrets() {
        let r = record(0);
        let dbg = format!("{:?}", r);
        assert!(!dbg.contains(&hex::encode(r.anchor_revocation_server)));
        assert!(dbg.contains(&hex::encode(r.anchor_revocation_hash_server)));
    }

    #[test]
    fn serde_json_roundtrip() {
        let r = record(2);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains(&hex::encode(r.anchor_secret_hash_server)));
        let back: ChannelRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key_server, r.key_server);
        assert_eq!(back.anchor_revocation_server, r.anchor_revocation_server);
        assert_eq!(back.channel_index, 2);
    }
}
