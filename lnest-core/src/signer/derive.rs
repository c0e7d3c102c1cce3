use bitcoin::secp256k1::{self, PublicKey, Secp256k1, SecretKey};

use crate::util::crypto_utils::{
    hash_at_index, hkdf_sha256, secret_key_from_hash, sha256_commitment,
};

// purpose indices applied to the per-channel seed
const ESCAPE_KEY_INDEX: u32 = 2;
const FAST_ESCAPE_KEY_INDEX: u32 = 4;
const MASTER_INDEX: u32 = 6;
const FAST_ESCAPE_SECRET_INDEX: u32 = 8;
const REVOCATION_SECRET_INDEX: u32 = 10;

/// The local key and secret material of one channel
#[derive(Clone, PartialEq)]
pub struct ChannelSecrets {
    /// Escape key
    pub key_server: SecretKey,
    /// Fast-escape key
    pub key_server_a: SecretKey,
    /// Per-channel master key material
    pub master_private_key_server: [u8; 32],
    /// Fast-escape secret
    pub anchor_secret_server: [u8; 32],
    /// SHA256 of the fast-escape secret
    pub anchor_secret_hash_server: [u8; 32],
    /// Revocation secret
    pub anchor_revocation_server: [u8; 32],
    /// SHA256 of the revocation secret
    pub anchor_revocation_hash_server: [u8; 32],
}

impl core::fmt::Debug for ChannelSecrets {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use crate::util::debug_utils::{DebugBytes, DebugSecret};
        f.debug_struct("ChannelSecrets")
            .field("key_server", &DebugSecret(&self.key_server.secret_bytes()))
            .field("key_server_a", &DebugSecret(&self.key_server_a.secret_bytes()))
            .field("anchor_secret_hash_server", &DebugBytes(&self.anchor_secret_hash_server))
            .field(
                "anchor_revocation_hash_server",
                &DebugBytes(&self.anchor_revocation_hash_server),
            )
            .finish_non_exhaustive()
    }
}

/// Derive keys for nodes and channels
pub trait KeyDerive {
    /// Hash the seed at a purpose index
    fn hash_at(&self, seed: &[u8], index: u32) -> [u8; 32] {
        hash_at_index(seed, index)
    }

    /// A per-channel seed, so that channels of the same node never share keys
    fn channel_seed(&self, seed: &[u8], channel_index: u64) -> [u8; 32] {
        hkdf_sha256(seed, "channel seed".as_bytes(), &channel_index.to_be_bytes())
    }

    /// Derive node key
    fn node_keys(
        &self,
        seed: &[u8],
        secp_ctx: &Secp256k1<secp256k1::All>,
    ) -> Result<(PublicKey, SecretKey), secp256k1::Error> {
        let node_private_bytes = hkdf_sha256(seed, "nodeid".as_bytes(), &[]);
        let node_secret_key = secret_key_from_hash(&node_private_bytes)?;
        Ok((PublicKey::from_secret_key(secp_ctx, &node_secret_key), node_secret_key))
    }

    /// Derive the keys and secrets of a channel
    fn channel_keys(
        &self,
        seed: &[u8],
        channel_index: u64,
    ) -> Result<ChannelSecrets, secp256k1::Error>;
}

/// Derivation by hashing a per-channel seed at fixed purpose indices
#[derive(Clone, Debug, Default)]
pub struct IndexedKeyDerive {}

impl IndexedKeyDerive {
    /// Create the deriver
    pub fn new() -> Self {
        Self {}
    }
}

impl KeyDerive for IndexedKeyDerive {
    fn channel_keys(
        &self,
        seed: &[u8],
        channel_index: u64,
    ) -> Result<ChannelSecrets, secp256k1::Error> {
        let channel_seed = self.channel_seed(seed, channel_index);
        let key_server = secret_key_from_hash(&self.hash_at(&channel_seed, ESCAPE_KEY_INDEX))?;
        let key_server_a =
            secret_key_from_hash(&self.hash_at(&channel_seed, FAST_ESCAPE_KEY_INDEX))?;
        let anchor_secret_server =
            sha256_commitment(&self.hash_at(&channel_seed, FAST_ESCAPE_SECRET_INDEX));
        let anchor_revocation_server =
            sha256_commitment(&self.hash_at(&channel_seed, REVOCATION_SECRET_INDEX));
        Ok(ChannelSecrets {
            key_server,
            key_server_a,
            master_private_key_server: self.hash_at(&channel_seed, MASTER_INDEX),
            anchor_secret_hash_server: sha256_commitment(&anchor_secret_server),
            anchor_secret_server,
            anchor_revocation_hash_server: sha256_commitment(&anchor_revocation_server),
            anchor_revocation_server,
        })
    }
}
