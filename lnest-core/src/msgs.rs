use bitcoin::secp256k1::PublicKey;
use bitcoin::Txid;
use serde_derive::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as, Bytes, IfIsHumanReadable};

use crate::prelude::*;

/// A message with a numeric type id
pub trait TypedMessage {
    /// The message type id
    const TYPE: u16;
}

/// Opens the handshake, sent by the initiator
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstablishA {
    /// The amount the initiator asks the responder to commit
    pub client_amount: u64,
    /// The amount the initiator commits
    pub server_amount: u64,
    /// Escape public key
    pub pub_key_escape: PublicKey,
    /// Fast-escape public key
    pub pub_key_fast_escape: PublicKey,
    /// Fast-escape secret hash
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub secret_hash_fast_escape: [u8; 32],
    /// Revocation hash
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub revocation_hash: [u8; 32],
}

impl TypedMessage for EstablishA {
    const TYPE: u16 = 1101;
}

/// The responder's keys, commitments, amount and funding transaction
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstablishB {
    /// Escape public key
    pub pub_key_escape: PublicKey,
    /// Fast-escape public key
    pub pub_key_fast_escape: PublicKey,
    /// Fast-escape secret hash
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub secret_hash_fast_escape: [u8; 32],
    /// Revocation hash
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub revocation_hash: [u8; 32],
    /// The amount the responder commits
    pub server_amount: u64,
    /// The responder's funding transaction
    pub anchor_hash: Txid,
}

impl TypedMessage for EstablishB {
    const TYPE: u16 = 1102;
}

/// The initiator's funding transaction and its signatures over the responder's escape transactions
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstablishC {
    /// Funding transaction id
    pub anchor_hash: Txid,
    /// DER signature with sighash byte
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub signature_escape: Vec<u8>,
    /// DER signature with sighash byte
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub signature_fast_escape: Vec<u8>,
}

impl TypedMessage for EstablishC {
    const TYPE: u16 = 1103;
}

/// The responder's signatures over the initiator's escape transactions
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstablishD {
    /// DER signature with sighash byte
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub signature_escape: Vec<u8>,
    /// DER signature with sighash byte
    #[serde_as(as = "IfIsHumanReadable<Hex, Bytes>")]
    pub signature_fast_escape: Vec<u8>,
}

impl TypedMessage for EstablishD {
    const TYPE: u16 = 1104;
}

/// A decoded establishment-layer message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstablishMessage {
    /// Open
    A(EstablishA),
    /// Accept
    B(EstablishB),
    /// Initiator signatures
    C(EstablishC),
    /// Responder signatures
    D(EstablishD),
    /// A message type this handshake does not know, carrying its type id
    Unknown(u16),
}

impl EstablishMessage {
    /// The type id of the message
    pub fn type_id(&self) -> u16 {
        match self {
            EstablishMessage::A(_) => EstablishA::TYPE,
            EstablishMessage::B(_) => EstablishB::TYPE,
            EstablishMessage::C(_) => EstablishC::TYPE,
            EstablishMessage::D(_) => EstablishD::TYPE,
            EstablishMessage::Unknown(t) => *t,
        }
    }

    /// A short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            EstablishMessage::A(_) => "A",
            EstablishMessage::B(_) => "B",
            EstablishMessage::C(_) => "C",
            EstablishMessage::D(_) => "D",
            EstablishMessage::Unknown(_) => "unknown",
        }
    }
}
