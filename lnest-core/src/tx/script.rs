use bitcoin::blockdata::opcodes::all::{
    OP_CHECKMULTISIG, OP_CHECKSIG, OP_ELSE, OP_ENDIF, OP_EQUALVERIFY, OP_IF, OP_PUSHNUM_2,
    OP_SHA256,
};
use bitcoin::blockdata::script::Builder;
use bitcoin::secp256k1::PublicKey;
use bitcoin::ScriptBuf;

/// The 2-of-2 witness script locking a funding (anchor) output.
///
/// Keys are sorted by their compressed serialization, so both parties
/// compute the same script regardless of argument order.
pub fn make_funding_redeemscript(key_a: &PublicKey, key_b: &PublicKey) -> ScriptBuf {
    let a = key_a.serialize();
    let b = key_b.serialize();
    let (first, second) = if a[..] < b[..] { (a, b) } else { (b, a) };
    Builder::new()
        .push_opcode(OP_PUSHNUM_2)
        .push_slice(first)
        .push_slice(second)
        .push_opcode(OP_PUSHNUM_2)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

/// A hash-locked path for the counterparty, or an immediate path for the owner.
///
/// Shared by the escape output (locked to the owner's revocation hash) and
/// the fast-escape output (locked to the owner's fast-escape secret hash).
fn hash_locked_redeemscript(
    lock_hash: &[u8; 32],
    counterparty_key: &PublicKey,
    owner_key: &PublicKey,
) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_IF)
        .push_opcode(OP_SHA256)
        .push_slice(lock_hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_slice(counterparty_key.serialize())
        .push_opcode(OP_ELSE)
        .push_slice(owner_key.serialize())
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// The escape output witness script.
///
/// The owner spends at once with `owner_key`.  Once the owner has revealed
/// the preimage of `revocation_hash`, the counterparty may spend with
/// `counterparty_key`.
pub fn get_escape_redeemscript(
    revocation_hash: &[u8; 32],
    counterparty_key: &PublicKey,
    owner_key: &PublicKey,
) -> ScriptBuf {
    hash_locked_redeemscript(revocation_hash, counterparty_key, owner_key)
}

/// The fast-escape output witness script, as [get_escape_redeemscript] but
/// locked to the owner's fast-escape secret hash and fast-escape key.
pub fn get_fast_escape_redeemscript(
    secret_hash: &[u8; 32],
    counterparty_key: &PublicKey,
    owner_key_a: &PublicKey,
) -> ScriptBuf {
    hash_locked_redeemscript(secret_hash, counterparty_key, owner_key_a)
}
