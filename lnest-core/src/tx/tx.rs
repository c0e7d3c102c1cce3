use crate::prelude::*;

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::PublicKey;
use bitcoin::secp256k1::{self, ecdsa::Signature, Secp256k1, SecretKey};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

use crate::tx::script::{
    get_escape_redeemscript, get_fast_escape_redeemscript, make_funding_redeemscript,
};
use crate::util::crypto_utils;

/// The funding output is always the first output of a funding transaction
pub const FUNDING_OUTPUT_INDEX: u32 = 0;

/// Everything needed to build and sign the escape transactions of one party
/// (the "owner") spending the owner's funding output.
#[derive(Clone, Debug, PartialEq)]
pub struct EscapeTxParams {
    /// The owner's funding transaction
    pub funding_txid: Txid,
    /// The owner's committed amount, which is the whole funding output
    pub amount: Amount,
    /// The owner's escape key
    pub owner_key: PublicKey,
    /// The owner's fast-escape key
    pub owner_key_a: PublicKey,
    /// The counterparty's escape key
    pub counterparty_key: PublicKey,
    /// The counterparty's fast-escape key, second key of the funding multisig
    pub counterparty_key_a: PublicKey,
    /// The owner's revocation hash
    pub revocation_hash: [u8; 32],
    /// The owner's fast-escape secret hash
    pub secret_hash: [u8; 32],
}

impl EscapeTxParams {
    /// The witness script of the funding output spent by both escape transactions
    pub fn funding_redeemscript(&self) -> ScriptBuf {
        make_funding_redeemscript(&self.owner_key, &self.counterparty_key_a)
    }

    /// The script pubkey of the funding output
    pub fn funding_script_pubkey(&self) -> ScriptBuf {
        ScriptBuf::new_p2wsh(&self.funding_redeemscript().wscript_hash())
    }

    /// The witness script of the escape output
    pub fn escape_redeemscript(&self) -> ScriptBuf {
        get_escape_redeemscript(&self.revocation_hash, &self.counterparty_key, &self.owner_key)
    }

    /// The witness script of the fast-escape output
    pub fn fast_escape_redeemscript(&self) -> ScriptBuf {
        get_fast_escape_redeemscript(&self.secret_hash, &self.counterparty_key, &self.owner_key_a)
    }

    /// Build the owner's escape transaction
    pub fn build_escape_tx(&self) -> Transaction {
        build_spend_tx(self.funding_txid, self.amount, &self.escape_redeemscript())
    }

    /// Build the owner's fast-escape transaction
    pub fn build_fast_escape_tx(&self) -> Transaction {
        build_spend_tx(self.funding_txid, self.amount, &self.fast_escape_redeemscript())
    }

    /// Sign a transaction spending the owner's funding output
    pub fn sign(
        &self,
        secp_ctx: &Secp256k1<secp256k1::All>,
        tx: &Transaction,
        key: &SecretKey,
    ) -> Option<Signature> {
        crypto_utils::sign_escape(secp_ctx, tx, 0, &self.funding_redeemscript(), self.amount, key)
    }

    /// Verify bitcoin-encoded signature bytes over a transaction spending the
    /// owner's funding output, against the counterparty's fast-escape key.
    pub fn verify(
        &self,
        secp_ctx: &Secp256k1<secp256k1::All>,
        tx: &Transaction,
        sigvec: &[u8],
    ) -> Option<Signature> {
        crypto_utils::verify_escape_bytes(
            secp_ctx,
            tx,
            0,
            &self.funding_redeemscript(),
            self.amount,
            sigvec,
            &self.counterparty_key_a,
        )
    }
}

fn build_spend_tx(funding_txid: Txid, amount: Amount, redeemscript: &ScriptBuf) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint { txid: funding_txid, vout: FUNDING_OUTPUT_INDEX },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        // no fee
        output: vec![TxOut {
            value: amount,
            script_pubkey: ScriptBuf::new_p2wsh(&redeemscript.wscript_hash()),
        }],
    }
}

/// Check that a funding transaction carries the expected output at the funding index
pub fn funding_output_matches(tx: &Transaction, script_pubkey: &ScriptBuf, amount: Amount) -> bool {
    tx.output
        .get(FUNDING_OUTPUT_INDEX as usize)
        .map(|o| o.value == amount && &o.script_pubkey == script_pubkey)
        .unwrap_or(false)
}

/// The txid as bytes in internal order, used for ordering and hashing
pub fn txid_bytes(txid: &Txid) -> [u8; 32] {
    txid.to_byte_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::crypto_utils::signature_to_bitcoin_vec;

    fn key(b: u8) -> SecretKey {
        SecretKey::from_slice(&[b; 32]).unwrap()
    }

    fn params(secp: &Secp256k1<secp256k1::All>) -> EscapeTxParams {
        EscapeTxParams {
            funding_txid: Txid::from_byte_array([5u8; 32]),
            amount: Amount::from_sat(100_000),
            owner_key: PublicKey::from_secret_key(secp, &key(1)),
            owner_key_a: PublicKey::from_secret_key(secp, &key(2)),
            counterparty_key: PublicKey::from_secret_key(secp, &key(3)),
            counterparty_key_a: PublicKey::from_secret_key(secp, &key(4)),
            revocation_hash: [6u8; 32],
            secret_hash: [7u8; 32],
        }
    }

    #[test]
    fn escape_tx_shape() {
        let secp = Secp256k1::new();
        let p = params(&secp);
        for tx in [p.build_escape_tx(), p.build_fast_escape_tx()] {
            assert_eq!(tx.version, Version::TWO);
            assert_eq!(tx.lock_time, LockTime::ZERO);
            assert_eq!(tx.input.len(), 1);
            assert_eq!(tx.input[0].previous_output, OutPoint { txid: p.funding_txid, vout: 0 });
            assert_eq!(tx.input[0].sequence, Sequence::MAX);
            assert_eq!(tx.output.len(), 1);
            assert_eq!(tx.output[0].value, p.amount);
            assert!(tx.output[0].script_pubkey.is_p2wsh());
        }
        assert_ne!(p.build_escape_tx(), p.build_fast_escape_tx());
    }

    #[test]
    fn counterparty_signature_verifies() {
        let secp = Secp256k1::new();
        let p = params(&secp);
        let tx = p.build_escape_tx();
        // the counterparty signs with its fast-escape key
        let sig = p.sign(&secp, &tx, &key(4)).unwrap();
        let sigvec = signature_to_bitcoin_vec(sig);
        assert_eq!(p.verify(&secp, &tx, &sigvec), Some(sig));

        // a signature over the other transaction does not verify
        assert!(p.verify(&secp, &p.build_fast_escape_tx(), &sigvec).is_none());
        // nor does a signature with the wrong key
        let wrong = signature_to_bitcoin_vec(p.sign(&secp, &tx, &key(3)).unwrap());
        assert!(p.verify(&secp, &tx, &wrong).is_none());
    }

    #[test]
    fn funding_output_check() {
        let secp = Secp256k1::new();
        let p = params(&secp);
        let spk = p.funding_script_pubkey();
        let mut tx = build_spend_tx(p.funding_txid, p.amount, &p.funding_redeemscript());
        assert!(funding_output_matches(&tx, &spk, p.amount));
        assert!(!funding_output_matches(&tx, &spk, Amount::from_sat(1)));
        tx.output.clear();
        assert!(!funding_output_matches(&tx, &spk, p.amount));
    }
}
