use crate::prelude::*;
use bitcoin::hashes::sha256::Hash as BitcoinSha256;
use bitcoin::hashes::{Hash, HashEngine, Hmac, HmacEngine};
use bitcoin::secp256k1::{self, ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Amount, Script, Transaction};

fn hkdf_extract_expand(salt: &[u8], secret: &[u8], info: &[u8], output: &mut [u8]) {
    let mut hmac = HmacEngine::<BitcoinSha256>::new(salt);
    hmac.input(secret);
    let prk = Hmac::from_engine(hmac).to_byte_array();

    let mut t = [0; 32];
    let mut n: u8 = 0;

    for chunk in output.chunks_mut(32) {
        let mut hmac = HmacEngine::<BitcoinSha256>::new(&prk[..]);
        // callers never ask for more than a handful of blocks
        n = n.wrapping_add(1);
        if n != 1 {
            hmac.input(&t);
        }
        hmac.input(&info);
        hmac.input(&[n]);
        t = Hmac::from_engine(hmac).to_byte_array();
        chunk.copy_from_slice(&t[..chunk.len()]);
    }
}

/// derive a secret from another secret using HKDF-SHA256
pub fn hkdf_sha256(secret: &[u8], info: &[u8], salt: &[u8]) -> [u8; 32] {
    let mut result = [0u8; 32];
    hkdf_extract_expand(salt, secret, info, &mut result);
    result
}

/// SHA256 of a 32 byte value, used for hash commitments
pub fn sha256_commitment(secret: &[u8; 32]) -> [u8; 32] {
    BitcoinSha256::hash(secret).to_byte_array()
}

/// Hash a seed at a numbered position.
///
/// Distinct indices give unrelated outputs; the output is suitable both as
/// a secret key and as a seed for further hashing.
pub fn hash_at_index(seed: &[u8], index: u32) -> [u8; 32] {
    let mut sha = BitcoinSha256::engine();
    sha.input(seed);
    sha.input(&index.to_be_bytes());
    BitcoinSha256::from_engine(sha).to_byte_array()
}

/// Convert a [Signature] to Bitcoin signature bytes, with SIGHASH_ALL
pub fn signature_to_bitcoin_vec(sig: Signature) -> Vec<u8> {
    let mut sigvec = sig.serialize_der().to_vec();
    sigvec.push(EcdsaSighashType::All as u8);
    sigvec
}

/// Convert a Bitcoin signature bytes, with the specified EcdsaSighashType, to [Signature]
pub fn bitcoin_vec_to_signature(
    sigvec: &[u8],
    sighash_type: EcdsaSighashType,
) -> Result<Signature, secp256k1::Error> {
    let len = sigvec.len();
    if len == 0 {
        return Err(secp256k1::Error::InvalidSignature);
    }
    let mut sv = sigvec.to_vec();
    let mode = sv.pop().ok_or_else(|| secp256k1::Error::InvalidSignature)?;
    if mode != sighash_type as u8 {
        return Err(secp256k1::Error::InvalidSignature);
    }
    Ok(Signature::from_der(&sv[..])?)
}

/// The segwit v0 SIGHASH_ALL digest of an input spending a P2WSH output.
///
/// Returns None if the input index is out of range.
pub fn escape_sighash(
    tx: &Transaction,
    input: usize,
    witness_script: &Script,
    value: Amount,
) -> Option<Message> {
    let sighash = SighashCache::new(tx)
        .p2wsh_signature_hash(input, witness_script, value, EcdsaSighashType::All)
        .ok()?;
    Some(Message::from_digest(sighash.to_byte_array()))
}

/// Sign an input of a transaction spending a P2WSH output, with SIGHASH_ALL.
///
/// Signing is deterministic (RFC6979), the same transaction and key always
/// produce the same signature.
pub fn sign_escape(
    secp_ctx: &Secp256k1<secp256k1::All>,
    tx: &Transaction,
    input: usize,
    witness_script: &Script,
    value: Amount,
    key: &SecretKey,
) -> Option<Signature> {
    let sighash = escape_sighash(tx, input, witness_script, value)?;
    Some(secp_ctx.sign_ecdsa(&sighash, key))
}

/// Verify a signature over an input of a transaction spending a P2WSH output.
///
/// Never fails loudly - any malformed input is simply an invalid signature.
pub fn verify_escape(
    secp_ctx: &Secp256k1<secp256k1::All>,
    tx: &Transaction,
    input: usize,
    witness_script: &Script,
    value: Amount,
    sig: &Signature,
    pubkey: &PublicKey,
) -> bool {
    match escape_sighash(tx, input, witness_script, value) {
        Some(sighash) => secp_ctx.verify_ecdsa(&sighash, sig, pubkey).is_ok(),
        None => false,
    }
}

/// Verify bitcoin-encoded signature bytes, see [verify_escape].
pub fn verify_escape_bytes(
    secp_ctx: &Secp256k1<secp256k1::All>,
    tx: &Transaction,
    input: usize,
    witness_script: &Script,
    value: Amount,
    sigvec: &[u8],
    pubkey: &PublicKey,
) -> Option<Signature> {
    let sig = bitcoin_vec_to_signature(sigvec, EcdsaSighashType::All).ok()?;
    if verify_escape(secp_ctx, tx, input, witness_script, value, &sig, pubkey) {
        Some(sig)
    } else {
        None
    }
}

/// Convert 32 bytes to a secret key.
///
/// The chance of a hash output being outside the curve order is negligible,
/// but it is surfaced as an error rather than a panic.
pub fn secret_key_from_hash(hash: &[u8; 32]) -> Result<SecretKey, secp256k1::Error> {
    SecretKey::from_slice(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Txid, Witness};

    fn test_tx() -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint { txid: Txid::all_zeros(), vout: 0 },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut { value: Amount::from_sat(1000), script_pubkey: ScriptBuf::new() }],
        }
    }

    #[test]
    fn test_hkdf() {
        let secret = [1u8];
        let info = [2u8];
        let salt = [3u8];
        let mut output = [0u8; 32 * 6];
        hkdf_extract_expand(&salt, &secret, &info, &mut output);
        assert_eq!(hex::encode(output), "13a04658302cc5173a8077f2f296662a7a3ddb2359be92770b13e0b9e63a23d0efbbb13e74af4687137801e1628d1d1876d251b31d1321383568a9387da7c0baa7dee83ba374bba3774ef01140e4c4293791a512e536764bf4405aea511be32d5fd71a0b7a7ef3638312e476eb323fbac5f3d549ccf0fe0eabb38fe7bc16ad01db2288e57de45eabecd561ede4dc89164099ed7f0b0db5250e2b377e2aa84f520838612dccbde870f7b06a1e03f3cd79d30da717c55e15442a0b4dd02aafcd86");
        assert_eq!(
            hex::encode(hkdf_sha256(&secret, &info, &salt)),
            "13a04658302cc5173a8077f2f296662a7a3ddb2359be92770b13e0b9e63a23d0"
        );
    }

    #[test]
    fn test_hash_at_index() {
        let seed = [7u8; 32];
        assert_eq!(hash_at_index(&seed, 2), hash_at_index(&seed, 2));
        assert_ne!(hash_at_index(&seed, 2), hash_at_index(&seed, 4));
        assert_ne!(hash_at_index(&seed, 2), hash_at_index(&[8u8; 32], 2));
        let secret = hash_at_index(&seed, 8);
        assert_eq!(sha256_commitment(&secret), BitcoinSha256::hash(&secret).to_byte_array());
        assert_ne!(sha256_commitment(&secret), secret);
    }

    #[test]
    fn test_bitcoin_vec_to_signature() {
        let sighash_type = EcdsaSighashType::All;
        let sigvec: Vec<u8> = vec![];

        let result = bitcoin_vec_to_signature(&sigvec, sighash_type);

        assert_eq!(result, Err(secp256k1::Error::InvalidSignature));

        let mut sigvec = hex::decode(
            "304402202e1f64d831e89e2b4a0dc8565cb2d0a4d6061a89f9b48f2c26d5ac0b3b9a0bb102200c8d396f8b2e9c6c623bebc015c47f1f41e8824fabe7cb028f174a0e5df3c0a0"
        ).unwrap();

        sigvec.push(1 as u8);

        let result = bitcoin_vec_to_signature(&sigvec, sighash_type).unwrap();

        // wrong sighash type
        assert!(bitcoin_vec_to_signature(&sigvec, EcdsaSighashType::None).is_err());

        sigvec.pop();

        let parsed_signature = Signature::from_der(&sigvec).expect("valid DER signature");

        assert_eq!(result, parsed_signature);
        assert_eq!(signature_to_bitcoin_vec(parsed_signature).last(), Some(&1u8));
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let secp = Secp256k1::new();
        let key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let pubkey = PublicKey::from_secret_key(&secp, &key);
        let script = ScriptBuf::from_bytes(vec![0x51]);
        let value = Amount::from_sat(5000);
        let tx = test_tx();

        let sig = sign_escape(&secp, &tx, 0, &script, value, &key).unwrap();
        assert!(verify_escape(&secp, &tx, 0, &script, value, &sig, &pubkey));
        // deterministic nonce
        assert_eq!(sign_escape(&secp, &tx, 0, &script, value, &key).unwrap(), sig);

        // any change to the digest inputs invalidates
        assert!(!verify_escape(&secp, &tx, 0, &script, Amount::from_sat(5001), &sig, &pubkey));
        let mut tx2 = tx.clone();
        tx2.output[0].value = Amount::from_sat(999);
        assert!(!verify_escape(&secp, &tx2, 0, &script, value, &sig, &pubkey));

        // out of range input is invalid rather than a panic
        assert!(sign_escape(&secp, &tx, 1, &script, value, &key).is_none());
        assert!(!verify_escape(&secp, &tx, 1, &script, value, &sig, &pubkey));

        // wrong key
        let other = PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[0x22; 32]).unwrap());
        assert!(!verify_escape(&secp, &tx, 0, &script, value, &sig, &other));
    }

    #[test]
    fn test_verify_mutated_signature_bytes() {
        let secp = Secp256k1::new();
        let key = SecretKey::from_slice(&[0x33; 32]).unwrap();
        let pubkey = PublicKey::from_secret_key(&secp, &key);
        let script = ScriptBuf::from_bytes(vec![0x51]);
        let value = Amount::from_sat(5000);
        let tx = test_tx();
        let sigvec =
            signature_to_bitcoin_vec(sign_escape(&secp, &tx, 0, &script, value, &key).unwrap());
        assert!(verify_escape_bytes(&secp, &tx, 0, &script, value, &sigvec, &pubkey).is_some());

        for ndx in 0..sigvec.len() {
            let mut mutated = sigvec.clone();
            mutated[ndx] ^= 0x01;
            assert!(
                verify_escape_bytes(&secp, &tx, 0, &script, value, &mutated, &pubkey).is_none(),
                "mutation at byte {} accepted",
                ndx
            );
        }
        assert!(verify_escape_bytes(&secp, &tx, 0, &script, value, &[], &pubkey).is_none());
    }
}
