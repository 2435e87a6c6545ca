// P2PKH / P2PK ownership scripts and the canonical signed byte tuple.
//
// P2PKH: `DUP HASH160 <pubkey-hash:20> EQUALVERIFY CHECKSIG`
// P2PK:  `<pubkey> CHECKSIG`
//
// Opcodes are represented as single bytes; this is not a general scripting VM, just enough
// structure to build and verify the two fixed shapes the engine uses.

use crate::crypto::{hash160, sha256, Secp256k1Verifier, Verifier};
use crate::error::{DfsError, DfsResult};

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xA9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xAC;

/// Builds a P2PKH script from a raw public key.
pub fn build_p2pkh(pubkey: &[u8]) -> Vec<u8> {
    let hash = hash160(pubkey);
    let mut script = Vec::with_capacity(24);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.extend_from_slice(&hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// Verifies that a P2PKH script embeds the given pubkey-hash.
pub fn verify_p2pkh(script: &[u8], expected_pubkey_hash: &[u8; 20]) -> bool {
    if script.len() != 24 {
        return false;
    }
    if script[0] != OP_DUP || script[1] != OP_HASH160 {
        return false;
    }
    if script[22] != OP_EQUALVERIFY || script[23] != OP_CHECKSIG {
        return false;
    }
    &script[2..22] == expected_pubkey_hash.as_slice()
}

/// Extracts the embedded pubkey-hash from a P2PKH script.
pub fn p2pkh_pubkey_hash(script: &[u8]) -> DfsResult<[u8; 20]> {
    if script.len() != 24 || script[0] != OP_DUP || script[1] != OP_HASH160 {
        return Err(DfsError::FormatError("malformed P2PKH script".into()));
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&script[2..22]);
    Ok(hash)
}

/// Builds a P2PK script from a raw public key.
pub fn build_p2pk(pubkey: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(pubkey.len() + 2);
    script.push(pubkey.len() as u8);
    script.extend_from_slice(pubkey);
    script.push(OP_CHECKSIG);
    script
}

/// Extracts the embedded public key from a P2PK script.
pub fn p2pk_pubkey(script: &[u8]) -> DfsResult<Vec<u8>> {
    if script.len() < 2 {
        return Err(DfsError::FormatError("malformed P2PK script".into()));
    }
    let len = script[0] as usize;
    if script.len() != len + 2 || script[len + 1] != OP_CHECKSIG {
        return Err(DfsError::FormatError("malformed P2PK script".into()));
    }
    Ok(script[1..1 + len].to_vec())
}

/// Storage mode carried in the canonical signed tuple.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Data = 0,
    Parity = 1,
}

/// SHA-256 of the big-endian-encoded, index-sorted slice-hash table: binds a signature to
/// the whole erasure group without embedding the full table in every signature.
pub fn slice_table_digest(table: &std::collections::BTreeMap<u32, [u8; 32]>) -> [u8; 32] {
    let mut buf = Vec::with_capacity(table.len() * 36);
    for (index, hash) in table {
        buf.extend_from_slice(&index.to_be_bytes());
        buf.extend_from_slice(hash);
    }
    sha256(&buf)
}

/// Canonical signed tuple: `file_id || slice_index (u32 BE) || slice_hash || slice_table_digest || mode (u8)`,
/// SHA-256'd to produce the message a P2PK signature covers.
pub fn signed_digest(
    file_id: &str,
    slice_index: u32,
    slice_hash: &[u8; 32],
    slice_table_digest: &[u8; 32],
    mode: StorageMode,
) -> [u8; 32] {
    let mut buf = Vec::with_capacity(file_id.len() + 4 + 32 + 32 + 1);
    buf.extend_from_slice(file_id.as_bytes());
    buf.extend_from_slice(&slice_index.to_be_bytes());
    buf.extend_from_slice(slice_hash);
    buf.extend_from_slice(slice_table_digest);
    buf.push(mode as u8);
    sha256(&buf)
}

/// Verifies a P2PK script's embedded signature against the canonical tuple.
pub fn verify_p2pk_signature(
    p2pk_script: &[u8],
    signature: &[u8],
    file_id: &str,
    slice_index: u32,
    slice_hash: &[u8; 32],
    slice_table_digest: &[u8; 32],
    mode: StorageMode,
) -> DfsResult<bool> {
    let pubkey = p2pk_pubkey(p2pk_script)?;
    let digest = signed_digest(file_id, slice_index, slice_hash, slice_table_digest, mode);
    Secp256k1Verifier::verify(&pubkey, &digest, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Secp256k1Signer, Signer};

    #[test]
    fn p2pkh_verifies_matching_key_and_rejects_others() {
        let signer = Secp256k1Signer::generate();
        let other = Secp256k1Signer::generate();
        let pubkey = signer.public_key();
        let script = build_p2pkh(&pubkey);
        assert!(verify_p2pkh(&script, &hash160(&pubkey)));
        assert!(!verify_p2pkh(&script, &hash160(&other.public_key())));
    }

    #[test]
    fn p2pk_signature_round_trips() {
        let signer = Secp256k1Signer::generate();
        let pubkey = signer.public_key();
        let script = build_p2pk(&pubkey);
        let mut table = std::collections::BTreeMap::new();
        table.insert(0u32, [1u8; 32]);
        table.insert(1u32, [2u8; 32]);
        let digest_table = slice_table_digest(&table);
        let digest = signed_digest("file1", 0, &[1u8; 32], &digest_table, StorageMode::Data);
        let signature = signer.sign(&digest).unwrap();
        assert!(verify_p2pk_signature(
            &script,
            &signature,
            "file1",
            0,
            &[1u8; 32],
            &digest_table,
            StorageMode::Data
        )
        .unwrap());
    }

    #[test]
    fn p2pk_signature_rejects_tampered_index() {
        let signer = Secp256k1Signer::generate();
        let pubkey = signer.public_key();
        let script = build_p2pk(&pubkey);
        let mut table = std::collections::BTreeMap::new();
        table.insert(0u32, [1u8; 32]);
        let digest_table = slice_table_digest(&table);
        let digest = signed_digest("file1", 0, &[1u8; 32], &digest_table, StorageMode::Data);
        let signature = signer.sign(&digest).unwrap();
        assert!(!verify_p2pk_signature(
            &script,
            &signature,
            "file1",
            1,
            &[1u8; 32],
            &digest_table,
            StorageMode::Data
        )
        .unwrap());
    }
}
