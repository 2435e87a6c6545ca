// ECDSA signing (secp256k1) and AES-CTR block cipher primitives, modeled as traits so the
// rest of the engine depends on capabilities rather than a concrete crypto library.

use crate::error::{DfsError, DfsResult};
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

pub trait Signer: Send + Sync {
    fn public_key(&self) -> Vec<u8>;
    fn sign(&self, digest: &[u8; 32]) -> DfsResult<Vec<u8>>;
}

pub trait Verifier {
    fn verify(pubkey: &[u8], digest: &[u8; 32], signature: &[u8]) -> DfsResult<bool>;
}

/// ECDSA signer backed by a secp256k1 keypair.
pub struct Secp256k1Signer {
    secret_key: libsecp256k1::SecretKey,
    public_key: libsecp256k1::PublicKey,
}

impl Secp256k1Signer {
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        let secret_key = libsecp256k1::SecretKey::random(&mut rng);
        let public_key = libsecp256k1::PublicKey::from_secret_key(&secret_key);
        Secp256k1Signer {
            secret_key,
            public_key,
        }
    }

    pub fn from_secret_bytes(bytes: &[u8; 32]) -> DfsResult<Self> {
        let secret_key = libsecp256k1::SecretKey::parse(bytes)
            .map_err(|e| DfsError::Crypto(format!("invalid secret key: {:?}", e)))?;
        let public_key = libsecp256k1::PublicKey::from_secret_key(&secret_key);
        Ok(Secp256k1Signer {
            secret_key,
            public_key,
        })
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret_key.serialize()
    }
}

impl Signer for Secp256k1Signer {
    fn public_key(&self) -> Vec<u8> {
        self.public_key.serialize_compressed().to_vec()
    }

    fn sign(&self, digest: &[u8; 32]) -> DfsResult<Vec<u8>> {
        let message = libsecp256k1::Message::parse(digest);
        let (signature, _recovery_id) = libsecp256k1::sign(&message, &self.secret_key);
        Ok(signature.serialize().to_vec())
    }
}

pub struct Secp256k1Verifier;

impl Verifier for Secp256k1Verifier {
    fn verify(pubkey: &[u8], digest: &[u8; 32], signature: &[u8]) -> DfsResult<bool> {
        let public_key = libsecp256k1::PublicKey::parse_slice(pubkey, None)
            .map_err(|e| DfsError::Crypto(format!("invalid public key: {:?}", e)))?;
        let sig = libsecp256k1::Signature::parse_standard_slice(signature)
            .map_err(|e| DfsError::Crypto(format!("invalid signature: {:?}", e)))?;
        let message = libsecp256k1::Message::parse(digest);
        Ok(libsecp256k1::verify(&message, &sig, &public_key))
    }
}

/// hash160(data) = RIPEMD160(SHA256(data)), the pubkey-hash used by P2PKH scripts.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

pub trait BlockCipher: Send + Sync {
    fn encrypt(&self, key: &[u8; 32], iv: &[u8; 16], data: &mut [u8]);
    fn decrypt(&self, key: &[u8; 32], iv: &[u8; 16], data: &mut [u8]);
}

/// AES-256-CTR: encryption and decryption are the same keystream XOR.
pub struct AesCtrCipher;

impl BlockCipher for AesCtrCipher {
    fn encrypt(&self, key: &[u8; 32], iv: &[u8; 16], data: &mut [u8]) {
        let mut cipher = Aes256Ctr::new(key.into(), iv.into());
        cipher.apply_keystream(data);
    }

    fn decrypt(&self, key: &[u8; 32], iv: &[u8; 16], data: &mut [u8]) {
        let mut cipher = Aes256Ctr::new(key.into(), iv.into());
        cipher.apply_keystream(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = Secp256k1Signer::generate();
        let digest = sha256(b"hello world");
        let signature = signer.sign(&digest).unwrap();
        assert!(Secp256k1Verifier::verify(&signer.public_key(), &digest, &signature).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let signer = Secp256k1Signer::generate();
        let other = Secp256k1Signer::generate();
        let digest = sha256(b"hello world");
        let signature = signer.sign(&digest).unwrap();
        assert!(!Secp256k1Verifier::verify(&other.public_key(), &digest, &signature).unwrap());
    }

    #[test]
    fn aes_ctr_encrypt_then_decrypt_round_trips() {
        let cipher = AesCtrCipher;
        let key = [7u8; 32];
        let iv = [3u8; 16];
        let mut data = b"some plaintext shard bytes".to_vec();
        let original = data.clone();
        cipher.encrypt(&key, &iv, &mut data);
        assert_ne!(data, original);
        cipher.decrypt(&key, &iv, &mut data);
        assert_eq!(data, original);
    }
}
