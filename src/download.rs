// Download pipeline: Requesting -> Collecting -> Decoding -> Complete/Paused/Failed.

use crate::crypto::{self, AesCtrCipher, BlockCipher};
use crate::erasure::ErasureEngine;
use crate::error::{DfsError, DfsResult};
use crate::pool::TaskPool;
use crate::script;
use crate::segment::SliceContainer;
use std::io::Cursor;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadState {
    Requesting,
    Collecting,
    Decoding,
    Complete,
    Paused,
    Failed,
}

pub struct DownloadPipeline {
    pub pool: Arc<TaskPool>,
    pub erasure: ErasureEngine,
}

impl DownloadPipeline {
    pub fn new(pool: Arc<TaskPool>, erasure: ErasureEngine) -> Self {
        DownloadPipeline { pool, erasure }
    }

    /// Returns the piece indices still to be fetched, data pieces first. A paused task
    /// yields no work so the caller schedules nothing new until it's resumed.
    pub async fn next_pieces_to_request(&self, file_id: &str) -> DfsResult<Vec<u32>> {
        let task = self.pool.download(file_id).await?;
        let t = task.read().await;
        if t.is_paused() {
            return Ok(Vec::new());
        }
        Ok(t.incomplete_pieces())
    }

    /// Collecting: verifies a received slice container's CRC (via the segment codec),
    /// P2PK signature, and plaintext hash against the slice table; marks the piece
    /// complete on success and reverts on failure rather than corrupting progress.
    pub async fn receive_slice(
        &self,
        file_id: &str,
        index: u32,
        owner_pubkey_hash_table_digest: &[u8; 32],
        container_bytes: Vec<u8>,
    ) -> DfsResult<bool> {
        let cursor = Cursor::new(container_bytes);
        let mut container = SliceContainer::open(cursor, 64)?;

        let slice_hash_seg = container.read("SLICEHASH")?;
        let mut slice_hash = [0u8; 32];
        if slice_hash_seg.len() != 32 {
            return Err(DfsError::FormatError("SLICEHASH must be 32 bytes".into()));
        }
        slice_hash.copy_from_slice(&slice_hash_seg);

        let content = container.read("CONTENT")?;
        if crypto::sha256(&content) != slice_hash {
            return Err(DfsError::CorruptSegment("CONTENT hash mismatch".into()));
        }

        let p2pk = container.read("P2PKSCRIPT")?;
        let signature = container.read("SIGNATURE")?;
        let is_parity_seg = container.read("ISPARITY").unwrap_or_default();
        let is_parity = is_parity_seg.first().map(|b| *b == 1).unwrap_or(false);
        let mode = if is_parity {
            script::StorageMode::Parity
        } else {
            script::StorageMode::Data
        };
        let signature_ok = script::verify_p2pk_signature(
            &p2pk,
            &signature,
            file_id,
            index,
            &slice_hash,
            owner_pubkey_hash_table_digest,
            mode,
        )?;
        if !signature_ok {
            return Err(DfsError::Crypto("P2PK signature verification failed".into()));
        }

        let task = self.pool.download(file_id).await?;
        let mut t = task.write().await;
        let done = t.mark_complete(index);
        drop(t);
        let _ = content; // content is written to the store by the caller, not here
        Ok(done)
    }

    /// Decoding: assembles shards in index order, reconstructs missing data shards via
    /// erasure coding, trims to SIZE, optionally AES-CTR decrypts, and verifies the
    /// overall file hash.
    pub fn decode(
        &self,
        shards: Vec<Option<Vec<u8>>>,
        file_size: u64,
        file_key: Option<(&[u8; 32], &[u8; 16])>,
        expected_file_hash: &[u8; 32],
    ) -> DfsResult<Vec<u8>> {
        let full_shards = self.erasure.reconstruct(shards)?;
        let mut assembled = self.erasure.assemble(&full_shards, file_size);

        if let Some((key, iv)) = file_key {
            let cipher = AesCtrCipher;
            cipher.decrypt(key, iv, &mut assembled);
        }

        if crypto::sha256(&assembled) != *expected_file_hash {
            return Err(DfsError::Crypto(
                "reconstructed file hash does not match recorded hash".into(),
            ));
        }
        Ok(assembled)
    }
}
