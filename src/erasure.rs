// Reed-Solomon (k, m) erasure coding over fixed-length shards.

use crate::error::{DfsError, DfsResult};
use reed_solomon_erasure::galois_8::ReedSolomon;

pub struct ErasureEngine {
    k: usize,
    m: usize,
    rs: ReedSolomon,
}

impl ErasureEngine {
    pub fn new(k: usize, m: usize) -> DfsResult<Self> {
        let rs = ReedSolomon::new(k, m)
            .map_err(|e| DfsError::InvalidShards(format!("could not build encoder: {:?}", e)))?;
        Ok(ErasureEngine { k, m, rs })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn shard_len(&self, file_size: u64) -> usize {
        (file_size as usize).div_ceil(self.k)
    }

    /// Splits plaintext into k zero-padded data shards and computes m parity shards.
    pub fn encode(&self, plaintext: &[u8]) -> DfsResult<Vec<Vec<u8>>> {
        let shard_len = self.shard_len(plaintext.len() as u64).max(1);
        let mut shards: Vec<Vec<u8>> = Vec::with_capacity(self.k + self.m);
        for i in 0..self.k {
            let start = i * shard_len;
            let mut shard = vec![0u8; shard_len];
            if start < plaintext.len() {
                let end = (start + shard_len).min(plaintext.len());
                shard[..end - start].copy_from_slice(&plaintext[start..end]);
            }
            shards.push(shard);
        }
        for _ in 0..self.m {
            shards.push(vec![0u8; shard_len]);
        }
        self.rs
            .encode(&mut shards)
            .map_err(|e| DfsError::InvalidShards(format!("encode failed: {:?}", e)))?;
        Ok(shards)
    }

    /// Reconstructs missing shards given `Option<Vec<u8>>` slots (None = absent), requiring
    /// at least k present. Returns the full k+m shard set with all data filled in.
    pub fn reconstruct(&self, mut shards: Vec<Option<Vec<u8>>>) -> DfsResult<Vec<Vec<u8>>> {
        if shards.len() != self.k + self.m {
            return Err(DfsError::InvalidShards(format!(
                "expected {} shards, got {}",
                self.k + self.m,
                shards.len()
            )));
        }
        let present = shards.iter().filter(|s| s.is_some()).count();
        if present < self.k {
            return Err(DfsError::Unrecoverable(format!(
                "only {} of {} required shards present",
                present, self.k
            )));
        }
        let lengths: Vec<usize> = shards.iter().flatten().map(|s| s.len()).collect();
        if lengths.iter().any(|&l| l != lengths[0]) {
            return Err(DfsError::InvalidShards("shard length mismatch".into()));
        }

        self.rs
            .reconstruct(&mut shards)
            .map_err(|e| DfsError::Unrecoverable(format!("reconstruct failed: {:?}", e)))?;
        Ok(shards.into_iter().map(|s| s.unwrap()).collect())
    }

    /// Concatenates data shards in index order and trims to the recorded file size.
    pub fn assemble(&self, shards: &[Vec<u8>], file_size: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(file_size as usize);
        for shard in shards.iter().take(self.k) {
            out.extend_from_slice(shard);
        }
        out.truncate(file_size as usize);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_reconstruct_with_two_missing_recovers_original() {
        let engine = ErasureEngine::new(4, 2).unwrap();
        let data = vec![7u8; 10 * 1024];
        let shards = engine.encode(&data).unwrap();

        let mut with_gaps: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        with_gaps[1] = None;
        with_gaps[4] = None;

        let reconstructed = engine.reconstruct(with_gaps).unwrap();
        let assembled = engine.assemble(&reconstructed, data.len() as u64);
        assert_eq!(assembled, data);
    }

    #[test]
    fn fewer_than_k_shards_is_unrecoverable() {
        let engine = ErasureEngine::new(4, 2).unwrap();
        let data = vec![1u8; 100];
        let shards = engine.encode(&data).unwrap();
        let mut with_gaps: Vec<Option<Vec<u8>>> = shards.into_iter().map(Some).collect();
        with_gaps[0] = None;
        with_gaps[1] = None;
        with_gaps[2] = None;
        match engine.reconstruct(with_gaps) {
            Err(DfsError::Unrecoverable(_)) => {}
            other => panic!("expected Unrecoverable, got {:?}", other),
        }
    }

    #[test]
    fn shard_length_mismatch_is_rejected() {
        let engine = ErasureEngine::new(4, 2).unwrap();
        let shards: Vec<Option<Vec<u8>>> = vec![
            Some(vec![0u8; 10]),
            Some(vec![0u8; 12]),
            Some(vec![0u8; 10]),
            Some(vec![0u8; 10]),
            None,
            None,
        ];
        match engine.reconstruct(shards) {
            Err(DfsError::InvalidShards(_)) => {}
            other => panic!("expected InvalidShards, got {:?}", other),
        }
    }
}
