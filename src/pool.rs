// Task pool: upload, download, and delete task maps under a pool-level lock, each task
// additionally guarded by its own lock so progress updates don't serialize on the whole pool.

use crate::error::{DfsError, DfsResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Bit-per-slice-index progress tracker. O(1) set/clear/test via byte masks.
#[derive(Debug, Clone, Default)]
pub struct BitSet {
    bits: Vec<u8>,
}

impl BitSet {
    pub fn new(n: usize) -> Self {
        BitSet {
            bits: vec![0u8; n.div_ceil(8)],
        }
    }

    pub fn set(&mut self, index: usize) {
        self.bits[index / 8] |= 1 << (index % 8);
    }

    pub fn clear(&mut self, index: usize) {
        self.bits[index / 8] &= !(1 << (index % 8));
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.bits[index / 8] & (1 << (index % 8)) != 0
    }

    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn reset(&mut self) {
        self.bits.iter_mut().for_each(|b| *b = 0);
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadPieceInfo {
    pub index: u32,
    pub peer_ids: Vec<String>,
}

pub struct UploadTask {
    pub total_pieces: usize,
    pub progress: BitSet,
    pub piece_info: HashMap<String, UploadPieceInfo>, // slice-hash -> info
    pub retry_counts: HashMap<u32, u32>,
    pub paused: bool,
}

impl UploadTask {
    pub fn new(total_pieces: usize) -> Self {
        UploadTask {
            total_pieces,
            progress: BitSet::new(total_pieces),
            piece_info: HashMap::new(),
            retry_counts: HashMap::new(),
            paused: false,
        }
    }

    pub fn update_piece(&mut self, slice_hash: String, info: UploadPieceInfo) {
        self.piece_info.insert(slice_hash, info);
    }

    /// Marks index complete, returns true if this sets the final bit.
    pub fn mark_complete(&mut self, index: u32) -> bool {
        self.progress.set(index as usize);
        self.progress.count() == self.total_pieces
    }

    pub fn is_complete(&self) -> bool {
        self.progress.count() == self.total_pieces
    }

    pub fn incomplete_pieces(&self) -> Vec<u32> {
        (0..self.total_pieces as u32)
            .filter(|&i| !self.progress.is_set(i as usize))
            .collect()
    }

    pub fn increment_retry(&mut self, index: u32) -> u32 {
        let count = self.retry_counts.entry(index).or_insert(0);
        *count += 1;
        *count
    }

    /// Suspends new piece dispatches; pieces already in flight are unaffected.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[derive(Debug, Clone)]
pub struct DownloadPieceInfo {
    pub hash: [u8; 32],
    pub candidate_peers: Vec<String>,
    pub is_parity: bool,
}

pub struct DownloadTask {
    pub file_key: Option<Vec<u8>>,
    pub file_hash: Option<[u8; 32]>,
    pub name: Option<String>,
    pub size: Option<u64>,
    pub total_pieces: usize,
    pub data_pieces: usize,
    pub progress: BitSet,
    pub piece_info: Vec<Option<DownloadPieceInfo>>, // indexed by slice index
    pub paused: bool,
    pub merged: bool,
    pub merge_counter: u32,
    initialized: bool,
}

impl DownloadTask {
    pub fn new(file_key: Option<Vec<u8>>) -> Self {
        DownloadTask {
            file_key,
            file_hash: None,
            name: None,
            size: None,
            total_pieces: 0,
            data_pieces: 0,
            progress: BitSet::new(0),
            piece_info: Vec::new(),
            paused: false,
            merged: false,
            merge_counter: 0,
            initialized: false,
        }
    }

    /// Idempotent: the first call seeds total/data pieces and the piece table; later
    /// calls from other responders only contribute candidate peer-ids.
    #[allow(clippy::too_many_arguments)]
    pub fn update_piece_info(
        &mut self,
        peer_id: &str,
        name: &str,
        size: u64,
        total_pieces: usize,
        data_pieces: usize,
        piece_hashes: &[(u32, [u8; 32], bool)],
        file_key: Option<Vec<u8>>,
    ) {
        if !self.initialized {
            self.name = Some(name.to_string());
            self.size = Some(size);
            self.total_pieces = total_pieces;
            self.data_pieces = data_pieces;
            self.progress = BitSet::new(total_pieces);
            self.piece_info = vec![None; total_pieces];
            if file_key.is_some() {
                self.file_key = file_key;
            }
            self.initialized = true;
        }
        for (index, hash, is_parity) in piece_hashes {
            let entry = self.piece_info[*index as usize].get_or_insert(DownloadPieceInfo {
                hash: *hash,
                candidate_peers: Vec::new(),
                is_parity: *is_parity,
            });
            if !entry.candidate_peers.iter().any(|p| p == peer_id) {
                entry.candidate_peers.push(peer_id.to_string());
            }
        }
    }

    /// Marks an index complete; returns true once at least `data_pieces` bits are set.
    pub fn mark_complete(&mut self, index: u32) -> bool {
        self.progress.set(index as usize);
        self.progress.count() >= self.data_pieces
    }

    pub fn is_complete(&self) -> bool {
        self.progress.count() >= self.data_pieces
    }

    /// Data pieces are requested before parity pieces.
    pub fn incomplete_pieces(&self) -> Vec<u32> {
        let mut data = Vec::new();
        let mut parity = Vec::new();
        for i in 0..self.total_pieces as u32 {
            if self.progress.is_set(i as usize) {
                continue;
            }
            match &self.piece_info[i as usize] {
                Some(info) if info.is_parity => parity.push(i),
                _ => data.push(i),
            }
        }
        data.extend(parity);
        data
    }

    pub fn reset(&mut self) {
        self.progress.reset();
        self.merged = false;
        self.merge_counter = 0;
    }

    pub fn revert_piece(&mut self, index: u32) {
        self.progress.clear(index as usize);
    }

    /// Suspends new piece dispatches; pieces already in flight are unaffected.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeletePieceAcks {
    pub peers: HashMap<String, bool>,
}

pub struct DeleteTask {
    pub pieces: HashMap<String, DeletePieceAcks>, // slice-hash -> per-peer ack state
}

impl DeleteTask {
    pub fn new(slice_hashes: Vec<String>) -> Self {
        let pieces = slice_hashes
            .into_iter()
            .map(|h| (h, DeletePieceAcks::default()))
            .collect();
        DeleteTask { pieces }
    }

    pub fn add(&mut self, slice_hash: &str, peer_id: &str) {
        self.pieces
            .entry(slice_hash.to_string())
            .or_default()
            .peers
            .entry(peer_id.to_string())
            .or_insert(false);
    }

    pub fn ack(&mut self, peer_id: &str, slice_hash: &str) {
        if let Some(piece) = self.pieces.get_mut(slice_hash) {
            piece.peers.insert(peer_id.to_string(), true);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pieces
            .values()
            .all(|p| !p.peers.is_empty() && p.peers.values().all(|&acked| acked))
    }
}

pub struct TaskPool {
    uploads: RwLock<HashMap<String, Arc<RwLock<UploadTask>>>>,
    downloads: RwLock<HashMap<String, Arc<RwLock<DownloadTask>>>>,
    deletes: RwLock<HashMap<String, Arc<RwLock<DeleteTask>>>>,
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskPool {
    pub fn new() -> Self {
        TaskPool {
            uploads: RwLock::new(HashMap::new()),
            downloads: RwLock::new(HashMap::new()),
            deletes: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_upload(&self, file_id: &str, total_pieces: usize) {
        let mut map = self.uploads.write().await;
        map.entry(file_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(UploadTask::new(total_pieces))));
    }

    pub async fn upload(&self, file_id: &str) -> DfsResult<Arc<RwLock<UploadTask>>> {
        let map = self.uploads.read().await;
        map.get(file_id)
            .cloned()
            .ok_or_else(|| DfsError::TaskNotFound(file_id.to_string()))
    }

    pub async fn delete_upload(&self, file_id: &str) {
        self.uploads.write().await.remove(file_id);
    }

    pub async fn pause_upload(&self, file_id: &str) -> DfsResult<()> {
        self.upload(file_id).await?.write().await.pause();
        Ok(())
    }

    pub async fn resume_upload(&self, file_id: &str) -> DfsResult<()> {
        self.upload(file_id).await?.write().await.resume();
        Ok(())
    }

    pub async fn is_upload_paused(&self, file_id: &str) -> DfsResult<bool> {
        Ok(self.upload(file_id).await?.read().await.is_paused())
    }

    pub async fn add_download(&self, file_id: &str, file_key: Option<Vec<u8>>) {
        let mut map = self.downloads.write().await;
        map.entry(file_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(DownloadTask::new(file_key))));
    }

    pub async fn download(&self, file_id: &str) -> DfsResult<Arc<RwLock<DownloadTask>>> {
        let map = self.downloads.read().await;
        map.get(file_id)
            .cloned()
            .ok_or_else(|| DfsError::TaskNotFound(file_id.to_string()))
    }

    pub async fn delete_download(&self, file_id: &str) {
        self.downloads.write().await.remove(file_id);
    }

    pub async fn pause_download(&self, file_id: &str) -> DfsResult<()> {
        self.download(file_id).await?.write().await.pause();
        Ok(())
    }

    pub async fn resume_download(&self, file_id: &str) -> DfsResult<()> {
        self.download(file_id).await?.write().await.resume();
        Ok(())
    }

    pub async fn is_download_paused(&self, file_id: &str) -> DfsResult<bool> {
        Ok(self.download(file_id).await?.read().await.is_paused())
    }

    pub async fn add_delete(&self, file_id: &str, slice_hashes: Vec<String>) {
        let mut map = self.deletes.write().await;
        map.entry(file_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(DeleteTask::new(slice_hashes))));
    }

    pub async fn delete_task(&self, file_id: &str) -> DfsResult<Arc<RwLock<DeleteTask>>> {
        let map = self.deletes.read().await;
        map.get(file_id)
            .cloned()
            .ok_or_else(|| DfsError::TaskNotFound(file_id.to_string()))
    }

    pub async fn remove_delete(&self, file_id: &str) {
        self.deletes.write().await.remove(file_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitset_set_clear_count() {
        let mut bits = BitSet::new(10);
        bits.set(3);
        bits.set(9);
        assert!(bits.is_set(3));
        assert_eq!(bits.count(), 2);
        bits.clear(3);
        assert_eq!(bits.count(), 1);
    }

    #[tokio::test]
    async fn upload_task_marks_complete_when_all_bits_set() {
        let pool = TaskPool::new();
        pool.add_upload("f1", 3).await;
        let task = pool.upload("f1").await.unwrap();
        {
            let mut t = task.write().await;
            assert!(!t.mark_complete(0));
            assert!(!t.mark_complete(1));
            assert!(t.mark_complete(2));
            assert!(t.is_complete());
        }
    }

    #[tokio::test]
    async fn download_task_is_complete_once_k_bits_set() {
        let pool = TaskPool::new();
        pool.add_download("f1", None).await;
        let task = pool.download("f1").await.unwrap();
        {
            let mut t = task.write().await;
            t.update_piece_info(
                "peerA",
                "name.txt",
                100,
                6,
                4,
                &[(0, [1u8; 32], false), (1, [2u8; 32], false)],
                None,
            );
            assert!(!t.mark_complete(0));
            assert!(!t.mark_complete(1));
            t.mark_complete(2);
            assert!(t.mark_complete(3));
            assert!(t.is_complete());
        }
    }

    #[tokio::test]
    async fn download_task_prefers_data_pieces_in_incomplete_list() {
        let pool = TaskPool::new();
        pool.add_download("f1", None).await;
        let task = pool.download("f1").await.unwrap();
        let mut t = task.write().await;
        t.update_piece_info(
            "peerA",
            "name.txt",
            100,
            4,
            2,
            &[
                (0, [1u8; 32], false),
                (1, [2u8; 32], false),
                (2, [3u8; 32], true),
                (3, [4u8; 32], true),
            ],
            None,
        );
        let incomplete = t.incomplete_pieces();
        assert_eq!(incomplete, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_upload_task_flag() {
        let pool = TaskPool::new();
        pool.add_upload("f1", 1).await;
        assert!(!pool.is_upload_paused("f1").await.unwrap());
        pool.pause_upload("f1").await.unwrap();
        assert!(pool.is_upload_paused("f1").await.unwrap());
        pool.resume_upload("f1").await.unwrap();
        assert!(!pool.is_upload_paused("f1").await.unwrap());
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_download_task_flag() {
        let pool = TaskPool::new();
        pool.add_download("f1", None).await;
        assert!(!pool.is_download_paused("f1").await.unwrap());
        pool.pause_download("f1").await.unwrap();
        assert!(pool.is_download_paused("f1").await.unwrap());
        pool.resume_download("f1").await.unwrap();
        assert!(!pool.is_download_paused("f1").await.unwrap());
    }

    #[test]
    fn delete_task_completes_once_all_peers_ack() {
        let mut task = DeleteTask::new(vec!["hashA".to_string()]);
        task.add("hashA", "peer1");
        task.add("hashA", "peer2");
        assert!(!task.is_complete());
        task.ack("peer1", "hashA");
        assert!(!task.is_complete());
        task.ack("peer2", "hashA");
        assert!(task.is_complete());
    }
}
