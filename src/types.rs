// Shared data-model types used across the upload/download pipelines and the dispatch layer.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditDiscriminant {
    Name,
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDiscriminant {
    FileId,
    Name,
}

/// One entry of a file's slice-hash table: index -> (hash, is-parity).
#[derive(Debug, Clone)]
pub struct SliceTableEntry {
    pub hash: [u8; 32],
    pub is_parity: bool,
}

pub type SliceTable = BTreeMap<u32, SliceTableEntry>;

pub fn slice_table_digest_input(table: &SliceTable) -> BTreeMap<u32, [u8; 32]> {
    table.iter().map(|(i, e)| (*i, e.hash)).collect()
}

/// Originator-side descriptor for a file being uploaded or tracked.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub file_id: String,
    pub file_key: Option<Vec<u8>>,
    pub name: String,
    pub size: u64,
    pub upload_time: i64,
    pub mod_time: i64,
    pub file_type: String,
    pub slice_table: SliceTable,
    pub owner_pubkey_hash: [u8; 20],
}

#[derive(Debug, Clone)]
pub struct UploadRequestPayload {
    pub file_id: String,
    pub slice_hashes: Vec<String>,
    pub pubkey_hash: [u8; 20],
}

#[derive(Debug, Clone)]
pub struct SliceAcceptance {
    pub slice_hash: String,
    pub accepted: bool,
}

#[derive(Debug, Clone)]
pub struct UploadResponsePayload {
    pub file_id: String,
    pub acceptances: Vec<SliceAcceptance>,
}

#[derive(Debug, Clone)]
pub struct DownloadRequestPayload {
    pub file_id: String,
    pub file_key: Option<Vec<u8>>,
    pub requester_pubkey_hash: [u8; 20],
}

#[derive(Debug, Clone)]
pub struct DownloadInventoryPayload {
    pub file_id: String,
    pub name: String,
    pub size: u64,
    pub total_pieces: usize,
    pub data_pieces: usize,
    pub slice_table: SliceTable,
    pub held_slice_indices: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct DeleteRequestPayload {
    pub file_id: String,
    pub pubkey_hash: [u8; 20],
}

#[derive(Debug, Clone)]
pub struct EditNameRequestPayload {
    pub file_id: String,
    pub pubkey_hash: [u8; 20],
    pub new_name: String,
    pub mod_time: i64,
}

#[derive(Debug, Clone)]
pub struct EditSharedRequestPayload {
    pub file_id: String,
    pub shared: bool,
    pub pubkey_hash: [u8; 20],
    pub name: String,
    pub size: u64,
    pub mod_time: i64,
    pub upload_time: i64,
    pub file_key: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct AddSharedRequestPayload {
    pub file_id: String,
    pub file_key: Vec<u8>,
    pub grantee_pubkey_hash: [u8; 20],
    pub expiry: i64,
    pub mod_time: i64,
}

#[derive(Debug, Clone)]
pub struct SearchRequestPayload {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct SearchResponsePayload {
    pub file_id: String,
    pub name: String,
    pub size: u64,
    pub mod_time: i64,
    pub upload_time: i64,
    pub owner_pubkey_hash: [u8; 20],
}
