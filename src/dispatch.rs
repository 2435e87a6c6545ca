// Dispatch layer: routes pub/sub topics and stream protocols to handlers. Handlers are
// idempotent and, for authorization failures, silently drop the request rather than
// returning an error — not every peer holding a slice is authoritative over it.

use crate::database::{MetadataStore, SharedRow};
use crate::error::DfsResult;
use crate::script::{self, StorageMode};
use crate::segment::SliceContainer;
use crate::slice_store::SliceStore;
use crate::types::*;
use std::fs::File;
use std::time::Instant;

pub const TOPIC_UPLOAD_REQUEST: &str = "file-upload-request";
pub const TOPIC_UPLOAD_RESPONSE: &str = "file-upload-response";
pub const TOPIC_DOWNLOAD_REQUEST: &str = "file-download-request";
pub const TOPIC_DOWNLOAD_RESPONSE: &str = "file-download-response";
pub const TOPIC_DELETE_REQUEST: &str = "file-delete-request";
pub const TOPIC_EDIT_REQUEST: &str = "file-edit-request";
pub const TOPIC_ADD_SHARED_REQUEST: &str = "add-shared-request";
pub const TOPIC_ADD_SEARCH_REQUEST: &str = "add-search-request";
pub const TOPIC_ADD_SEARCH_RESPONSE: &str = "add-search-response";

pub const STREAM_SLICE_UPLOAD: &str = "slice-upload";
pub const STREAM_DOWNLOAD_RESPONSE: &str = "download-response";

pub struct Dispatch<'a> {
    pub store: &'a SliceStore,
    pub metadata: &'a dyn MetadataStore,
    pub max_xref_entries: usize,
}

fn open_container(
    store: &SliceStore,
    file_id: &str,
    slice_hash: &str,
    max_xref_entries: usize,
) -> DfsResult<SliceContainer<File>> {
    let file = store.open_for_append(file_id, slice_hash)?;
    SliceContainer::open(file, max_xref_entries)
}

impl<'a> Dispatch<'a> {
    /// Edit-name: for each local slice of the file owned by the requester, append
    /// {NAME, MODTIME}. Silent skip (no append, no response) on pubkey-hash mismatch.
    pub fn handle_edit_name(&self, payload: &EditNameRequestPayload) -> DfsResult<()> {
        for slice_hash in self.store.list(&payload.file_id)? {
            let mut container =
                open_container(self.store, &payload.file_id, &slice_hash, self.max_xref_entries)?;
            let p2pkh = container.read("P2PKHSCRIPT")?;
            if !script::verify_p2pkh(&p2pkh, &payload.pubkey_hash) {
                continue;
            }
            container.append_many(&[
                ("NAME", payload.new_name.as_bytes()),
                ("MODTIME", &payload.mod_time.to_be_bytes()),
            ])?;
        }
        Ok(())
    }

    /// Edit-shared: verify file-id and P2PKH match; if SHARED value differs, append
    /// {SHARED, FILEKEY, MODTIME} and update the relational `shared` index.
    pub fn handle_edit_shared(&self, payload: &EditSharedRequestPayload) -> DfsResult<()> {
        for slice_hash in self.store.list(&payload.file_id)? {
            let mut container =
                open_container(self.store, &payload.file_id, &slice_hash, self.max_xref_entries)?;
            let file_id_seg = container.read("FILEID")?;
            if file_id_seg != payload.file_id.as_bytes() {
                continue;
            }
            let p2pkh = container.read("P2PKHSCRIPT")?;
            if !script::verify_p2pkh(&p2pkh, &payload.pubkey_hash) {
                continue;
            }
            let current_shared = container.read("SHARED").unwrap_or_else(|_| vec![0]);
            let currently_shared = current_shared.first().copied().unwrap_or(0) != 0;
            if currently_shared == payload.shared {
                continue;
            }

            let shared_byte = [payload.shared as u8];
            let mod_time_bytes = payload.mod_time.to_be_bytes();
            let mut segments: Vec<(&str, &[u8])> =
                vec![("SHARED", &shared_byte), ("MODTIME", &mod_time_bytes)];
            if let Some(key) = &payload.file_key {
                segments.push(("FILEKEY", key));
            }
            container.append_many(&segments)?;

            if payload.shared {
                self.metadata.upsert_shared(&SharedRow {
                    file_id: payload.file_id.clone(),
                    name: payload.name.clone(),
                    size: payload.size,
                    upload_time: payload.upload_time,
                    mod_time: payload.mod_time,
                    xref_count: container.segment_types()?.len() as u32,
                })?;
            } else {
                self.metadata.delete_shared(&payload.file_id)?;
            }
        }
        Ok(())
    }

    /// Add-shared (grant): requires the slice to already be SHARED with a matching
    /// file-key; appends {MODTIME, md5(grantee-pubkey-hash): expiry}. Rejects an expired
    /// grant or one that would overflow the xref cap (the overflow check happens
    /// implicitly via `append_many`'s `XrefFull`).
    pub fn handle_add_shared(&self, payload: &AddSharedRequestPayload, now: i64) -> DfsResult<()> {
        if payload.expiry <= now {
            return Ok(());
        }
        for slice_hash in self.store.list(&payload.file_id)? {
            let mut container =
                open_container(self.store, &payload.file_id, &slice_hash, self.max_xref_entries)?;
            let shared = container.read("SHARED").unwrap_or_else(|_| vec![0]);
            if shared.first().copied().unwrap_or(0) == 0 {
                continue;
            }
            let file_key = container.read("FILEKEY").unwrap_or_default();
            if file_key != payload.file_key {
                continue;
            }
            let grant_segment = format!("{:x}", md5::compute(payload.grantee_pubkey_hash));
            container.append_many(&[
                ("MODTIME", &payload.mod_time.to_be_bytes()),
                (&grant_segment, &payload.expiry.to_be_bytes()),
            ])?;
        }
        Ok(())
    }

    /// Search by file-id: locates local slices and returns their descriptive segments.
    pub fn handle_search_by_file_id(&self, file_id: &str) -> DfsResult<Option<SearchResponsePayload>> {
        let hashes = self.store.list(file_id)?;
        let first = match hashes.first() {
            Some(h) => h,
            None => return Ok(None),
        };
        let mut container = open_container(self.store, file_id, first, self.max_xref_entries)?;
        let fields = container.read_many(&["FILEID", "NAME", "SIZE", "MODTIME", "UPLOADTIME", "P2PKHSCRIPT"])?;
        let mut size_bytes = [0u8; 8];
        size_bytes.copy_from_slice(&fields[2]);
        let mut mod_bytes = [0u8; 8];
        mod_bytes.copy_from_slice(&fields[3]);
        let mut upload_bytes = [0u8; 8];
        upload_bytes.copy_from_slice(&fields[4]);
        let pubkey_hash = script::p2pkh_pubkey_hash(&fields[5])?;

        Ok(Some(SearchResponsePayload {
            file_id: String::from_utf8_lossy(&fields[0]).to_string(),
            name: String::from_utf8_lossy(&fields[1]).to_string(),
            size: u64::from_be_bytes(size_bytes),
            mod_time: i64::from_be_bytes(mod_bytes),
            upload_time: i64::from_be_bytes(upload_bytes),
            owner_pubkey_hash: pubkey_hash,
        }))
    }

    /// Search by name: queries the relational `shared` index.
    pub fn handle_search_by_name(&self, name: &str) -> DfsResult<Vec<SharedRow>> {
        self.metadata.find_shared_by_name(name)
    }

    /// Delete-request: verifies P2PKH ownership on each local slice and removes it.
    /// Silent skip on mismatch, same authorization policy as edit-name.
    pub fn handle_delete_request(&self, payload: &DeleteRequestPayload) -> DfsResult<Vec<String>> {
        let mut deleted = Vec::new();
        for slice_hash in self.store.list(&payload.file_id)? {
            let mut container =
                open_container(self.store, &payload.file_id, &slice_hash, self.max_xref_entries)?;
            let p2pkh = container.read("P2PKHSCRIPT")?;
            if !script::verify_p2pkh(&p2pkh, &payload.pubkey_hash) {
                continue;
            }
            drop(container);
            self.store.delete(&payload.file_id, &slice_hash)?;
            deleted.push(slice_hash);
        }
        Ok(deleted)
    }
}

/// Rate-limits a search or grant key/value pair against the shared cache.
pub fn check_search_rate_limit(
    cache: &dyn crate::cache::SearchCache,
    key: &str,
    value: &str,
) -> DfsResult<()> {
    cache.check_and_set(key, value, Instant::now())
}

#[allow(dead_code)]
fn canonical_mode(is_parity: bool) -> StorageMode {
    if is_parity {
        StorageMode::Parity
    } else {
        StorageMode::Data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Secp256k1Signer, Signer};
    use crate::database::SqliteMetadataStore;

    fn write_basic_slice(
        store: &SliceStore,
        file_id: &str,
        slice_hash: &str,
        owner_pubkey: &[u8],
        extra: &[(&str, &[u8])],
    ) {
        store.create(file_id).unwrap();
        let file = store.open_for_append(file_id, slice_hash).unwrap();
        let mut container = SliceContainer::create(file, 64).unwrap();
        let script = script::build_p2pkh(owner_pubkey);
        let size_bytes = 100u64.to_be_bytes();
        let mod_bytes = 1i64.to_be_bytes();
        let upload_bytes = 1i64.to_be_bytes();
        let mut segments: Vec<(&str, &[u8])> = vec![
            ("FILEID", file_id.as_bytes()),
            ("P2PKHSCRIPT", &script),
            ("NAME", b"before.txt"),
            ("SIZE", &size_bytes),
            ("MODTIME", &mod_bytes),
            ("UPLOADTIME", &upload_bytes),
        ];
        segments.extend_from_slice(extra);
        container.append_many(&segments).unwrap();
    }

    #[test]
    fn edit_name_silently_skips_on_pubkey_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = SliceStore::new(dir.path(), "peer1");
        let owner = Secp256k1Signer::generate();
        let attacker = Secp256k1Signer::generate();
        write_basic_slice(&store, "f1", "hashA", &owner.public_key(), &[]);

        let metadata = SqliteMetadataStore::open_in_memory().unwrap();
        let dispatch = Dispatch {
            store: &store,
            metadata: &metadata,
            max_xref_entries: 64,
        };
        let before_len = std::fs::metadata(store.slice_file_path("f1", "hashA")).unwrap().len();
        dispatch
            .handle_edit_name(&EditNameRequestPayload {
                file_id: "f1".into(),
                pubkey_hash: crate::crypto::hash160(&attacker.public_key()),
                new_name: "after.txt".into(),
                mod_time: 2,
            })
            .unwrap();
        let after_len = std::fs::metadata(store.slice_file_path("f1", "hashA")).unwrap().len();
        assert_eq!(before_len, after_len);
    }

    #[test]
    fn edit_name_applies_on_matching_owner() {
        let dir = tempfile::tempdir().unwrap();
        let store = SliceStore::new(dir.path(), "peer1");
        let owner = Secp256k1Signer::generate();
        write_basic_slice(&store, "f1", "hashA", &owner.public_key(), &[]);

        let metadata = SqliteMetadataStore::open_in_memory().unwrap();
        let dispatch = Dispatch {
            store: &store,
            metadata: &metadata,
            max_xref_entries: 64,
        };
        dispatch
            .handle_edit_name(&EditNameRequestPayload {
                file_id: "f1".into(),
                pubkey_hash: crate::crypto::hash160(&owner.public_key()),
                new_name: "after.txt".into(),
                mod_time: 2,
            })
            .unwrap();

        let file = store.open_for_append("f1", "hashA").unwrap();
        let mut container = SliceContainer::open(file, 64).unwrap();
        assert_eq!(container.read("NAME").unwrap(), b"after.txt");
    }

    #[test]
    fn edit_shared_toggles_on_then_off() {
        let dir = tempfile::tempdir().unwrap();
        let store = SliceStore::new(dir.path(), "peer1");
        let owner = Secp256k1Signer::generate();
        write_basic_slice(
            &store,
            "f1",
            "hashA",
            &owner.public_key(),
            &[("SHARED", &[0u8])],
        );

        let metadata = SqliteMetadataStore::open_in_memory().unwrap();
        let dispatch = Dispatch {
            store: &store,
            metadata: &metadata,
            max_xref_entries: 64,
        };
        let owner_hash = crate::crypto::hash160(&owner.public_key());

        dispatch
            .handle_edit_shared(&EditSharedRequestPayload {
                file_id: "f1".into(),
                shared: true,
                pubkey_hash: owner_hash,
                name: "before.txt".into(),
                size: 100,
                mod_time: 5,
                upload_time: 1,
                file_key: Some(b"k".to_vec()),
            })
            .unwrap();
        assert!(metadata.get_shared("f1").unwrap().is_some());

        dispatch
            .handle_edit_shared(&EditSharedRequestPayload {
                file_id: "f1".into(),
                shared: false,
                pubkey_hash: owner_hash,
                name: "before.txt".into(),
                size: 100,
                mod_time: 6,
                upload_time: 1,
                file_key: None,
            })
            .unwrap();
        assert!(metadata.get_shared("f1").unwrap().is_none());
    }

    #[test]
    fn delete_request_removes_only_matching_owner_slices() {
        let dir = tempfile::tempdir().unwrap();
        let store = SliceStore::new(dir.path(), "peer1");
        let owner = Secp256k1Signer::generate();
        let attacker = Secp256k1Signer::generate();
        write_basic_slice(&store, "f1", "hashA", &owner.public_key(), &[]);

        let metadata = SqliteMetadataStore::open_in_memory().unwrap();
        let dispatch = Dispatch {
            store: &store,
            metadata: &metadata,
            max_xref_entries: 64,
        };
        let deleted = dispatch
            .handle_delete_request(&DeleteRequestPayload {
                file_id: "f1".into(),
                pubkey_hash: crate::crypto::hash160(&attacker.public_key()),
            })
            .unwrap();
        assert!(deleted.is_empty());
        assert_eq!(store.list("f1").unwrap().len(), 1);

        let deleted = dispatch
            .handle_delete_request(&DeleteRequestPayload {
                file_id: "f1".into(),
                pubkey_hash: crate::crypto::hash160(&owner.public_key()),
            })
            .unwrap();
        assert_eq!(deleted, vec!["hashA".to_string()]);
        assert!(store.list("f1").unwrap().is_empty());
    }

    #[test]
    fn add_shared_appends_modtime_and_grant_segment_when_file_key_matches() {
        let dir = tempfile::tempdir().unwrap();
        let store = SliceStore::new(dir.path(), "peer1");
        let owner = Secp256k1Signer::generate();
        let grantee = Secp256k1Signer::generate();
        write_basic_slice(
            &store,
            "f1",
            "hashA",
            &owner.public_key(),
            &[("SHARED", &[1u8]), ("FILEKEY", b"secretkey")],
        );

        let metadata = SqliteMetadataStore::open_in_memory().unwrap();
        let dispatch = Dispatch {
            store: &store,
            metadata: &metadata,
            max_xref_entries: 64,
        };

        let grantee_hash = crate::crypto::hash160(&grantee.public_key());
        dispatch
            .handle_add_shared(
                &AddSharedRequestPayload {
                    file_id: "f1".into(),
                    file_key: b"secretkey".to_vec(),
                    grantee_pubkey_hash: grantee_hash,
                    expiry: 100,
                    mod_time: 7,
                },
                10,
            )
            .unwrap();

        let file = store.open_for_append("f1", "hashA").unwrap();
        let mut container = SliceContainer::open(file, 64).unwrap();
        assert_eq!(container.read("MODTIME").unwrap(), 7i64.to_be_bytes());
        let grant_segment = format!("{:x}", md5::compute(grantee_hash));
        assert_eq!(container.read(&grant_segment).unwrap(), 100i64.to_be_bytes());
    }

    #[test]
    fn add_shared_skips_unshared_slice_and_expired_grant() {
        let dir = tempfile::tempdir().unwrap();
        let store = SliceStore::new(dir.path(), "peer1");
        let owner = Secp256k1Signer::generate();
        let grantee = Secp256k1Signer::generate();
        write_basic_slice(&store, "f1", "hashA", &owner.public_key(), &[]);

        let metadata = SqliteMetadataStore::open_in_memory().unwrap();
        let dispatch = Dispatch {
            store: &store,
            metadata: &metadata,
            max_xref_entries: 64,
        };
        let grantee_hash = crate::crypto::hash160(&grantee.public_key());

        let before_len = std::fs::metadata(store.slice_file_path("f1", "hashA")).unwrap().len();
        dispatch
            .handle_add_shared(
                &AddSharedRequestPayload {
                    file_id: "f1".into(),
                    file_key: b"secretkey".to_vec(),
                    grantee_pubkey_hash: grantee_hash,
                    expiry: 5,
                    mod_time: 7,
                },
                10,
            )
            .unwrap();
        let after_len = std::fs::metadata(store.slice_file_path("f1", "hashA")).unwrap().len();
        assert_eq!(before_len, after_len, "expired grant must not append anything");
    }
}
