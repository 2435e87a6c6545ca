// Sharded, content-addressed local store for slice containers: root / peer-id / file-id /
// slice-hash. Writes are crash-safe per slice file via temp-file + rename; there are no
// cross-slice transactions.

use crate::error::DfsResult;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub struct SliceStore {
    root: PathBuf,
    peer_id: String,
}

impl SliceStore {
    pub fn new(root: impl Into<PathBuf>, peer_id: impl Into<String>) -> Self {
        SliceStore {
            root: root.into(),
            peer_id: peer_id.into(),
        }
    }

    fn file_dir(&self, file_id: &str) -> PathBuf {
        self.root.join(&self.peer_id).join(file_id)
    }

    fn slice_path(&self, file_id: &str, slice_hash: &str) -> PathBuf {
        self.file_dir(file_id).join(slice_hash)
    }

    /// Ensures the per-file directory exists.
    pub fn create(&self, file_id: &str) -> DfsResult<()> {
        fs::create_dir_all(self.file_dir(file_id))?;
        Ok(())
    }

    /// Writes a slice's full bytes, crash-safe via temp-file + rename.
    pub fn write(&self, file_id: &str, slice_hash: &str, bytes: &[u8]) -> DfsResult<()> {
        self.create(file_id)?;
        let target = self.slice_path(file_id, slice_hash);
        let tmp = target.with_extension("tmp");
        {
            let mut f = File::create(&tmp)?;
            f.write_all(bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    /// Opens a slice for reading its full bytes.
    pub fn open(&self, file_id: &str, slice_hash: &str) -> DfsResult<Vec<u8>> {
        let mut buf = Vec::new();
        File::open(self.slice_path(file_id, slice_hash))?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Opens a slice for read+append; the returned handle is positioned at EOF.
    pub fn open_for_append(&self, file_id: &str, slice_hash: &str) -> DfsResult<File> {
        self.create(file_id)?;
        let f = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.slice_path(file_id, slice_hash))?;
        Ok(f)
    }

    /// Lists the slice-hashes held locally for a file.
    pub fn list(&self, file_id: &str) -> DfsResult<Vec<String>> {
        let dir = self.file_dir(file_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut hashes = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if !name.ends_with(".tmp") {
                    hashes.push(name.to_string());
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    pub fn delete(&self, file_id: &str, slice_hash: &str) -> DfsResult<()> {
        let path = self.slice_path(file_id, slice_hash);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn delete_all(&self, file_id: &str) -> DfsResult<()> {
        let dir = self.file_dir(file_id);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn clear_root(&self) -> DfsResult<()> {
        let peer_dir = self.root.join(&self.peer_id);
        if peer_dir.exists() {
            fs::remove_dir_all(&peer_dir)?;
        }
        fs::create_dir_all(&peer_dir)?;
        Ok(())
    }

    pub fn slice_file_path(&self, file_id: &str, slice_hash: &str) -> PathBuf {
        self.slice_path(file_id, slice_hash)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
