// Relational metadata store: files / slices / shared tables, exactly the columns spec'd.
// Adapted from the teacher's `rusqlite`-backed connection wrapper.

use crate::error::DfsResult;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Download = 0,
    Upload = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Failed = 0,
    Success = 1,
    Pending = 2,
    InProgress = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceStatus {
    Failed = 0,
    Success = 1,
}

#[derive(Debug, Clone)]
pub struct FileRow {
    pub file_id: String,
    pub total_pieces: u32,
    pub operation: Operation,
    pub status: FileStatus,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct SliceRow {
    pub file_id: String,
    pub slice_hash: String,
    pub slice_index: u32,
    pub status: SliceStatus,
}

#[derive(Debug, Clone)]
pub struct SharedRow {
    pub file_id: String,
    pub name: String,
    pub size: u64,
    pub upload_time: i64,
    pub mod_time: i64,
    pub xref_count: u32,
}

pub trait MetadataStore: Send + Sync {
    fn upsert_file(&self, row: &FileRow) -> DfsResult<()>;
    fn upsert_slice(&self, row: &SliceRow) -> DfsResult<()>;
    fn upsert_shared(&self, row: &SharedRow) -> DfsResult<()>;
    fn delete_shared(&self, file_id: &str) -> DfsResult<()>;
    fn find_shared_by_name(&self, name: &str) -> DfsResult<Vec<SharedRow>>;
    fn get_shared(&self, file_id: &str) -> DfsResult<Option<SharedRow>>;
}

pub struct SqliteMetadataStore {
    connection: Mutex<Connection>,
}

impl SqliteMetadataStore {
    pub fn open(db_path: &Path) -> DfsResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let connection = Connection::open(db_path)?;
        let store = SqliteMetadataStore { connection: Mutex::new(connection) };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> DfsResult<Self> {
        let connection = Connection::open_in_memory()?;
        let store = SqliteMetadataStore { connection: Mutex::new(connection) };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> DfsResult<()> {
        self.connection.lock().unwrap().execute(
            "CREATE TABLE IF NOT EXISTS files (
                file_id TEXT PRIMARY KEY,
                total_pieces INTEGER NOT NULL,
                operation INTEGER NOT NULL,
                status INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            )",
            [],
        )?;
        self.connection.lock().unwrap().execute(
            "CREATE TABLE IF NOT EXISTS slices (
                file_id TEXT NOT NULL,
                slice_hash TEXT NOT NULL,
                slice_index INTEGER NOT NULL,
                status INTEGER NOT NULL,
                PRIMARY KEY (file_id, slice_hash)
            )",
            [],
        )?;
        self.connection.lock().unwrap().execute(
            "CREATE TABLE IF NOT EXISTS shared (
                file_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                size INTEGER NOT NULL,
                upload_time INTEGER NOT NULL,
                mod_time INTEGER NOT NULL,
                xref_count INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn upsert_file(&self, row: &FileRow) -> DfsResult<()> {
        self.connection.lock().unwrap().execute(
            "INSERT INTO files (file_id, total_pieces, operation, status, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(file_id) DO UPDATE SET
                total_pieces = excluded.total_pieces,
                operation = excluded.operation,
                status = excluded.status,
                timestamp = excluded.timestamp",
            params![
                row.file_id,
                row.total_pieces,
                row.operation as i64,
                row.status as i64,
                row.timestamp
            ],
        )?;
        Ok(())
    }

    fn upsert_slice(&self, row: &SliceRow) -> DfsResult<()> {
        self.connection.lock().unwrap().execute(
            "INSERT INTO slices (file_id, slice_hash, slice_index, status)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(file_id, slice_hash) DO UPDATE SET
                slice_index = excluded.slice_index,
                status = excluded.status",
            params![row.file_id, row.slice_hash, row.slice_index, row.status as i64],
        )?;
        Ok(())
    }

    fn upsert_shared(&self, row: &SharedRow) -> DfsResult<()> {
        self.connection.lock().unwrap().execute(
            "INSERT INTO shared (file_id, name, size, upload_time, mod_time, xref_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(file_id) DO UPDATE SET
                name = excluded.name,
                size = excluded.size,
                upload_time = excluded.upload_time,
                mod_time = excluded.mod_time,
                xref_count = excluded.xref_count",
            params![
                row.file_id,
                row.name,
                row.size,
                row.upload_time,
                row.mod_time,
                row.xref_count
            ],
        )?;
        Ok(())
    }

    fn delete_shared(&self, file_id: &str) -> DfsResult<()> {
        self.connection
            .lock()
            .unwrap()
            .execute("DELETE FROM shared WHERE file_id = ?1", params![file_id])?;
        Ok(())
    }

    fn find_shared_by_name(&self, name: &str) -> DfsResult<Vec<SharedRow>> {
        let connection = self.connection.lock().unwrap();
        let mut stmt = connection.prepare(
            "SELECT file_id, name, size, upload_time, mod_time, xref_count
             FROM shared WHERE name = ?1",
        )?;
        let rows = stmt
            .query_map(params![name], |row| {
                Ok(SharedRow {
                    file_id: row.get(0)?,
                    name: row.get(1)?,
                    size: row.get(2)?,
                    upload_time: row.get(3)?,
                    mod_time: row.get(4)?,
                    xref_count: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_shared(&self, file_id: &str) -> DfsResult<Option<SharedRow>> {
        let connection = self.connection.lock().unwrap();
        let mut stmt = connection.prepare(
            "SELECT file_id, name, size, upload_time, mod_time, xref_count
             FROM shared WHERE file_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![file_id], |row| {
            Ok(SharedRow {
                file_id: row.get(0)?,
                name: row.get(1)?,
                size: row.get(2)?,
                upload_time: row.get(3)?,
                mod_time: row.get(4)?,
                xref_count: row.get(5)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }
}
