// ===================================================================================================
// Error Handling System - Core Error Types
// ===================================================================================================
//
// Structured error types for the slice lifecycle engine: the segment codec, slice store,
// task pool, erasure engine, upload/download pipelines, and dispatch layer all return
// `DfsResult<T>`. Each variant maps to one of the error categories in the error-handling
// design: Format, Integrity, Authorization (no variant — authorization failures are silent
// no-ops, not errors), Transport, Exhaustion, Rate.
// ===================================================================================================

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub enum DfsError {
    /// File system I/O operation failures.
    Io(String),

    /// Transport failures: stream timeout, connection refused, broadcast failure.
    Network(String),

    /// Relational metadata store failures.
    Database(String),

    /// Invalid configuration.
    Config(String),

    /// General cryptographic operation failures (ECDSA, AES-CTR).
    Crypto(String),

    /// Slice container trailer is malformed or truncated.
    FormatError(String),

    /// A segment's CRC did not match its payload on read.
    CorruptSegment(String),

    /// A requested segment type is not present in the container.
    MissingSegment(String),

    /// The xref table would exceed `max_xref_entries`.
    XrefFull,

    /// Fewer than `k` shards were available for reconstruction.
    Unrecoverable(String),

    /// Shards did not all share the same length.
    InvalidShards(String),

    /// A task (upload/download/delete) was not found in the pool.
    TaskNotFound(String),

    /// A search or grant request arrived within the rate-limit window.
    TooFrequent,

    /// File lookup failures.
    FileNotFound(String),

    /// Data serialization/deserialization failures.
    Serialization(String),
}

impl fmt::Display for DfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DfsError::Io(e) => write!(f, "IO error: {}", e),
            DfsError::Network(e) => write!(f, "Network error: {}", e),
            DfsError::Database(e) => write!(f, "Database error: {}", e),
            DfsError::Config(e) => write!(f, "Configuration error: {}", e),
            DfsError::Crypto(e) => write!(f, "Cryptographic error: {}", e),
            DfsError::FormatError(e) => write!(f, "Format error: {}", e),
            DfsError::CorruptSegment(t) => write!(f, "Corrupt segment: {}", t),
            DfsError::MissingSegment(t) => write!(f, "Missing segment: {}", t),
            DfsError::XrefFull => write!(f, "Xref table is full"),
            DfsError::Unrecoverable(e) => write!(f, "Unrecoverable: {}", e),
            DfsError::InvalidShards(e) => write!(f, "Invalid shards: {}", e),
            DfsError::TaskNotFound(id) => write!(f, "Task not found: {}", id),
            DfsError::TooFrequent => write!(f, "Request too frequent"),
            DfsError::FileNotFound(id) => write!(f, "File not found: {}", id),
            DfsError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl StdError for DfsError {}

impl From<std::io::Error> for DfsError {
    fn from(error: std::io::Error) -> Self {
        DfsError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for DfsError {
    fn from(error: serde_json::Error) -> Self {
        DfsError::Serialization(error.to_string())
    }
}

impl From<hex::FromHexError> for DfsError {
    fn from(error: hex::FromHexError) -> Self {
        DfsError::Serialization(format!("Hex decode error: {}", error))
    }
}

impl From<reed_solomon_erasure::Error> for DfsError {
    fn from(error: reed_solomon_erasure::Error) -> Self {
        DfsError::InvalidShards(format!("Reed-Solomon error: {:?}", error))
    }
}

impl From<rusqlite::Error> for DfsError {
    fn from(error: rusqlite::Error) -> Self {
        DfsError::Database(error.to_string())
    }
}

/// Result type alias for core operations.
pub type DfsResult<T> = Result<T, DfsError>;
