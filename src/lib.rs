// ===================================================================================================
// slicemesh — peer-to-peer content-addressed slice store
// ===================================================================================================
//
// The slice lifecycle engine: a segmented, checksummed slice container format, a sharded
// on-disk store, P2PKH/P2PK ownership scripts, Reed-Solomon erasure coding, upload/download
// task pools, and a pub/sub + stream dispatch layer, wired together behind small traits for
// the transport, metadata store, search cache, and crypto primitives.
// ===================================================================================================

pub mod error;
pub mod config;
pub mod types;
pub mod segment;
pub mod slice_store;
pub mod script;
pub mod crypto;
pub mod pool;
pub mod erasure;
pub mod transport;
pub mod database;
pub mod cache;
pub mod dispatch;
pub mod upload;
pub mod download;
pub mod key_manager;
pub mod logging;
pub mod cli;

pub use error::{DfsError, DfsResult};
