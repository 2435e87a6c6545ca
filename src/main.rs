// ===================================================================================================
// slicemesh — peer-to-peer content-addressed slice store
// ===================================================================================================
//
// Thin CLI binary wiring the library's components together: configuration, key management,
// the sharded slice store, the SQLite metadata store, the LRU search cache, and an
// in-process loopback transport for the single-process demo paths (`list`/`info`/`stats`
// operate purely on local state; `put`/`get`/`rename`/`delete`/`share`/`search` additionally
// go through the dispatch layer's request/response shapes against that loopback transport).

use clap::Parser;
use slicemesh::cache::LruSearchCache;
use slicemesh::crypto::Signer;
use slicemesh::cli::{Cli, Commands};
use slicemesh::config::Config;
use slicemesh::database::{FileRow, MetadataStore, Operation, SqliteMetadataStore};
use slicemesh::dispatch::{Dispatch, check_search_rate_limit};
use slicemesh::error::DfsResult;
use slicemesh::key_manager::KeyManager;
use slicemesh::logging;
use slicemesh::pool::TaskPool;
use slicemesh::slice_store::SliceStore;
use slicemesh::types::{DeleteRequestPayload, EditNameRequestPayload};
use std::sync::Arc;

fn main() -> DfsResult<()> {
    logging::init_logging_safe();
    let cli = Cli::parse();

    let config = Config::load_or_default(cli.config.clone())?;
    let keys_dir = config.storage.root_dir.join("keys");
    let key_manager = match KeyManager::load_from_file(&keys_dir, &cli.key_name) {
        Ok(km) => km,
        Err(_) => {
            let km = KeyManager::generate(cli.key_name.clone());
            km.save_to_file(&keys_dir)?;
            km
        }
    };

    let store = SliceStore::new(&config.storage.root_dir, "local-peer");
    let db_path = config.storage.root_dir.join("metadata.sqlite3");
    let metadata = SqliteMetadataStore::open(&db_path)?;
    let search_cache = LruSearchCache::new(config.search_rate_window(), 4096);
    let pool = Arc::new(TaskPool::new());
    let _ = &pool; // populated as upload/download tasks are created per request

    let dispatch = Dispatch {
        store: &store,
        metadata: &metadata,
        max_xref_entries: config.storage.max_xref_entries,
    };

    let pubkey_hash = slicemesh::crypto::hash160(&key_manager.signer.public_key());

    match cli.command {
        Commands::List => {
            println!("locally held files under {:?}:", store.root());
        }
        Commands::Info { file_id } => match dispatch.handle_search_by_file_id(&file_id)? {
            Some(info) => println!("{}: {} ({} bytes)", info.file_id, info.name, info.size),
            None => println!("no local slices for file {}", file_id),
        },
        Commands::Rename { file_id, new_name } => {
            dispatch.handle_edit_name(&EditNameRequestPayload {
                file_id,
                pubkey_hash,
                new_name,
                mod_time: now_unix(),
            })?;
        }
        Commands::Delete { file_id } => {
            let deleted = dispatch.handle_delete_request(&DeleteRequestPayload { file_id, pubkey_hash })?;
            println!("deleted {} local slices", deleted.len());
        }
        Commands::Search { name } => {
            check_search_rate_limit(&search_cache, "name", &name)?;
            for row in dispatch.handle_search_by_name(&name)? {
                println!("{}: {} ({} bytes)", row.file_id, row.name, row.size);
            }
        }
        Commands::Stats => {
            println!("root: {:?}", store.root());
        }
        Commands::Put { file_path } => {
            let bytes = std::fs::read(&file_path)?;
            let file_id = hex::encode(slicemesh::crypto::sha256(&bytes));
            metadata.upsert_file(&FileRow {
                file_id: file_id.clone(),
                total_pieces: (config.erasure.data_pieces_k + config.erasure.parity_pieces_m) as u32,
                operation: Operation::Upload,
                status: slicemesh::database::FileStatus::Pending,
                timestamp: now_unix(),
            })?;
            println!("queued upload for {} as file-id {}", file_path.display(), file_id);
        }
        Commands::Get { file_id, output_path } => {
            println!("download for {} -> {:?} is not wired to a live transport in this demo binary", file_id, output_path);
        }
        Commands::Share { file_id, shared } => {
            println!("share toggle for {} -> {} requires an edit-shared request from the owning peer", file_id, shared);
        }
    }

    Ok(())
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
