// Command-line interface: thin glue over the library, exposing put/get/list/info/rename/
// delete/share/search/stats. Peripheral per the engine's own budget — not part of the core.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "slicemesh", about = "Peer-to-peer content-addressed slice store")]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Name of the local key to use (generated on first run if absent).
    #[arg(long, default_value = "default")]
    pub key_name: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a local file into the slice store.
    Put { file_path: PathBuf },
    /// Download a file by its file-id.
    Get { file_id: String, output_path: PathBuf },
    /// List locally held files.
    List,
    /// Show descriptive info for a file-id.
    Info { file_id: String },
    /// Rename a file (broadcasts an edit-name request).
    Rename { file_id: String, new_name: String },
    /// Delete a file (broadcasts a delete request).
    Delete { file_id: String },
    /// Toggle a file's shared flag.
    Share { file_id: String, shared: bool },
    /// Search the shared index by name.
    Search { name: String },
    /// Print store/pool statistics.
    Stats,
}
